use failure::Fallible;
use serde_derive::{Deserialize, Serialize};

use super::{CategoryEncoder, EncodeMode, LookupError};

/// Character-level encoder.
///
/// Every character of a string is encoded as a separate category.
/// Characters are stored as strings, so that the reserved categories
/// can use the same markers as the other string encoders.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CharEncoder {
    inner: CategoryEncoder<String>,
}

impl CharEncoder {
    /// Construct an encoder from a character-level category encoder.
    pub fn new(inner: CategoryEncoder<String>) -> Self {
        CharEncoder { inner }
    }

    /// Encode the characters of a string, registering unseen characters.
    pub fn encode(&mut self, s: &str) -> Vec<usize> {
        self.encode_with(s, EncodeMode::Register)
    }

    /// Encode the characters of a string using the given growth policy.
    pub fn encode_with(&mut self, s: &str, mode: EncodeMode) -> Vec<usize> {
        match mode {
            EncodeMode::Register => s
                .chars()
                .map(|c| self.inner.encode(c.to_string()))
                .collect(),
            EncodeMode::Lookup => self.lookup_or_unk(s),
        }
    }

    /// Encode the characters of a string without changing the vocabulary.
    pub fn lookup_or_unk(&self, s: &str) -> Vec<usize> {
        let mut buf = [0u8; 4];
        s.chars()
            .map(|c| self.inner.lookup_or_unk(&*c.encode_utf8(&mut buf)))
            .collect()
    }

    /// Encode several strings, registering unseen characters.
    pub fn encode_group<'a, I>(&mut self, strings: I) -> Vec<Vec<usize>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        strings.into_iter().map(|s| self.encode(s)).collect()
    }

    /// Decode a sequence of character identifiers into a string.
    pub fn decode(&self, ids: &[usize]) -> Result<String, LookupError> {
        let mut decoded = String::with_capacity(ids.len());
        for &id in ids {
            decoded.push_str(self.inner.decode(id)?);
        }

        Ok(decoded)
    }

    /// Get the underlying category encoder.
    pub fn inner(&self) -> &CategoryEncoder<String> {
        &self.inner
    }

    pub fn padding_id(&self) -> usize {
        self.inner.padding_id()
    }

    pub fn size(&self) -> usize {
        self.inner.size()
    }

    /// Serialize the character to identifier mapping as JSON.
    pub fn dumps(&self) -> Fallible<String> {
        self.inner.dumps()
    }

    /// Reconstruct an encoder from its JSON serialization.
    pub fn loads(data: &str) -> Fallible<Self> {
        CategoryEncoder::loads(data).map(CharEncoder::new)
    }
}
