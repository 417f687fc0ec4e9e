//! Category encoders.
//!
//! An encoder assigns integer identifiers to categories, such as
//! lemmas, part-of-speech tags, characters, or disambiguation targets.
//! Identifiers `0` and `1` are reserved for the padding and unknown
//! categories of an encoder instance. Other categories are numbered in
//! the order in which they are first encountered.

use std::borrow::Borrow;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;

use failure::Fallible;
use serde::de::{DeserializeOwned, Error as DeError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

mod chars;
pub use self::chars::CharEncoder;

mod error;
pub use self::error::{LookupError, StateError, VocabularyError};

mod multi;
pub use self::multi::{MultiEncoder, Transformed};

mod target;
pub use self::target::{OutputCategory, SupervisedTargets, TargetStrategy};

/// Padding category of string encoders.
pub const DEFAULT_PADDING: &str = "<PAD>";

/// Unknown category of string encoders.
pub const DEFAULT_UNKNOWN: &str = "<UNK>";

/// Vocabulary growth policy.
///
/// During fitting and training, unseen categories are added to the
/// vocabulary. During inference, the vocabulary must stay fixed and
/// unseen categories are mapped to the unknown identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EncodeMode {
    /// Look up a category, registering it when it is unseen.
    Register,

    /// Look up a category, using the unknown identifier when it is unseen.
    Lookup,
}

/// Bidirectional mapping between categories and identifiers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CategoryEncoder<T>
where
    T: Eq + Hash,
{
    values: Vec<T>,
    numbers: HashMap<T, usize>,
    padding: usize,
    unknown: usize,
}

impl<T> CategoryEncoder<T>
where
    T: Clone + Eq + Hash,
{
    /// Construct an encoder with the given reserved categories.
    ///
    /// `padding` receives identifier `0`, `unknown` identifier `1`.
    pub fn new(padding: T, unknown: T) -> Self {
        let mut encoder = CategoryEncoder {
            values: Vec::new(),
            numbers: HashMap::new(),
            padding: 0,
            unknown: 1,
        };

        encoder.padding = encoder.encode(padding);
        encoder.unknown = encoder.encode(unknown);

        encoder
    }

    /// Reconstruct an encoder from a category to identifier mapping.
    ///
    /// The mapping must contain the reserved categories and its
    /// identifiers must form the range `0..n`.
    pub fn load<I>(stoi: I) -> Result<Self, VocabularyError>
    where
        I: IntoIterator<Item = (T, usize)>,
    {
        let mut stoi = stoi.into_iter().collect::<Vec<_>>();
        if stoi.len() < 2 {
            return Err(VocabularyError::MissingReserved { len: stoi.len() });
        }

        stoi.sort_by_key(|&(_, number)| number);

        let mut values = Vec::with_capacity(stoi.len());
        let mut numbers = HashMap::with_capacity(stoi.len());
        for (expected, (value, number)) in stoi.into_iter().enumerate() {
            if number != expected {
                return Err(VocabularyError::NonContiguous {
                    expected,
                    found: number,
                });
            }

            if let Some(&first) = numbers.get(&value) {
                return Err(VocabularyError::DuplicateCategory {
                    first,
                    second: number,
                });
            }

            numbers.insert(value.clone(), number);
            values.push(value);
        }

        Ok(CategoryEncoder {
            values,
            numbers,
            padding: 0,
            unknown: 1,
        })
    }

    /// Encode a category.
    ///
    /// If the category has been encountered before, its identifier is
    /// returned. Otherwise, the category is added with the next free
    /// identifier.
    pub fn encode(&mut self, category: T) -> usize {
        match self.numbers.entry(category) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                let number = self.values.len();
                self.values.push(e.key().clone());
                e.insert(number);
                number
            }
        }
    }

    /// Encode a category using the given growth policy.
    pub fn encode_with(&mut self, category: T, mode: EncodeMode) -> usize {
        match mode {
            EncodeMode::Register => self.encode(category),
            EncodeMode::Lookup => self.lookup_or_unk(&category),
        }
    }

    /// Encode categories, preserving their order and duplicates.
    pub fn encode_group<I>(&mut self, categories: I) -> Vec<usize>
    where
        I: IntoIterator<Item = T>,
    {
        categories.into_iter().map(|c| self.encode(c)).collect()
    }
}

impl<T> CategoryEncoder<T>
where
    T: Eq + Hash,
{
    /// Decode an identifier.
    pub fn decode(&self, id: usize) -> Result<&T, LookupError> {
        self.values.get(id).ok_or(LookupError::UnknownId { id })
    }

    /// Look up the identifier of a category without registering it.
    pub fn number<Q>(&self, category: &Q) -> Option<usize>
    where
        T: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.numbers.get(category).cloned()
    }

    /// Look up the identifier of a category.
    ///
    /// Returns the unknown identifier for unseen categories.
    pub fn lookup_or_unk<Q>(&self, category: &Q) -> usize
    where
        T: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.number(category).unwrap_or(self.unknown)
    }

    /// Identifier of the padding category.
    pub fn padding_id(&self) -> usize {
        self.padding
    }

    /// Identifier of the unknown category.
    pub fn unknown_id(&self) -> usize {
        self.unknown
    }

    /// Number of categories, including the reserved categories.
    pub fn size(&self) -> usize {
        self.values.len()
    }

    /// Iterate over the category to identifier mapping in identifier order.
    pub fn stoi(&self) -> impl Iterator<Item = (&T, usize)> {
        self.values.iter().enumerate().map(|(number, value)| (value, number))
    }

    /// Iterate over the categories that are not reserved.
    pub fn categories(&self) -> impl Iterator<Item = &T> {
        let padding = self.padding;
        let unknown = self.unknown;
        self.values
            .iter()
            .enumerate()
            .filter(move |&(number, _)| number != padding && number != unknown)
            .map(|(_, value)| value)
    }
}

impl<T> CategoryEncoder<T>
where
    T: Clone + DeserializeOwned + Eq + Hash + Serialize,
{
    /// Serialize the category to identifier mapping as JSON.
    pub fn dumps(&self) -> Fallible<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Reconstruct an encoder from its JSON serialization.
    pub fn loads(data: &str) -> Fallible<Self> {
        Ok(serde_json::from_str(data)?)
    }
}

impl Default for CategoryEncoder<String> {
    fn default() -> Self {
        CategoryEncoder::new(DEFAULT_PADDING.to_owned(), DEFAULT_UNKNOWN.to_owned())
    }
}

// Only the category to identifier mapping is stored, the inverse is
// reconstructed while loading.
impl<T> Serialize for CategoryEncoder<T>
where
    T: Eq + Hash + Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.stoi())
    }
}

impl<'de, T> Deserialize<'de> for CategoryEncoder<T>
where
    T: Clone + Deserialize<'de> + Eq + Hash,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let stoi = Vec::<(T, usize)>::deserialize(deserializer)?;
        CategoryEncoder::load(stoi).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::{CategoryEncoder, EncodeMode, LookupError, VocabularyError};

    #[test]
    fn reserved_categories() {
        let encoder = CategoryEncoder::<String>::default();
        assert_eq!(encoder.size(), 2);
        assert_eq!(encoder.padding_id(), 0);
        assert_eq!(encoder.unknown_id(), 1);
        assert_eq!(encoder.decode(0).unwrap(), "<PAD>");
        assert_eq!(encoder.decode(1).unwrap(), "<UNK>");
        assert_eq!(encoder.categories().count(), 0);
    }

    #[test]
    fn encode_group_reuses_identifiers() {
        let mut encoder = CategoryEncoder::default();
        assert_eq!(
            encoder.encode_group(vec!["a", "b", "c", "a"].into_iter().map(String::from)),
            vec![2, 3, 4, 2]
        );
        assert_eq!(encoder.size(), 5);
    }

    #[test]
    fn encode_is_idempotent() {
        let mut encoder = CategoryEncoder::default();
        let first = encoder.encode("estre".to_owned());
        let second = encoder.encode("estre".to_owned());
        assert_eq!(first, second);
        assert_eq!(encoder.decode(first).unwrap(), "estre");
        assert_eq!(encoder.number("estre"), Some(first));
    }

    #[test]
    fn lookup_does_not_grow() {
        let mut encoder = CategoryEncoder::default();
        encoder.encode("en".to_owned());

        assert_eq!(encoder.encode_with("en".to_owned(), EncodeMode::Lookup), 2);
        assert_eq!(encoder.encode_with("sui".to_owned(), EncodeMode::Lookup), 1);
        assert_eq!(encoder.lookup_or_unk("grant"), 1);
        assert_eq!(encoder.size(), 3);

        assert_eq!(
            encoder.encode_with("sui".to_owned(), EncodeMode::Register),
            3
        );
        assert_eq!(encoder.size(), 4);
    }

    #[test]
    fn decode_unknown_id_fails() {
        let encoder = CategoryEncoder::<String>::default();
        assert_eq!(
            encoder.decode(999).unwrap_err(),
            LookupError::UnknownId { id: 999 }
        );
    }

    #[test]
    fn dumps_then_loads() {
        let mut encoder = CategoryEncoder::default();
        encoder.encode_group(vec!["certes", "dire", "Oliver"].into_iter().map(String::from));

        let loaded = CategoryEncoder::<String>::loads(&encoder.dumps().unwrap()).unwrap();
        assert_eq!(
            loaded.stoi().collect::<Vec<_>>(),
            encoder.stoi().collect::<Vec<_>>()
        );
        assert_eq!(loaded, encoder);
        assert_eq!(loaded.decode(3).unwrap(), "dire");
    }

    #[test]
    fn load_keeps_reserved_entries() {
        let stoi = vec![
            ("je".to_owned(), 2),
            ("<UNK>".to_owned(), 1),
            ("<PAD>".to_owned(), 0),
        ];
        let encoder = CategoryEncoder::load(stoi).unwrap();
        assert_eq!(encoder.decode(0).unwrap(), "<PAD>");
        assert_eq!(encoder.decode(1).unwrap(), "<UNK>");
        assert_eq!(encoder.number("je"), Some(2));
    }

    #[test]
    fn load_rejects_gaps() {
        let stoi = vec![
            ("<PAD>".to_owned(), 0),
            ("<UNK>".to_owned(), 1),
            ("je".to_owned(), 3),
        ];
        assert_eq!(
            CategoryEncoder::load(stoi).unwrap_err(),
            VocabularyError::NonContiguous {
                expected: 2,
                found: 3
            }
        );
    }

    #[test]
    fn load_rejects_missing_reserved() {
        let stoi = vec![("<PAD>".to_owned(), 0)];
        assert_eq!(
            CategoryEncoder::load(stoi).unwrap_err(),
            VocabularyError::MissingReserved { len: 1 }
        );
    }
}
