use std::collections::BTreeMap;
use std::io::Write;
use std::rc::Rc;

use failure::Fallible;
use lazy_static::lazy_static;
use regex::Regex;

use super::{is_disambiguation_site, ParseError, RawSentence};

/// Disambiguation value of tokens that do not need disambiguation.
pub const NO_DISAMBIGUATION: &str = "_";

lazy_static! {
    static ref NUMBERED_LEMMA: Regex = Regex::new(r"^(\w+)(\d+)$").unwrap();
}

/// Split a numbered lemma into the base lemma and its code.
///
/// Returns `None` if the lemma does not end in a number.
///
/// ```
/// use tarte::io::split_lemma;
///
/// assert_eq!(split_lemma("estre1"), Some(("estre", "1")));
/// assert_eq!(split_lemma("estre"), None);
/// ```
pub fn split_lemma(lemma: &str) -> Option<(&str, &str)> {
    NUMBERED_LEMMA.captures(lemma).and_then(|captures| {
        let base = captures.get(1)?.as_str();
        let code = captures.get(2)?.as_str();
        Some((base, code))
    })
}

/// Move numeric lemma suffixes to a disambiguation column.
///
/// The numeric suffix of every lemma in `lemma_column` is stripped and
/// stored in `disambiguation_column`. Tokens without suffix get the
/// `NO_DISAMBIGUATION` value. The disambiguation column is appended
/// when the sentence does not have it yet.
pub fn derive_disambiguation(
    sentence: &RawSentence,
    lemma_column: &str,
    disambiguation_column: &str,
) -> Fallible<RawSentence> {
    let lemma_idx = sentence
        .header()
        .iter()
        .position(|name| name == lemma_column)
        .ok_or_else(|| ParseError::MissingColumn {
            path: String::new(),
            column: lemma_column.to_owned(),
        })?;

    let mut header = sentence.header().to_vec();
    let mut columns = header
        .iter()
        .map(|name| sentence.column(name).unwrap_or(&[]).to_vec())
        .collect::<Vec<_>>();

    let dis_idx = match header.iter().position(|name| name == disambiguation_column) {
        Some(idx) => idx,
        None => {
            header.push(disambiguation_column.to_owned());
            columns.push(Vec::new());
            header.len() - 1
        }
    };

    let mut lemmas = Vec::with_capacity(sentence.len());
    let mut codes = Vec::with_capacity(sentence.len());
    for lemma in &columns[lemma_idx] {
        match split_lemma(lemma) {
            Some((base, code)) => {
                lemmas.push(base.to_owned());
                codes.push(code.to_owned());
            }
            None => {
                lemmas.push(lemma.clone());
                codes.push(NO_DISAMBIGUATION.to_owned());
            }
        }
    }

    columns[lemma_idx] = lemmas;
    columns[dis_idx] = codes;

    Ok(RawSentence::new(Rc::new(header), columns))
}

/// Frequency table of lemma variants.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DisambiguationTable {
    counts: BTreeMap<(String, String), usize>,
}

impl DisambiguationTable {
    pub fn new() -> Self {
        DisambiguationTable::default()
    }

    /// Count the disambiguation sites of a sentence.
    pub fn add(
        &mut self,
        sentence: &RawSentence,
        lemma_column: &str,
        disambiguation_column: &str,
    ) -> Fallible<()> {
        let missing = |column: &str| ParseError::MissingColumn {
            path: String::new(),
            column: column.to_owned(),
        };

        let lemmas = sentence
            .column(lemma_column)
            .ok_or_else(|| missing(lemma_column))?;
        let codes = sentence
            .column(disambiguation_column)
            .ok_or_else(|| missing(disambiguation_column))?;

        for (lemma, code) in lemmas.iter().zip(codes) {
            if is_disambiguation_site(code) {
                *self
                    .counts
                    .entry((lemma.clone(), code.clone()))
                    .or_insert(0) += 1;
            }
        }

        Ok(())
    }

    /// Get the number of occurrences of a lemma variant.
    pub fn count(&self, lemma: &str, code: &str) -> usize {
        self.counts
            .get(&(lemma.to_owned(), code.to_owned()))
            .cloned()
            .unwrap_or(0)
    }

    /// Number of distinct lemma variants.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Write the table as tab-separated lemma, code, and count.
    pub fn write<W>(&self, mut write: W) -> Fallible<()>
    where
        W: Write,
    {
        writeln!(write, "lemma\tcode\tcount")?;
        for ((lemma, code), count) in &self.counts {
            writeln!(write, "{}\t{}\t{}", lemma, code, count)?;
        }

        Ok(())
    }
}
