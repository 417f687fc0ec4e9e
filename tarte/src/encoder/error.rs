use failure::Fail;

/// Vocabulary lookup error.
#[derive(Clone, Debug, Eq, Fail, PartialEq)]
pub enum LookupError {
    /// The identifier was never assigned to a category.
    #[fail(display = "unknown category identifier: {}", id)]
    UnknownId { id: usize },

    /// A training example does not carry a disambiguation code.
    #[fail(display = "no disambiguation target for token '{}'", token)]
    MissingTarget { token: String },
}

/// Vocabulary state error.
#[derive(Clone, Debug, Eq, Fail, PartialEq)]
pub enum StateError {
    /// The vocabulary was finalized and cannot grow through fitting.
    #[fail(display = "cannot refit a finalized vocabulary")]
    Refit,
}

/// Persisted vocabulary error.
#[derive(Clone, Debug, Eq, Fail, PartialEq)]
pub enum VocabularyError {
    /// Identifiers in a persisted mapping do not form the range `0..n`.
    #[fail(display = "identifiers are not contiguous: expected {}, found {}", expected, found)]
    NonContiguous { expected: usize, found: usize },

    /// A persisted mapping lacks the reserved padding/unknown entries.
    #[fail(display = "mapping has {} entries, at least the two reserved entries are required", len)]
    MissingReserved { len: usize },

    /// The same category is mapped to more than one identifier.
    #[fail(display = "category is mapped to both {} and {}", first, second)]
    DuplicateCategory { first: usize, second: usize },
}
