use failure::Fail;

/// Corpus parse error.
#[derive(Clone, Debug, Eq, Fail, PartialEq)]
pub enum ParseError {
    /// A row does not have as many columns as the header.
    #[fail(
        display = "{}:{}: expected {} columns, found {}",
        path, line, expected, found
    )]
    ColumnCount {
        path: String,
        line: usize,
        expected: usize,
        found: usize,
    },

    /// A required column is absent from the header.
    #[fail(display = "{}: missing column '{}'", path, column)]
    MissingColumn { path: String, column: String },

    /// A sentence does not have the columns of earlier sentences.
    #[fail(
        display = "sentence has columns {:?}, expected {:?}",
        found, expected
    )]
    HeaderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// The file does not start with a header row.
    #[fail(display = "{}: missing header", path)]
    MissingHeader { path: String },
}
