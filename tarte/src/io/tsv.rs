use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::rc::Rc;

use failure::{Fallible, ResultExt};

use super::ParseError;

/// A sentence read from a tabular corpus.
///
/// The sentence is stored column-wise. The first column holds the
/// surface tokens, the other columns the annotations named by the
/// header of the file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawSentence {
    header: Rc<Vec<String>>,
    columns: Vec<Vec<String>>,
}

impl RawSentence {
    /// Construct a sentence from its header and columns.
    ///
    /// Panics when the number of columns differs from the header or
    /// when the columns differ in length.
    pub fn new(header: Rc<Vec<String>>, columns: Vec<Vec<String>>) -> Self {
        assert!(!header.is_empty(), "Sentence without columns");
        assert_eq!(
            header.len(),
            columns.len(),
            "Header and column count mismatch"
        );
        assert!(
            columns.iter().all(|c| c.len() == columns[0].len()),
            "Columns of unequal length"
        );

        RawSentence { header, columns }
    }

    /// Get the column names.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Get the values of a column.
    pub fn column(&self, name: &str) -> Option<&[String]> {
        self.header
            .iter()
            .position(|n| n == name)
            .map(|idx| self.columns[idx].as_slice())
    }

    /// Get the values of a column for modification.
    pub fn column_mut(&mut self, name: &str) -> Option<&mut [String]> {
        let idx = self.header.iter().position(|n| n == name)?;
        Some(self.columns[idx].as_mut_slice())
    }

    /// Get the surface tokens.
    pub fn tokens(&self) -> &[String] {
        &self.columns[0]
    }

    pub fn is_empty(&self) -> bool {
        self.columns[0].is_empty()
    }

    /// Sentence length in tokens.
    pub fn len(&self) -> usize {
        self.columns[0].len()
    }

    /// Iterate over the rows of the sentence.
    pub fn rows(&self) -> impl Iterator<Item = Vec<&str>> {
        let columns = &self.columns;
        (0..self.len()).map(move |row| columns.iter().map(|c| c[row].as_str()).collect())
    }

    /// Split the sentence in chunks of at most `max_len` tokens.
    fn split(self, max_len: usize) -> Vec<RawSentence> {
        assert!(max_len > 0, "Maximum sentence length should at least be 1.");

        if self.len() <= max_len {
            return vec![self];
        }

        let n_chunks = (self.len() + max_len - 1) / max_len;
        (0..n_chunks)
            .map(|chunk| {
                let start = chunk * max_len;
                let end = std::cmp::min(start + max_len, self.len());
                RawSentence {
                    header: self.header.clone(),
                    columns: self
                        .columns
                        .iter()
                        .map(|c| c[start..end].to_vec())
                        .collect(),
                }
            })
            .collect()
    }
}

/// Source of annotated sentences.
///
/// Every call of `sentences` starts a new pass over the data, yielding
/// each sentence together with the name of the file it was read from.
pub trait ReadSentences {
    type Iter: Iterator<Item = Fallible<(String, RawSentence)>>;

    fn sentences(&self) -> Fallible<Self::Iter>;
}

/// Reader for tab-separated corpora.
///
/// The first line of the data is a header with the column names. Every
/// other non-empty line is a token, empty lines separate sentences.
pub struct TsvReader<R> {
    read: R,
    name: String,
    separator: char,
    max_sent_len: Option<usize>,
    header: Option<Rc<Vec<String>>>,
    line: usize,
    pending: VecDeque<RawSentence>,
    done: bool,
}

impl<R> TsvReader<R>
where
    R: BufRead,
{
    /// Construct a reader.
    ///
    /// `name` is used to identify the data in errors.
    pub fn new(read: R, name: impl Into<String>) -> Self {
        TsvReader {
            read,
            name: name.into(),
            separator: '\t',
            max_sent_len: None,
            header: None,
            line: 0,
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Set the column separator.
    pub fn separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Split sentences that are longer than `max_sent_len` tokens.
    pub fn max_sent_len(mut self, max_sent_len: Option<usize>) -> Self {
        self.max_sent_len = max_sent_len;
        self
    }

    /// Get the column names, reading the header if necessary.
    pub fn header(&mut self) -> Fallible<Rc<Vec<String>>> {
        if let Some(ref header) = self.header {
            return Ok(header.clone());
        }

        let header = match self.read_line()? {
            Some(line) if !line.is_empty() => Rc::new(
                line.split(self.separator)
                    .map(ToOwned::to_owned)
                    .collect::<Vec<_>>(),
            ),
            _ => {
                return Err(ParseError::MissingHeader {
                    path: self.name.clone(),
                }
                .into())
            }
        };

        self.header = Some(header.clone());
        Ok(header)
    }

    fn read_line(&mut self) -> Fallible<Option<String>> {
        let mut line = String::new();
        if self.read.read_line(&mut line)? == 0 {
            return Ok(None);
        }

        self.line += 1;

        let trimmed_len = line.trim_end_matches(|c| c == '\n' || c == '\r').len();
        line.truncate(trimmed_len);

        Ok(Some(line))
    }

    fn read_sentence(&mut self) -> Fallible<Option<RawSentence>> {
        let header = self.header()?;
        let mut columns = vec![Vec::new(); header.len()];

        while let Some(line) = self.read_line()? {
            if line.trim().is_empty() {
                if columns[0].is_empty() {
                    continue;
                }

                break;
            }

            let fields = line.split(self.separator).collect::<Vec<_>>();
            if fields.len() != header.len() {
                return Err(ParseError::ColumnCount {
                    path: self.name.clone(),
                    line: self.line,
                    expected: header.len(),
                    found: fields.len(),
                }
                .into());
            }

            for (column, field) in columns.iter_mut().zip(fields) {
                column.push(field.to_owned());
            }
        }

        if columns[0].is_empty() {
            Ok(None)
        } else {
            Ok(Some(RawSentence::new(header, columns)))
        }
    }
}

impl<R> Iterator for TsvReader<R>
where
    R: BufRead,
{
    type Item = Fallible<RawSentence>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(sentence) = self.pending.pop_front() {
            return Some(Ok(sentence));
        }

        if self.done {
            return None;
        }

        match self.read_sentence() {
            Ok(Some(sentence)) => {
                match self.max_sent_len {
                    Some(max_len) => self.pending.extend(sentence.split(max_len)),
                    None => self.pending.push_back(sentence),
                }
                self.pending.pop_front().map(Ok)
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                // No recovery within a malformed file.
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Tab-separated corpus consisting of one or more files.
#[derive(Clone, Debug)]
pub struct TsvCorpus {
    paths: Vec<PathBuf>,
    separator: char,
    max_sent_len: Option<usize>,
}

impl TsvCorpus {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        TsvCorpus {
            paths: paths.into_iter().map(Into::into).collect(),
            separator: '\t',
            max_sent_len: None,
        }
    }

    /// Set the column separator.
    pub fn separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Split sentences that are longer than `max_sent_len` tokens.
    pub fn max_sent_len(mut self, max_sent_len: Option<usize>) -> Self {
        self.max_sent_len = max_sent_len;
        self
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl ReadSentences for TsvCorpus {
    type Iter = CorpusSentences;

    fn sentences(&self) -> Fallible<Self::Iter> {
        Ok(CorpusSentences {
            paths: self.paths.clone().into_iter(),
            separator: self.separator,
            max_sent_len: self.max_sent_len,
            current: None,
        })
    }
}

/// Iterator over the sentences of a `TsvCorpus`.
pub struct CorpusSentences {
    paths: std::vec::IntoIter<PathBuf>,
    separator: char,
    max_sent_len: Option<usize>,
    current: Option<TsvReader<BufReader<File>>>,
}

impl CorpusSentences {
    fn open_next(&mut self) -> Option<Fallible<()>> {
        let path = self.paths.next()?;
        let name = path.to_string_lossy().into_owned();

        let f = match File::open(&path).with_context(|e| format!("Cannot open '{}': {}", name, e))
        {
            Ok(f) => f,
            Err(err) => return Some(Err(err.into())),
        };

        self.current = Some(
            TsvReader::new(BufReader::new(f), name)
                .separator(self.separator)
                .max_sent_len(self.max_sent_len),
        );

        Some(Ok(()))
    }
}

impl Iterator for CorpusSentences {
    type Item = Fallible<(String, RawSentence)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(ref mut reader) = self.current {
                if let Some(sentence) = reader.next() {
                    let name = reader.name.clone();
                    return Some(sentence.map(|sentence| (name, sentence)));
                }

                self.current = None;
            }

            if let Err(err) = self.open_next()? {
                return Some(Err(err));
            }
        }
    }
}

/// Writer for tab-separated corpora.
pub struct TsvWriter<W>
where
    W: Write,
{
    write: W,
    separator: char,
    header: Option<Vec<String>>,
}

impl<W> TsvWriter<W>
where
    W: Write,
{
    pub fn new(write: W) -> Self {
        TsvWriter {
            write,
            separator: '\t',
            header: None,
        }
    }

    /// Set the column separator.
    pub fn separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Write a sentence.
    ///
    /// The header is written before the first sentence. Sentences with
    /// another header are rejected.
    pub fn write_sentence(&mut self, sentence: &RawSentence) -> Fallible<()> {
        let sep = self.separator.to_string();

        match self.header {
            Some(ref header) => {
                if header.as_slice() != sentence.header() {
                    return Err(ParseError::HeaderMismatch {
                        expected: header.clone(),
                        found: sentence.header().to_vec(),
                    }
                    .into());
                }
            }
            None => {
                writeln!(self.write, "{}", sentence.header().join(&sep))?;
                self.header = Some(sentence.header().to_vec());
            }
        }

        for row in sentence.rows() {
            writeln!(self.write, "{}", row.join(&sep))?;
        }

        writeln!(self.write)?;

        Ok(())
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> Fallible<()> {
        Ok(self.write.flush()?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{ReadSentences, TsvCorpus, TsvReader, TsvWriter};
    use crate::io::ParseError;

    static TWO_SENTENCES: &str =
        "token\tlemma\tpos\nCertes\tcertes\tADVgen\ndist\tdire\tVERcjg\n\n\nEt\tet\tCONcoo\n";

    #[test]
    fn reads_sentences() {
        let reader = TsvReader::new(Cursor::new(TWO_SENTENCES), "test");
        let sentences = reader.collect::<Result<Vec<_>, _>>().unwrap();

        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].tokens(), &["Certes", "dist"]);
        assert_eq!(sentences[0].column("lemma").unwrap(), &["certes", "dire"]);
        assert_eq!(sentences[0].column("pos").unwrap(), &["ADVgen", "VERcjg"]);
        assert_eq!(sentences[1].tokens(), &["Et"]);
        assert!(sentences[1].column("morph").is_none());
    }

    #[test]
    fn column_count_mismatch() {
        let data = "token\tlemma\tpos\nCertes\tcertes\tADVgen\ndist\tdire\n";
        let mut reader = TsvReader::new(Cursor::new(data), "test");
        let err = reader.next().unwrap().unwrap_err();

        assert_eq!(
            err.downcast::<ParseError>().unwrap(),
            ParseError::ColumnCount {
                path: "test".to_owned(),
                line: 3,
                expected: 3,
                found: 2
            }
        );
        assert!(reader.next().is_none());
    }

    #[test]
    fn missing_header() {
        let mut reader = TsvReader::new(Cursor::new(""), "empty");
        let err = reader.next().unwrap().unwrap_err();
        assert_eq!(
            err.downcast::<ParseError>().unwrap(),
            ParseError::MissingHeader {
                path: "empty".to_owned()
            }
        );
    }

    #[test]
    fn splits_long_sentences() {
        let data = "token\tlemma\na\ta\nb\tb\nc\tc\nd\td\ne\te\n";
        let reader = TsvReader::new(Cursor::new(data), "test").max_sent_len(Some(2));
        let lens = reader.map(|s| s.unwrap().len()).collect::<Vec<_>>();
        assert_eq!(lens, vec![2, 2, 1]);
    }

    #[test]
    fn corpus_is_restartable() {
        let corpus = TsvCorpus::new(vec!["testdata/test.tsv"]);
        let first = corpus.sentences().unwrap().count();
        let second = corpus.sentences().unwrap().count();
        assert_eq!(first, 2);
        assert_eq!(first, second);

        for sentence in corpus.sentences().unwrap() {
            let (path, _) = sentence.unwrap();
            assert_eq!(path, "testdata/test.tsv");
        }
    }

    #[test]
    fn write_then_read() {
        let reader = TsvReader::new(Cursor::new(TWO_SENTENCES), "test");
        let sentences = reader.collect::<Result<Vec<_>, _>>().unwrap();

        let mut writer = TsvWriter::new(Vec::new());
        for sentence in &sentences {
            writer.write_sentence(sentence).unwrap();
        }

        let data = writer.write;
        let reread = TsvReader::new(Cursor::new(data), "test")
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(sentences, reread);
    }

    #[test]
    fn writer_rejects_other_header() {
        let first = "token\tlemma\tpos\nCertes\tcertes\tADVgen\n";
        let second = "token\tpos\tlemma\nEt\tCONcoo\tet\n";
        let read = |data: &'static str| {
            TsvReader::new(Cursor::new(data), "test")
                .next()
                .unwrap()
                .unwrap()
        };

        let mut writer = TsvWriter::new(Vec::new());
        writer.write_sentence(&read(first)).unwrap();
        let err = writer.write_sentence(&read(second)).unwrap_err();
        assert_eq!(
            err.downcast::<ParseError>().unwrap(),
            ParseError::HeaderMismatch {
                expected: vec!["token".to_owned(), "lemma".to_owned(), "pos".to_owned()],
                found: vec!["token".to_owned(), "pos".to_owned(), "lemma".to_owned()],
            }
        );

        // Nothing of the rejected sentence is written.
        let data = String::from_utf8(writer.write).unwrap();
        assert!(!data.contains("CONcoo"));
    }
}
