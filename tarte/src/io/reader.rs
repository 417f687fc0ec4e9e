use std::collections::VecDeque;
use std::rc::Rc;

use failure::Fallible;

use super::{ParseError, RawSentence, ReadSentences};

/// Names of the annotation columns used for disambiguation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Columns {
    pub lemma: String,
    pub pos: String,
    pub disambiguation: String,
}

impl Default for Columns {
    fn default() -> Self {
        Columns {
            lemma: "lemma".to_owned(),
            pos: "pos".to_owned(),
            disambiguation: "Dis".to_owned(),
        }
    }
}

/// Sentence context of disambiguation sites.
///
/// The tokens, lemmas, and part-of-speech tags are parallel sequences.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Context {
    tokens: Vec<String>,
    lemmas: Vec<String>,
    pos: Vec<String>,
}

impl Context {
    /// Construct a context.
    ///
    /// Panics when the sequences differ in length.
    pub fn new(tokens: Vec<String>, lemmas: Vec<String>, pos: Vec<String>) -> Self {
        assert_eq!(
            tokens.len(),
            lemmas.len(),
            "Token and lemma length mismatch"
        );
        assert_eq!(tokens.len(), pos.len(), "Token and tag length mismatch");

        Context {
            tokens,
            lemmas,
            pos,
        }
    }

    /// Construct a context from the columns of a sentence.
    ///
    /// `path` identifies the source of the sentence in errors.
    pub fn from_sentence(
        path: &str,
        sentence: &RawSentence,
        columns: &Columns,
    ) -> Result<Self, ParseError> {
        let column = |name: &str| {
            sentence
                .column(name)
                .map(<[String]>::to_vec)
                .ok_or_else(|| ParseError::MissingColumn {
                    path: path.to_owned(),
                    column: name.to_owned(),
                })
        };

        Ok(Context::new(
            sentence.tokens().to_vec(),
            column(&columns.lemma)?,
            column(&columns.pos)?,
        ))
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn lemmas(&self) -> &[String] {
        &self.lemmas
    }

    pub fn pos(&self) -> &[String] {
        &self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }
}

/// A token to disambiguate within its sentence context.
///
/// Examples read from a corpus carry the disambiguation code of the
/// site. Examples constructed for tagging do not.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Example {
    context: Rc<Context>,
    position: usize,
    code: Option<String>,
}

impl Example {
    /// Construct an example without a disambiguation code.
    pub fn new(context: Rc<Context>, position: usize) -> Self {
        assert!(position < context.len(), "Site outside of the context");

        Example {
            context,
            position,
            code: None,
        }
    }

    /// Construct an example with a disambiguation code.
    pub fn with_code(context: Rc<Context>, position: usize, code: impl Into<String>) -> Self {
        let mut example = Example::new(context, position);
        example.code = Some(code.into());
        example
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Position of the site within the context.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Surface form of the site.
    pub fn token(&self) -> &str {
        &self.context.tokens[self.position]
    }

    /// Lemma of the site.
    pub fn lemma(&self) -> &str {
        &self.context.lemmas[self.position]
    }

    /// Disambiguation code of the site.
    pub fn code(&self) -> Option<&str> {
        self.code.as_ref().map(String::as_str)
    }

    /// The lemma and disambiguation code of the site.
    pub fn target(&self) -> Option<(&str, &str)> {
        self.code().map(|code| (self.lemma(), code))
    }

    /// Check whether two examples share the same context.
    pub fn shares_context(&self, other: &Example) -> bool {
        Rc::ptr_eq(&self.context, &other.context)
    }
}

/// A disambiguation site read from a corpus.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SiteRecord {
    /// File that the site was read from.
    pub path: String,

    /// Running (1-based) index of the site in the corpus.
    pub index: usize,

    pub example: Example,
}

/// Check whether a disambiguation column value marks a site.
pub fn is_disambiguation_site(value: &str) -> bool {
    !value.is_empty() && value.chars().all(char::is_numeric)
}

/// Reader for disambiguation sites.
///
/// This reader wraps a sentence source and only yields the tokens whose
/// disambiguation column holds a numeric code. A sentence with several
/// sites yields a record per site, all sharing the same context.
/// Sentences without sites are skipped.
pub struct DisambiguationReader<R> {
    inner: R,
    columns: Columns,
    nsents: Option<usize>,
}

impl<R> DisambiguationReader<R>
where
    R: ReadSentences,
{
    pub fn new(inner: R, columns: Columns) -> Self {
        DisambiguationReader {
            inner,
            columns,
            nsents: None,
        }
    }

    /// Get the wrapped sentence source.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Iterate over all disambiguation sites.
    pub fn sites(&self) -> Fallible<Sites<R::Iter>> {
        Ok(Sites {
            sentences: self.inner.sentences()?,
            columns: self.columns.clone(),
            pending: VecDeque::new(),
            total: 0,
        })
    }

    /// Number of disambiguation sites.
    ///
    /// The count is computed with a full pass over the data on the first
    /// call and cached afterwards.
    pub fn nsents(&mut self) -> Fallible<usize> {
        if let Some(nsents) = self.nsents {
            return Ok(nsents);
        }

        let mut nsents = 0;
        for site in self.sites()? {
            site?;
            nsents += 1;
        }

        self.nsents = Some(nsents);

        Ok(nsents)
    }
}

/// Iterator over disambiguation sites.
pub struct Sites<I> {
    sentences: I,
    columns: Columns,
    pending: VecDeque<SiteRecord>,
    total: usize,
}

impl<I> Sites<I> {
    fn extract(&mut self, path: String, sentence: RawSentence) -> Fallible<()> {
        let disambiguation = sentence
            .column(&self.columns.disambiguation)
            .ok_or_else(|| ParseError::MissingColumn {
                path: path.clone(),
                column: self.columns.disambiguation.clone(),
            })?;
        if !disambiguation.iter().any(|v| is_disambiguation_site(v)) {
            return Ok(());
        }

        let context = Rc::new(Context::from_sentence(&path, &sentence, &self.columns)?);

        for (position, code) in disambiguation.iter().enumerate() {
            if !is_disambiguation_site(code) {
                continue;
            }

            self.total += 1;
            self.pending.push_back(SiteRecord {
                path: path.clone(),
                index: self.total,
                example: Example::with_code(context.clone(), position, code.as_str()),
            });
        }

        Ok(())
    }
}

impl<I> Iterator for Sites<I>
where
    I: Iterator<Item = Fallible<(String, RawSentence)>>,
{
    type Item = Fallible<SiteRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }

            let (path, sentence) = match self.sentences.next()? {
                Ok(sentence) => sentence,
                Err(err) => return Some(Err(err)),
            };

            if let Err(err) = self.extract(path, sentence) {
                return Some(Err(err));
            }
        }
    }
}
