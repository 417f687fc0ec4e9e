use std::collections::{HashMap, HashSet};

use failure::Fallible;
use log::debug;
use serde_derive::{Deserialize, Serialize};

use super::{
    CategoryEncoder, CharEncoder, EncodeMode, LookupError, OutputCategory, StateError,
    SupervisedTargets, TargetStrategy,
};
use crate::io::{DisambiguationReader, Example, ReadSentences};

/// Encoded inputs of a group of examples.
///
/// All fields are aligned by example index.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Transformed {
    /// Identifier of the token to disambiguate.
    pub tokens: Vec<usize>,

    /// Lemma identifiers of the sentence context.
    pub lemmas: Vec<Vec<usize>>,

    /// Part-of-speech identifiers of the sentence context.
    pub pos: Vec<Vec<usize>>,

    /// Character identifiers of the token to disambiguate.
    pub chars: Vec<Vec<usize>>,

    /// Position of the token to disambiguate in its context.
    pub positions: Vec<usize>,
}

impl Transformed {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of examples.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }
}

/// Encoder for disambiguation examples.
///
/// This encoder combines the vocabularies for context lemmas, context
/// tokens, context part-of-speech tags, target characters, and outputs.
/// The output vocabulary is managed by a `TargetStrategy`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(bound(serialize = "", deserialize = "S: Default"))]
pub struct MultiEncoder<S = SupervisedTargets> {
    lemma: CategoryEncoder<String>,
    token: CategoryEncoder<String>,
    output: CategoryEncoder<OutputCategory>,
    pos: CategoryEncoder<String>,
    #[serde(rename = "char")]
    chars: CharEncoder,

    #[serde(skip)]
    fitted: bool,

    #[serde(skip)]
    strategy: S,
}

impl<S> Default for MultiEncoder<S>
where
    S: Default,
{
    fn default() -> Self {
        MultiEncoder::new(S::default())
    }
}

impl<S> MultiEncoder<S> {
    /// Construct an empty encoder with the given target strategy.
    pub fn new(strategy: S) -> Self {
        MultiEncoder {
            lemma: CategoryEncoder::default(),
            token: CategoryEncoder::default(),
            output: CategoryEncoder::default(),
            pos: CategoryEncoder::default(),
            chars: CharEncoder::default(),
            fitted: false,
            strategy,
        }
    }

    pub fn lemma(&self) -> &CategoryEncoder<String> {
        &self.lemma
    }

    pub fn token(&self) -> &CategoryEncoder<String> {
        &self.token
    }

    pub fn pos(&self) -> &CategoryEncoder<String> {
        &self.pos
    }

    pub fn output(&self) -> &CategoryEncoder<OutputCategory> {
        &self.output
    }

    pub fn chars(&self) -> &CharEncoder {
        &self.chars
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Mark the vocabularies as complete.
    ///
    /// After finalization, `fit` fails. Transformation in registering
    /// mode is still possible.
    pub fn finalize(&mut self) {
        self.fitted = true;
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    /// Map every lemma to the output identifiers of its variants.
    pub fn variant_table(&self) -> HashMap<&str, Vec<usize>> {
        let mut table: HashMap<&str, Vec<usize>> = HashMap::new();
        for (category, id) in self.output.stoi() {
            if let Some((lemma, _)) = category.as_variant() {
                table.entry(lemma).or_default().push(id);
            }
        }

        table
    }

    /// Get the output identifiers of the variants of a lemma.
    pub fn variants(&self, lemma: &str) -> Vec<usize> {
        self.output
            .stoi()
            .filter_map(|(category, id)| match category.as_variant() {
                Some((variant_lemma, _)) if variant_lemma == lemma => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Lemmas that have more than one registered variant.
    pub fn need_categorization(&self) -> HashSet<&str> {
        self.variant_table()
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(lemma, _)| lemma)
            .collect()
    }
}

impl<S> MultiEncoder<S>
where
    S: TargetStrategy,
{
    /// Output category of a lemma variant.
    pub fn get_category(&self, lemma: &str, code: &str) -> OutputCategory {
        self.strategy.category_key(lemma, code)
    }

    /// Register the vocabulary of examples.
    ///
    /// Fitting the same example more than once does not change any
    /// identifier. Fails if the encoder was finalized.
    pub fn fit<'a, I>(&mut self, examples: I) -> Fallible<()>
    where
        I: IntoIterator<Item = &'a Example>,
    {
        if self.fitted {
            return Err(StateError::Refit.into());
        }

        for example in examples {
            let context = example.context();
            for ((token, lemma), pos) in context
                .tokens()
                .iter()
                .zip(context.lemmas())
                .zip(context.pos())
            {
                self.token.encode(token.clone());
                self.lemma.encode(lemma.clone());
                self.pos.encode(pos.clone());
            }

            self.chars.encode(example.token());
            self.strategy.fit(&mut self.output, example);
        }

        Ok(())
    }

    /// Register the vocabulary of all sites of a corpus and finalize.
    ///
    /// Returns the number of sites.
    pub fn fit_reader<R>(&mut self, reader: &DisambiguationReader<R>) -> Fallible<usize>
    where
        R: ReadSentences,
    {
        if self.fitted {
            return Err(StateError::Refit.into());
        }

        let mut n_sites = 0;
        for site in reader.sites()? {
            let site = site?;
            self.fit(Some(&site.example))?;
            n_sites += 1;
        }

        self.finalize();

        debug!(
            "Fitted vocabularies on {} sites: {} lemmas, {} tokens, {} tags, {} characters, {} outputs",
            n_sites,
            self.lemma.size(),
            self.token.size(),
            self.pos.size(),
            self.chars.size(),
            self.output.size()
        );

        Ok(n_sites)
    }

    /// Encode examples and their targets.
    ///
    /// In `Register` mode, unseen categories are added to the
    /// vocabularies. Every example must have a disambiguation code.
    pub fn transform(
        &mut self,
        examples: &[Example],
        mode: EncodeMode,
    ) -> Fallible<(Transformed, Vec<usize>)> {
        match mode {
            EncodeMode::Register => encode_with_targets(&mut Registering(self), examples),
            EncodeMode::Lookup => self.transform_frozen(examples),
        }
    }

    /// Encode examples and their targets without changing the vocabularies.
    pub fn transform_frozen(&self, examples: &[Example]) -> Fallible<(Transformed, Vec<usize>)> {
        encode_with_targets(&mut Frozen(self), examples)
    }

    /// Encode examples without targets, for inference.
    pub fn transform_inputs(&self, examples: &[Example]) -> Transformed {
        encode_inputs(&mut Frozen(self), examples)
    }
}

impl<S> MultiEncoder<S>
where
    S: Default,
{
    /// Reconstruct a finalized encoder from its JSON serialization.
    pub fn loads(data: &str) -> Fallible<Self> {
        let mut encoder: MultiEncoder<S> = serde_json::from_str(data)?;
        encoder.finalize();
        Ok(encoder)
    }
}

impl<S> MultiEncoder<S> {
    /// Serialize the vocabularies as JSON.
    pub fn dumps(&self) -> Fallible<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Vocabulary access with a fixed growth policy.
trait Vocabularies {
    fn lemma(&mut self, lemma: &str) -> usize;

    fn token(&mut self, token: &str) -> usize;

    fn pos(&mut self, pos: &str) -> usize;

    fn chars(&mut self, token: &str) -> Vec<usize>;

    fn output(&mut self, lemma: &str, code: &str) -> usize;
}

struct Registering<'a, S>(&'a mut MultiEncoder<S>);

impl<'a, S> Vocabularies for Registering<'a, S>
where
    S: TargetStrategy,
{
    fn lemma(&mut self, lemma: &str) -> usize {
        self.0.lemma.encode(lemma.to_owned())
    }

    fn token(&mut self, token: &str) -> usize {
        self.0.token.encode(token.to_owned())
    }

    fn pos(&mut self, pos: &str) -> usize {
        self.0.pos.encode(pos.to_owned())
    }

    fn chars(&mut self, token: &str) -> Vec<usize> {
        self.0.chars.encode(token)
    }

    fn output(&mut self, lemma: &str, code: &str) -> usize {
        let category = self.0.strategy.category_key(lemma, code);
        self.0.output.encode(category)
    }
}

struct Frozen<'a, S>(&'a MultiEncoder<S>);

impl<'a, S> Vocabularies for Frozen<'a, S>
where
    S: TargetStrategy,
{
    fn lemma(&mut self, lemma: &str) -> usize {
        self.0.lemma.lookup_or_unk(lemma)
    }

    fn token(&mut self, token: &str) -> usize {
        self.0.token.lookup_or_unk(token)
    }

    fn pos(&mut self, pos: &str) -> usize {
        self.0.pos.lookup_or_unk(pos)
    }

    fn chars(&mut self, token: &str) -> Vec<usize> {
        self.0.chars.lookup_or_unk(token)
    }

    fn output(&mut self, lemma: &str, code: &str) -> usize {
        let category = self.0.strategy.category_key(lemma, code);
        self.0.output.lookup_or_unk(&category)
    }
}

fn encode_inputs<V>(vocab: &mut V, examples: &[Example]) -> Transformed
where
    V: Vocabularies,
{
    let mut transformed = Transformed::default();

    for example in examples {
        let context = example.context();
        transformed.tokens.push(vocab.token(example.token()));
        transformed
            .lemmas
            .push(context.lemmas().iter().map(|l| vocab.lemma(l)).collect());
        transformed
            .pos
            .push(context.pos().iter().map(|p| vocab.pos(p)).collect());
        transformed.chars.push(vocab.chars(example.token()));
        transformed.positions.push(example.position());
    }

    transformed
}

fn encode_with_targets<V>(
    vocab: &mut V,
    examples: &[Example],
) -> Fallible<(Transformed, Vec<usize>)>
where
    V: Vocabularies,
{
    let mut targets = Vec::with_capacity(examples.len());
    for example in examples {
        let (lemma, code) = example.target().ok_or_else(|| LookupError::MissingTarget {
            token: example.token().to_owned(),
        })?;
        targets.push(vocab.output(lemma, code));
    }

    Ok((encode_inputs(vocab, examples), targets))
}
