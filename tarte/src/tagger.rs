use std::rc::Rc;
use std::slice;

use failure::Fallible;
use itertools::Itertools;

use crate::archive::ModelArchive;
use crate::encoder::{MultiEncoder, SupervisedTargets, TargetStrategy};
use crate::io::{is_disambiguation_site, Columns, Context, Example, RawSentence};
use crate::model::Classifier;
use crate::tensor::{NoLabels, TensorBuilder};

/// Trait for lemma disambiguators.
pub trait Tag {
    /// Replace the lemmas of the sentences by disambiguated lemmas.
    fn tag_sentences(&self, sentences: &mut [RawSentence]) -> Fallible<()>;
}

/// Formatter of a disambiguated lemma.
pub type Formatter = Box<dyn Fn(&str, &str) -> String>;

/// Append the disambiguation code to the lemma.
pub fn concat_code(lemma: &str, code: &str) -> String {
    format!("{}{}", lemma, code)
}

/// Predicted variant of an ambiguous lemma.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    /// Output identifier of the variant.
    pub output: usize,

    pub lemma: String,

    pub code: String,

    /// Probability of the variant.
    pub confidence: f32,
}

/// Site accuracy.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Accuracy {
    pub correct: usize,
    pub total: usize,
}

impl Accuracy {
    pub fn accuracy(&self) -> f32 {
        if self.total == 0 {
            return 0.;
        }

        self.correct as f32 / self.total as f32
    }

    pub fn merge(&mut self, other: Accuracy) {
        self.correct += other.correct;
        self.total += other.total;
    }
}

/// Lemma disambiguator.
///
/// Lemmas with a single registered variant are passed through. For
/// every occurrence of an ambiguous lemma, the classifier chooses one
/// of its variants, which is then formatted into the output lemma.
pub struct Tagger<C, S = SupervisedTargets> {
    encoder: MultiEncoder<S>,
    classifier: C,
    columns: Columns,
    formatter: Formatter,
}

impl<C, S> Tagger<C, S>
where
    C: Classifier,
    S: TargetStrategy,
{
    pub fn new(encoder: MultiEncoder<S>, classifier: C) -> Self {
        Tagger {
            encoder,
            classifier,
            columns: Columns::default(),
            formatter: Box::new(concat_code),
        }
    }

    /// Construct a tagger from a model archive.
    ///
    /// The column names are taken from the archived settings, if any.
    pub fn from_archive(archive: ModelArchive<C, S>) -> Self {
        let columns = archive
            .settings
            .as_ref()
            .map(|settings| settings.reader.columns())
            .unwrap_or_default();

        Tagger::new(archive.encoder, archive.classifier).with_columns(columns)
    }

    /// Use the given column names when tagging raw sentences.
    pub fn with_columns(mut self, columns: Columns) -> Self {
        self.columns = columns;
        self
    }

    /// Format disambiguated lemmas with `formatter`.
    ///
    /// The formatter is called with the lemma and the disambiguation
    /// code of the predicted variant.
    pub fn with_formatter<F>(mut self, formatter: F) -> Self
    where
        F: 'static + Fn(&str, &str) -> String,
    {
        self.formatter = Box::new(formatter);
        self
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    pub fn encoder(&self) -> &MultiEncoder<S> {
        &self.encoder
    }

    /// Check whether a lemma has more than one registered variant.
    pub fn is_ambiguous(&self, lemma: &str) -> bool {
        self.encoder.variants(lemma).len() > 1
    }

    /// Predict the variants of the ambiguous lemmas of a sentence.
    ///
    /// Returns a prediction for every token with an ambiguous lemma and
    /// `None` for other tokens. Every ambiguous token is classified in a
    /// batch of its own. The classifier is not invoked for sentences
    /// without ambiguous lemmas.
    pub fn disambiguate(&self, context: &Rc<Context>) -> Fallible<Vec<Option<Prediction>>> {
        let mut predictions = vec![None; context.len()];

        let variants = self.encoder.variant_table();
        let sites = context
            .lemmas()
            .iter()
            .positions(|lemma| {
                variants
                    .get(lemma.as_str())
                    .map(|ids| ids.len() > 1)
                    .unwrap_or(false)
            })
            .collect::<Vec<_>>();

        for position in sites {
            let example = Example::new(context.clone(), position);
            let candidates = &variants[example.lemma()];

            let transformed = self.encoder.transform_inputs(slice::from_ref(&example));
            let (inputs, _) = TensorBuilder::<NoLabels>::from_inputs(
                &transformed,
                self.encoder.lemma().padding_id(),
            )
            .into_parts();

            let logits = self.classifier.logits(&inputs)?;
            let (output, confidence) = match self.encoder.strategy().score(candidates, logits.row(0))
            {
                Some(best) => best,
                None => continue,
            };

            if let Some((lemma, code)) = self.encoder.output().decode(output)?.as_variant() {
                predictions[position] = Some(Prediction {
                    output,
                    lemma: lemma.to_owned(),
                    code: code.to_owned(),
                    confidence,
                });
            }
        }

        Ok(predictions)
    }

    /// Disambiguate the lemmas of a sentence.
    ///
    /// Returns one lemma per token.
    pub fn lemmatize(&self, context: &Rc<Context>) -> Fallible<Vec<String>> {
        let predictions = self.disambiguate(context)?;

        Ok(context
            .lemmas()
            .iter()
            .zip(predictions)
            .map(|(lemma, prediction)| match prediction {
                Some(prediction) => (self.formatter)(&prediction.lemma, &prediction.code),
                None => lemma.clone(),
            })
            .collect())
    }

    /// Disambiguate the lemmas of a sequence of sentences.
    ///
    /// Sentences are processed lazily, when the iterator is advanced.
    pub fn tag<'a, I>(&'a self, sentences: I) -> impl Iterator<Item = Fallible<Vec<String>>> + 'a
    where
        I: IntoIterator<Item = Rc<Context>>,
        I::IntoIter: 'a,
    {
        sentences
            .into_iter()
            .map(move |context| self.lemmatize(&context))
    }

    /// Compare predicted disambiguation codes against gold codes.
    ///
    /// Only tokens whose gold value is a disambiguation code are
    /// counted. For lemmas with a single variant, that variant is the
    /// prediction.
    pub fn evaluate(&self, context: &Rc<Context>, gold: &[String]) -> Fallible<Accuracy> {
        let predictions = self.disambiguate(context)?;

        let mut accuracy = Accuracy::default();
        for ((lemma, prediction), gold) in context.lemmas().iter().zip(predictions).zip(gold) {
            if !is_disambiguation_site(gold) {
                continue;
            }

            let predicted = match prediction {
                Some(prediction) => Some(prediction.code),
                None => self.single_variant_code(lemma)?,
            };

            accuracy.total += 1;
            if predicted.as_ref() == Some(gold) {
                accuracy.correct += 1;
            }
        }

        Ok(accuracy)
    }

    fn single_variant_code(&self, lemma: &str) -> Fallible<Option<String>> {
        let ids = self.encoder.variants(lemma);
        if ids.len() != 1 {
            return Ok(None);
        }

        Ok(self
            .encoder
            .output()
            .decode(ids[0])?
            .as_variant()
            .map(|(_, code)| code.to_owned()))
    }
}

impl<C, S> Tag for Tagger<C, S>
where
    C: Classifier,
    S: TargetStrategy,
{
    fn tag_sentences(&self, sentences: &mut [RawSentence]) -> Fallible<()> {
        for sentence in sentences {
            let context = Rc::new(Context::from_sentence("<input>", sentence, &self.columns)?);
            let lemmas = self.lemmatize(&context)?;

            // The column is present, the context was built from it.
            if let Some(column) = sentence.column_mut(&self.columns.lemma) {
                for (value, lemma) in column.iter_mut().zip(lemmas) {
                    *value = lemma;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use failure::Fallible;
    use ndarray::Array2;

    use super::{Accuracy, Tag, Tagger};
    use crate::encoder::MultiEncoder;
    use crate::io::{Columns, Context, DisambiguationReader, Example, ReadSentences, TsvCorpus};
    use crate::model::{Classifier, ModelPerformance};
    use crate::tensor::{BatchInputs, LabelTensor};

    /// Classifier that prefers a fixed output and records the batches
    /// it is invoked with.
    struct FixedClassifier {
        n_outputs: usize,
        preferred: usize,
        calls: Cell<usize>,
        batch_shapes: RefCell<Vec<(usize, usize)>>,
    }

    impl FixedClassifier {
        fn new(n_outputs: usize, preferred: usize) -> Self {
            FixedClassifier {
                n_outputs,
                preferred,
                calls: Cell::new(0),
                batch_shapes: RefCell::new(Vec::new()),
            }
        }
    }

    impl Classifier for FixedClassifier {
        type Parameters = usize;

        type Weights = usize;

        fn from_parts(parameters: usize, weights: usize) -> Fallible<Self> {
            Ok(FixedClassifier::new(parameters, weights))
        }

        fn parameters(&self) -> usize {
            self.n_outputs
        }

        fn weights(&self) -> &usize {
            &self.preferred
        }

        fn train(&mut self, _: &BatchInputs, _: &LabelTensor) -> Fallible<ModelPerformance> {
            unimplemented!()
        }

        fn validate(&self, _: &BatchInputs, _: &LabelTensor) -> Fallible<ModelPerformance> {
            unimplemented!()
        }

        fn logits(&self, inputs: &BatchInputs) -> Fallible<Array2<f32>> {
            self.calls.set(self.calls.get() + 1);
            self.batch_shapes
                .borrow_mut()
                .push((inputs.len(), inputs.chars.shape()[1]));
            let mut logits = Array2::zeros((inputs.len(), self.n_outputs));
            logits.column_mut(self.preferred).fill(5.);
            Ok(logits)
        }
    }

    fn context(tokens: &[&str], lemmas: &[&str]) -> Rc<Context> {
        let to_owned = |values: &[&str]| values.iter().map(|&v| v.to_owned()).collect::<Vec<_>>();
        Rc::new(Context::new(
            to_owned(tokens),
            to_owned(lemmas),
            vec!["VERcjg".to_owned(); tokens.len()],
        ))
    }

    /// Encoder in which `estre` has the variants 1 and 2.
    fn ambiguous_encoder() -> MultiEncoder {
        let first = context(&["il", "est"], &["il", "estre"]);
        let second = context(&["il", "ert"], &["il", "estre"]);
        let third = context(&["en", "vait"], &["en", "aler"]);

        let mut encoder: MultiEncoder = MultiEncoder::default();
        encoder
            .fit(&[
                Example::with_code(first, 1, "1"),
                Example::with_code(second, 1, "2"),
                Example::with_code(third, 1, "1"),
            ])
            .unwrap();
        encoder.finalize();
        encoder
    }

    fn estre2(encoder: &MultiEncoder) -> usize {
        encoder.variants("estre")[1]
    }

    #[test]
    fn passes_through_unambiguous_lemmas() {
        let reader =
            DisambiguationReader::new(TsvCorpus::new(vec!["testdata/test.tsv"]), Columns::default());
        let mut encoder: MultiEncoder = MultiEncoder::default();
        encoder.fit_reader(&reader).unwrap();
        let n_outputs = encoder.output().size();

        let tagger = Tagger::new(encoder, FixedClassifier::new(n_outputs, 0));
        assert!(!tagger.is_ambiguous("estre"));

        let site = reader.sites().unwrap().next().unwrap().unwrap();
        let context = Rc::new(site.example.context().clone());
        let lemmas = tagger.lemmatize(&context).unwrap();
        assert_eq!(lemmas, context.lemmas());
        assert_eq!(tagger.classifier().calls.get(), 0);
    }

    #[test]
    fn disambiguates_ambiguous_lemmas() {
        let encoder = ambiguous_encoder();
        let preferred = estre2(&encoder);
        let tagger = Tagger::new(encoder, FixedClassifier::new(5, preferred));

        let sentence = context(&["il", "est", "alez"], &["il", "estre", "aler"]);
        let lemmas = tagger.lemmatize(&sentence).unwrap();
        assert_eq!(lemmas, vec!["il", "estre2", "aler"]);
        assert_eq!(tagger.classifier().calls.get(), 1);

        let predictions = tagger.disambiguate(&sentence).unwrap();
        let prediction = predictions[1].as_ref().unwrap();
        assert_eq!(prediction.output, preferred);
        assert_eq!(prediction.code, "2");
        assert!(prediction.confidence > 0.5);
        assert!(predictions[0].is_none() && predictions[2].is_none());
    }

    #[test]
    fn every_site_is_classified_separately() {
        let encoder = ambiguous_encoder();
        let preferred = estre2(&encoder);
        let tagger = Tagger::new(encoder, FixedClassifier::new(5, preferred));

        let sentence = context(&["il", "estoit", "est"], &["il", "estre", "estre"]);
        let lemmas = tagger.lemmatize(&sentence).unwrap();
        assert_eq!(lemmas, vec!["il", "estre2", "estre2"]);

        // Character padding only depends on the token itself.
        assert_eq!(tagger.classifier().calls.get(), 2);
        assert_eq!(*tagger.classifier().batch_shapes.borrow(), vec![(1, 6), (1, 3)]);
    }

    #[test]
    fn ambiguity_follows_encoder() {
        let encoder = ambiguous_encoder();
        let tagger = Tagger::new(encoder, FixedClassifier::new(5, 0));

        let need_categorization = tagger.encoder().need_categorization();
        for &lemma in &["estre", "aler", "il"] {
            assert_eq!(
                tagger.is_ambiguous(lemma),
                need_categorization.contains(lemma)
            );
        }
        assert!(tagger.is_ambiguous("estre"));
        assert!(!tagger.is_ambiguous("aler"));
    }

    #[test]
    fn custom_formatter() {
        let encoder = ambiguous_encoder();
        let preferred = estre2(&encoder);
        let tagger = Tagger::new(encoder, FixedClassifier::new(5, preferred))
            .with_formatter(|lemma, code| format!("{}#{}", lemma, code));

        let lemmas = tagger
            .lemmatize(&context(&["est"], &["estre"]))
            .unwrap();
        assert_eq!(lemmas, vec!["estre#2"]);
    }

    #[test]
    fn tagging_is_lazy() {
        let encoder = ambiguous_encoder();
        let preferred = estre2(&encoder);
        let tagger = Tagger::new(encoder, FixedClassifier::new(5, preferred));

        let sentences = vec![
            context(&["est"], &["estre"]),
            context(&["ert"], &["estre"]),
            context(&["il"], &["il"]),
        ];

        let mut tagged = tagger.tag(sentences.clone());
        assert_eq!(tagger.classifier().calls.get(), 0);
        assert_eq!(tagged.next().unwrap().unwrap(), vec!["estre2"]);
        assert_eq!(tagger.classifier().calls.get(), 1);

        let all = tagger
            .tag(sentences)
            .collect::<Fallible<Vec<_>>>()
            .unwrap();
        assert_eq!(all, vec![vec!["estre2"], vec!["estre2"], vec!["il"]]);
    }

    #[test]
    fn evaluation_counts_sites() {
        let encoder = ambiguous_encoder();
        let preferred = estre2(&encoder);
        let tagger = Tagger::new(encoder, FixedClassifier::new(5, preferred));

        let sentence = context(&["il", "est", "vait", "ert"], &["il", "estre", "aler", "estre"]);
        let gold = vec!["_", "1", "1", "2"]
            .into_iter()
            .map(ToOwned::to_owned)
            .collect::<Vec<_>>();

        let accuracy = tagger.evaluate(&sentence, &gold).unwrap();
        assert_eq!(
            accuracy,
            Accuracy {
                correct: 2,
                total: 3
            }
        );

        let mut total = Accuracy::default();
        total.merge(accuracy);
        total.merge(accuracy);
        assert_eq!(total.total, 6);
        assert!((total.accuracy() - 2. / 3.).abs() < 1e-6);
    }

    #[test]
    fn tags_raw_sentences() {
        let encoder = ambiguous_encoder();
        let preferred = estre2(&encoder);
        let tagger = Tagger::new(encoder, FixedClassifier::new(5, preferred));

        let mut sentences = TsvCorpus::new(vec!["testdata/test.tsv"])
            .sentences()
            .unwrap()
            .map(|sentence| sentence.map(|(_, sentence)| sentence))
            .collect::<Fallible<Vec<_>>>()
            .unwrap();
        tagger.tag_sentences(&mut sentences).unwrap();

        let lemmas = sentences[0].column("lemma").unwrap();
        assert_eq!(lemmas[4], "estre2");
        assert_eq!(lemmas[5], "en");
        assert_eq!(sentences[0].column("Dis").unwrap()[4], "1");
    }
}
