use failure::Fallible;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;

use crate::encoder::{EncodeMode, MultiEncoder, TargetStrategy};
use crate::io::{DisambiguationReader, Example, ReadSentences, SiteRecord, Sites};
use crate::tensor::{LabelTensor, TensorBuilder};

/// Batching options.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BatchOptions {
    /// Maximum number of examples per batch.
    pub batch_size: usize,

    /// Vocabulary growth policy while encoding.
    pub mode: EncodeMode,

    /// Shuffle the batch order using the given seed.
    ///
    /// Batches are shuffled as a whole, examples keep their order
    /// within a batch.
    pub shuffle: Option<u64>,
}

impl BatchOptions {
    pub fn new(batch_size: usize, mode: EncodeMode) -> Self {
        assert!(batch_size > 0, "Batch size should at least be 1.");

        BatchOptions {
            batch_size,
            mode,
            shuffle: None,
        }
    }

    /// Shuffle the batch order.
    pub fn shuffle(mut self, seed: u64) -> Self {
        self.shuffle = Some(seed);
        self
    }
}

/// A set of training/validation data.
///
/// A data set provides an iterator over the batches in that
/// dataset.
pub trait DataSet<'a, S> {
    type Iter: Iterator<Item = Fallible<TensorBuilder<LabelTensor>>>;

    /// Get an iterator over the dataset batches.
    ///
    /// The examples and their targets are encoded with `encoder`.
    fn batches(self, encoder: &'a mut MultiEncoder<S>, options: BatchOptions)
        -> Fallible<Self::Iter>;
}

impl<'a, 'ds, R, S> DataSet<'a, S> for &'ds DisambiguationReader<R>
where
    R: ReadSentences,
    S: 'a + TargetStrategy,
{
    type Iter = DisambiguationBatches<'a, S, R::Iter>;

    fn batches(
        self,
        encoder: &'a mut MultiEncoder<S>,
        options: BatchOptions,
    ) -> Fallible<Self::Iter> {
        let sites = self.sites()?;

        let groups = match options.shuffle {
            Some(seed) => {
                let mut groups = ExampleGroups {
                    sites,
                    batch_size: options.batch_size,
                }
                .collect::<Fallible<Vec<_>>>()?;

                let mut rng = XorShiftRng::seed_from_u64(seed);
                groups.shuffle(&mut rng);

                Groups::Shuffled(groups.into_iter())
            }
            None => Groups::Streamed(ExampleGroups {
                sites,
                batch_size: options.batch_size,
            }),
        };

        Ok(DisambiguationBatches {
            encoder,
            groups,
            mode: options.mode,
        })
    }
}

struct ExampleGroups<I> {
    sites: Sites<I>,
    batch_size: usize,
}

impl<I> Iterator for ExampleGroups<I>
where
    Sites<I>: Iterator<Item = Fallible<SiteRecord>>,
{
    type Item = Fallible<Vec<Example>>;

    fn next(&mut self) -> Option<Self::Item> {
        let examples = match self
            .sites
            .by_ref()
            .take(self.batch_size)
            .map(|site| site.map(|site| site.example))
            .collect::<Fallible<Vec<_>>>()
        {
            Ok(examples) => examples,
            Err(err) => return Some(Err(err)),
        };

        // Check whether the reader is exhausted.
        if examples.is_empty() {
            return None;
        }

        Some(Ok(examples))
    }
}

enum Groups<I> {
    Streamed(ExampleGroups<I>),
    Shuffled(std::vec::IntoIter<Vec<Example>>),
}

/// Iterator over the batches of a disambiguation corpus.
pub struct DisambiguationBatches<'a, S, I> {
    encoder: &'a mut MultiEncoder<S>,
    groups: Groups<I>,
    mode: EncodeMode,
}

impl<'a, S, I> Iterator for DisambiguationBatches<'a, S, I>
where
    S: TargetStrategy,
    Sites<I>: Iterator<Item = Fallible<SiteRecord>>,
{
    type Item = Fallible<TensorBuilder<LabelTensor>>;

    fn next(&mut self) -> Option<Self::Item> {
        let examples = match self.groups {
            Groups::Streamed(ref mut groups) => groups.next()?,
            Groups::Shuffled(ref mut groups) => Ok(groups.next()?),
        };

        Some(examples.and_then(|examples| {
            let (transformed, targets) = self.encoder.transform(&examples, self.mode)?;
            Ok(TensorBuilder::from_examples(
                &transformed,
                &targets,
                self.encoder.lemma().padding_id(),
            ))
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use failure::Fallible;

    use super::{BatchOptions, DataSet};
    use crate::encoder::{EncodeMode, MultiEncoder};
    use crate::io::{Columns, DisambiguationReader, RawSentence, ReadSentences, TsvCorpus};

    /// Sentence source with sentences of increasing length, each
    /// with a single site.
    struct Sentences(usize);

    impl ReadSentences for Sentences {
        type Iter = std::vec::IntoIter<Fallible<(String, RawSentence)>>;

        fn sentences(&self) -> Fallible<Self::Iter> {
            let header = Rc::new(vec![
                "token".to_owned(),
                "lemma".to_owned(),
                "pos".to_owned(),
                "Dis".to_owned(),
            ]);

            let sentences = (1..=self.0)
                .map(|len| {
                    let tokens = (0..len).map(|i| format!("t{}", i)).collect::<Vec<_>>();
                    let lemmas = (0..len).map(|i| format!("l{}", i)).collect();
                    let pos = vec!["NOMcom".to_owned(); len];
                    let mut dis = vec!["_".to_owned(); len];
                    dis[len - 1] = (len % 2 + 1).to_string();

                    Ok((
                        "stub".to_owned(),
                        RawSentence::new(header.clone(), vec![tokens, lemmas, pos, dis]),
                    ))
                })
                .collect::<Vec<_>>();

            Ok(sentences.into_iter())
        }
    }

    fn reader(n: usize) -> DisambiguationReader<Sentences> {
        DisambiguationReader::new(Sentences(n), Columns::default())
    }

    #[test]
    fn single_batch() {
        let reader =
            DisambiguationReader::new(TsvCorpus::new(vec!["testdata/test.tsv"]), Columns::default());
        let mut encoder: MultiEncoder = MultiEncoder::default();
        encoder.fit_reader(&reader).unwrap();

        let batches = (&reader)
            .batches(&mut encoder, BatchOptions::new(16, EncodeMode::Lookup))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(batches.len(), 1);

        let (inputs, labels) = batches.into_iter().next().unwrap().into_parts();
        let outputs = labels
            .0
            .iter()
            .map(|&id| encoder.output().decode(id as usize).unwrap().clone())
            .collect::<Vec<_>>();
        assert_eq!(
            outputs
                .iter()
                .map(|c| c.as_variant().unwrap())
                .collect::<Vec<_>>(),
            vec![("estre", "1"), ("en", "1")]
        );

        for row in inputs.lemmas.outer_iter() {
            let lemmas = row
                .iter()
                .map(|&id| encoder.lemma().decode(id as usize).unwrap().as_str())
                .collect::<Vec<_>>();
            assert_eq!(
                lemmas,
                vec!["certes", "dire", "Oliver", "je", "estre", "en", "grant", "pensé"]
            );
        }
    }

    #[test]
    fn batch_count_and_order() {
        let reader = reader(7);
        let mut encoder: MultiEncoder = MultiEncoder::default();

        let batches = (&reader)
            .batches(&mut encoder, BatchOptions::new(3, EncodeMode::Register))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(
            batches.iter().map(|b| b.inputs().len()).collect::<Vec<_>>(),
            vec![3, 3, 1]
        );

        let seq_lens = batches
            .iter()
            .flat_map(|b| b.inputs().seq_lens.to_vec())
            .collect::<Vec<_>>();
        assert_eq!(seq_lens, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn padding_is_batch_local() {
        let reader = reader(7);
        let mut encoder: MultiEncoder = MultiEncoder::default();

        let batches = (&reader)
            .batches(&mut encoder, BatchOptions::new(3, EncodeMode::Register))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for batch in &batches {
            let inputs = batch.inputs();
            let max_len = inputs.seq_lens.iter().cloned().max().unwrap() as usize;
            assert_eq!(inputs.lemmas.shape()[1], max_len);
            assert_eq!(inputs.pos.shape()[1], max_len);

            for (row, &len) in inputs.lemmas.outer_iter().zip(inputs.seq_lens.iter()) {
                assert!(row.iter().take(len as usize).all(|&id| id > 1));
                assert!(row.iter().skip(len as usize).all(|&id| id == 0));
            }

            let max_chars = inputs.char_lens.iter().cloned().max().unwrap() as usize;
            assert_eq!(inputs.chars.shape()[1], max_chars);
            for (row, &len) in inputs.chars.outer_iter().zip(inputs.char_lens.iter()) {
                assert!(row.iter().skip(len as usize).all(|&id| id == 0));
            }
        }
    }

    #[test]
    fn shuffles_whole_batches() {
        let reader = reader(10);

        let batch_lens = |seed| {
            let mut encoder: MultiEncoder = MultiEncoder::default();
            (&reader)
                .batches(
                    &mut encoder,
                    BatchOptions::new(2, EncodeMode::Register).shuffle(seed),
                )
                .unwrap()
                .map(|b| b.unwrap().inputs().seq_lens.to_vec())
                .collect::<Vec<_>>()
        };

        let shuffled = batch_lens(42);
        assert_eq!(shuffled, batch_lens(42));

        let mut sorted = shuffled.clone();
        sorted.sort();
        assert_eq!(
            sorted,
            vec![vec![1, 2], vec![3, 4], vec![5, 6], vec![7, 8], vec![9, 10]]
        );
    }

    #[test]
    fn empty_corpus() {
        let reader = reader(0);
        let mut encoder: MultiEncoder = MultiEncoder::default();
        let mut batches = (&reader)
            .batches(&mut encoder, BatchOptions::new(3, EncodeMode::Register))
            .unwrap();
        assert!(batches.next().is_none());
    }
}
