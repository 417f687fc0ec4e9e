use std::cmp::max;

use ndarray::{s, Array1, Array2};

use crate::encoder::Transformed;

mod labels {
    pub trait Labels {
        fn from_shape(batch_size: usize) -> Self;
    }
}

/// No labels.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NoLabels;

impl labels::Labels for NoLabels {
    fn from_shape(_batch_size: usize) -> Self {
        NoLabels
    }
}

/// Output identifiers stored in an `Array1<i32>`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LabelTensor(pub Array1<i32>);

impl labels::Labels for LabelTensor {
    fn from_shape(batch_size: usize) -> Self {
        LabelTensor(Array1::zeros(batch_size))
    }
}

/// Padded inputs of a batch.
///
/// Sequence arrays have the shape `[batch_size, max_len]`, where
/// `max_len` is the maximum length of the sequence within the batch.
/// Positions beyond the length of a sequence hold the padding
/// identifier.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BatchInputs {
    /// Identifiers of the tokens to disambiguate.
    pub tokens: Array1<i32>,

    /// Positions of the tokens to disambiguate.
    pub positions: Array1<i32>,

    /// Lengths of the sentence contexts.
    pub seq_lens: Array1<i32>,

    /// Lemma identifiers of the sentence contexts.
    pub lemmas: Array2<i32>,

    /// Part-of-speech identifiers of the sentence contexts.
    pub pos: Array2<i32>,

    /// Lengths of the tokens to disambiguate in characters.
    pub char_lens: Array1<i32>,

    /// Character identifiers of the tokens to disambiguate.
    pub chars: Array2<i32>,
}

impl BatchInputs {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of examples in the batch.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Lemma identifier of the token to disambiguate in example `idx`.
    pub fn target_lemma(&self, idx: usize) -> i32 {
        self.lemmas[[idx, self.positions[idx] as usize]]
    }
}

/// Build batch arrays from encoded examples.
pub struct TensorBuilder<L> {
    sequence: usize,
    inputs: BatchInputs,
    labels: L,
}

impl<L> TensorBuilder<L>
where
    L: labels::Labels,
{
    /// Create a new `TensorBuilder`.
    ///
    /// Creates a new builder with the given batch size, number of time
    /// steps, and maximum token length. All sequences are initialized
    /// with the `padding` identifier.
    pub fn new(batch_size: usize, time_steps: usize, token_len: usize, padding: usize) -> Self {
        let padding = padding as i32;

        TensorBuilder {
            sequence: 0,
            inputs: BatchInputs {
                tokens: Array1::from_elem(batch_size, padding),
                positions: Array1::zeros(batch_size),
                seq_lens: Array1::zeros(batch_size),
                lemmas: Array2::from_elem((batch_size, time_steps), padding),
                pos: Array2::from_elem((batch_size, time_steps), padding),
                char_lens: Array1::zeros(batch_size),
                chars: Array2::from_elem((batch_size, token_len), padding),
            },
            labels: L::from_shape(batch_size),
        }
    }

    /// Create a builder that fits the given examples.
    pub fn for_transformed(transformed: &Transformed, padding: usize) -> Self {
        let time_steps = transformed
            .lemmas
            .iter()
            .zip(&transformed.pos)
            .map(|(lemmas, pos)| max(lemmas.len(), pos.len()))
            .max()
            .unwrap_or(0);
        let token_len = transformed.chars.iter().map(Vec::len).max().unwrap_or(0);

        Self::new(transformed.len(), time_steps, token_len, padding)
    }
}

impl<L> TensorBuilder<L> {
    fn add_input(&mut self, transformed: &Transformed, idx: usize) {
        assert!(self.sequence < self.inputs.len(), "Batch is full");

        let seq = self.sequence;
        let lemmas = &transformed.lemmas[idx];
        let pos = &transformed.pos[idx];
        let chars = &transformed.chars[idx];

        self.inputs.tokens[seq] = transformed.tokens[idx] as i32;
        self.inputs.positions[seq] = transformed.positions[idx] as i32;
        self.inputs.seq_lens[seq] = lemmas.len() as i32;
        self.inputs.char_lens[seq] = chars.len() as i32;

        copy_ids(&mut self.inputs.lemmas, seq, lemmas);
        copy_ids(&mut self.inputs.pos, seq, pos);
        copy_ids(&mut self.inputs.chars, seq, chars);
    }

    /// Get the constructed arrays.
    pub fn into_parts(self) -> (BatchInputs, L) {
        (self.inputs, self.labels)
    }

    /// Get the batch inputs.
    pub fn inputs(&self) -> &BatchInputs {
        &self.inputs
    }

    /// Get the labels.
    pub fn labels(&self) -> &L {
        &self.labels
    }
}

impl TensorBuilder<LabelTensor> {
    /// Add an example with its output identifier.
    pub fn add_with_labels(&mut self, transformed: &Transformed, idx: usize, label: usize) {
        self.add_input(transformed, idx);
        self.labels.0[self.sequence] = label as i32;
        self.sequence += 1;
    }

    /// Build a batch from examples and their output identifiers.
    pub fn from_examples(transformed: &Transformed, targets: &[usize], padding: usize) -> Self {
        assert_eq!(
            transformed.len(),
            targets.len(),
            "Example and target count mismatch"
        );

        let mut builder = Self::for_transformed(transformed, padding);
        for (idx, &target) in targets.iter().enumerate() {
            builder.add_with_labels(transformed, idx, target);
        }

        builder
    }
}

impl TensorBuilder<NoLabels> {
    /// Add an example without labels.
    pub fn add_without_labels(&mut self, transformed: &Transformed, idx: usize) {
        self.add_input(transformed, idx);
        self.sequence += 1;
    }

    /// Build a batch from examples.
    pub fn from_inputs(transformed: &Transformed, padding: usize) -> Self {
        let mut builder = Self::for_transformed(transformed, padding);
        for idx in 0..transformed.len() {
            builder.add_without_labels(transformed, idx);
        }

        builder
    }
}

fn copy_ids(array: &mut Array2<i32>, row: usize, ids: &[usize]) {
    let mut row = array.slice_mut(s![row, ..ids.len()]);
    for (dst, &id) in row.iter_mut().zip(ids) {
        *dst = id as i32;
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, arr2};

    use super::{LabelTensor, NoLabels, TensorBuilder};
    use crate::encoder::Transformed;

    fn transformed() -> Transformed {
        Transformed {
            tokens: vec![7, 8],
            lemmas: vec![vec![2, 3, 4], vec![5, 6]],
            pos: vec![vec![2, 2, 3], vec![4, 3]],
            chars: vec![vec![2], vec![3, 4, 5, 6]],
            positions: vec![2, 0],
        }
    }

    #[test]
    fn pads_to_batch_maximum() {
        let builder = TensorBuilder::<LabelTensor>::from_examples(&transformed(), &[2, 3], 0);
        let (inputs, labels) = builder.into_parts();

        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs.tokens, arr1(&[7, 8]));
        assert_eq!(inputs.seq_lens, arr1(&[3, 2]));
        assert_eq!(inputs.lemmas, arr2(&[[2, 3, 4], [5, 6, 0]]));
        assert_eq!(inputs.pos, arr2(&[[2, 2, 3], [4, 3, 0]]));
        assert_eq!(inputs.char_lens, arr1(&[1, 4]));
        assert_eq!(inputs.chars, arr2(&[[2, 0, 0, 0], [3, 4, 5, 6]]));
        assert_eq!(labels.0, arr1(&[2, 3]));
    }

    #[test]
    fn target_lemmas() {
        let (inputs, _) = TensorBuilder::<NoLabels>::from_inputs(&transformed(), 0).into_parts();
        assert_eq!(inputs.target_lemma(0), 4);
        assert_eq!(inputs.target_lemma(1), 5);
    }

    #[test]
    #[should_panic]
    fn rejects_extra_examples() {
        let transformed = transformed();
        let mut builder = TensorBuilder::<NoLabels>::new(1, 3, 4, 0);
        builder.add_without_labels(&transformed, 0);
        builder.add_without_labels(&transformed, 1);
    }
}
