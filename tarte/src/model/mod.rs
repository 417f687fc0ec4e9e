//! Classifier capability.
//!
//! A classifier consumes packed batches and produces scores over the
//! output vocabulary.

use failure::Fallible;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::tensor::{BatchInputs, LabelTensor};

mod frequency;
pub use self::frequency::{FrequencyParameters, FrequencyWeights, MostFrequentVariant};

/// Results of validation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelPerformance {
    /// Model loss.
    pub loss: f32,

    /// Model accuracy
    ///
    /// The accuracy is the fraction of correctly predicted outputs.
    pub accuracy: f32,
}

/// Trait for disambiguation classifiers.
pub trait Classifier {
    /// Constructor arguments of the classifier.
    type Parameters: DeserializeOwned + Serialize;

    /// Learned state of the classifier.
    type Weights: DeserializeOwned + Serialize;

    /// Construct a classifier from its persisted parts.
    fn from_parts(parameters: Self::Parameters, weights: Self::Weights) -> Fallible<Self>
    where
        Self: Sized;

    fn parameters(&self) -> Self::Parameters;

    fn weights(&self) -> &Self::Weights;

    /// Perform a training step on a batch.
    ///
    /// Returns the performance on the batch before the update.
    fn train(&mut self, inputs: &BatchInputs, labels: &LabelTensor) -> Fallible<ModelPerformance>;

    /// Compute the performance on a batch without updating the classifier.
    fn validate(&self, inputs: &BatchInputs, labels: &LabelTensor) -> Fallible<ModelPerformance>;

    /// Scores of the output categories.
    ///
    /// Returns an array of shape `[batch_size, n_outputs]`.
    fn logits(&self, inputs: &BatchInputs) -> Fallible<Array2<f32>>;

    /// Predict the most probable output of every example.
    ///
    /// Returns the output identifier with its probability.
    fn predict(&self, inputs: &BatchInputs) -> Fallible<Vec<(usize, f32)>> {
        let logits = self.logits(inputs)?;
        Ok(logits
            .axis_iter(Axis(0))
            .map(|row| {
                let probs = softmax(row);
                argmax(probs.view()).unwrap_or((0, 0.))
            })
            .collect())
    }
}

/// Compute the softmax of a score vector.
pub fn softmax(logits: ArrayView1<f32>) -> Array1<f32> {
    let max = logits.fold(std::f32::NEG_INFINITY, |max, &v| max.max(v));
    let mut probs = logits.mapv(|v| (v - max).exp());
    let sum = probs.sum();
    if sum > 0. {
        probs /= sum;
    }

    probs
}

/// Get the index and value of the maximum.
pub fn argmax(values: ArrayView1<f32>) -> Option<(usize, f32)> {
    values.iter().cloned().enumerate().fold(None, |best, (idx, v)| match best {
        Some((_, best_v)) if best_v >= v => best,
        _ => Some((idx, v)),
    })
}

/// Compute the loss and accuracy of logits given gold outputs.
///
/// The loss is the mean negative log-likelihood of the gold outputs.
pub fn performance(logits: &Array2<f32>, labels: &LabelTensor) -> ModelPerformance {
    let n = labels.0.len();
    if n == 0 {
        return ModelPerformance {
            loss: 0.,
            accuracy: 0.,
        };
    }

    let mut loss = 0f32;
    let mut correct = 0usize;
    for (row, &gold) in logits.axis_iter(Axis(0)).zip(labels.0.iter()) {
        let probs = softmax(row);
        let gold = gold as usize;

        loss -= probs
            .get(gold)
            .cloned()
            .unwrap_or(0.)
            .max(std::f32::MIN_POSITIVE)
            .ln();
        if argmax(probs.view()).map(|(idx, _)| idx) == Some(gold) {
            correct += 1;
        }
    }

    ModelPerformance {
        loss: loss / n as f32,
        accuracy: correct as f32 / n as f32,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2, array};

    use super::{argmax, performance, softmax};
    use crate::tensor::LabelTensor;

    #[test]
    fn softmax_sums_to_one() {
        let probs = softmax(array![1f32, 2., 3.].view());
        assert_abs_diff_eq!(probs.sum(), 1., epsilon = 1e-6);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);

        let large = softmax(array![1000f32, 1000.].view());
        for &prob in large.iter() {
            assert_abs_diff_eq!(prob, 0.5, epsilon = 1e-6);
        }
    }

    #[test]
    fn argmax_prefers_first() {
        assert_eq!(argmax(array![1f32, 3., 3.].view()), Some((1, 3.)));
        assert_eq!(argmax(array![].view()), None);
    }

    #[test]
    fn loss_and_accuracy() {
        let logits = arr2(&[[0f32, 0., 0., 0.], [0., 0., 2f32.ln(), 0.]]);
        let labels = LabelTensor(arr1(&[2, 2]));
        let perf = performance(&logits, &labels);

        let nll = -(0.25f32.ln() + 0.4f32.ln()) / 2.;
        assert_abs_diff_eq!(perf.loss, nll, epsilon = 1e-5);
        assert_abs_diff_eq!(perf.accuracy, 0.5);
    }
}
