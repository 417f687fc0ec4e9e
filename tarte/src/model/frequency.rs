use std::collections::HashMap;

use failure::{format_err, Fallible};
use ndarray::Array2;
use serde_derive::{Deserialize, Serialize};

use super::{performance, Classifier, ModelPerformance};
use crate::tensor::{BatchInputs, LabelTensor};

/// Constructor arguments of `MostFrequentVariant`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FrequencyParameters {
    /// Size of the output vocabulary.
    pub n_outputs: usize,

    /// Additive smoothing of output counts.
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
}

fn default_smoothing() -> f32 {
    0.1
}

impl FrequencyParameters {
    pub fn new(n_outputs: usize) -> Self {
        FrequencyParameters {
            n_outputs,
            smoothing: default_smoothing(),
        }
    }
}

/// Output counts of a conditioning context.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
struct OutputCounts {
    counts: HashMap<usize, u32>,
    total: u32,
}

impl OutputCounts {
    fn add(&mut self, output: usize) {
        *self.counts.entry(output).or_insert(0) += 1;
        self.total += 1;
    }
}

/// Output counts per context.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct FrequencyWeights {
    /// Counts per target lemma and target token.
    forms: HashMap<(usize, usize), OutputCounts>,

    /// Counts per target lemma.
    lemmas: HashMap<usize, OutputCounts>,

    /// Counts of all outputs.
    global: OutputCounts,
}

/// Baseline classifier that predicts the most frequent variant.
///
/// Output distributions are estimated per target lemma and surface
/// form. When the lemma and form were not seen together, the
/// distribution of the lemma is used, and otherwise the global
/// distribution.
#[derive(Clone, Debug, PartialEq)]
pub struct MostFrequentVariant {
    parameters: FrequencyParameters,
    weights: FrequencyWeights,
}

impl MostFrequentVariant {
    pub fn new(parameters: FrequencyParameters) -> Self {
        MostFrequentVariant {
            parameters,
            weights: FrequencyWeights::default(),
        }
    }

    fn counts(&self, inputs: &BatchInputs, idx: usize) -> &OutputCounts {
        let lemma = inputs.target_lemma(idx) as usize;
        let token = inputs.tokens[idx] as usize;

        match self.weights.forms.get(&(lemma, token)) {
            Some(counts) if counts.total > 0 => counts,
            _ => match self.weights.lemmas.get(&lemma) {
                Some(counts) if counts.total > 0 => counts,
                _ => &self.weights.global,
            },
        }
    }
}

impl Classifier for MostFrequentVariant {
    type Parameters = FrequencyParameters;

    type Weights = FrequencyWeights;

    fn from_parts(parameters: Self::Parameters, weights: Self::Weights) -> Fallible<Self> {
        if let Some(&output) = weights.global.counts.keys().max() {
            if output >= parameters.n_outputs {
                return Err(format_err!(
                    "Weights contain output {}, but the model has only {} outputs",
                    output,
                    parameters.n_outputs
                ));
            }
        }

        Ok(MostFrequentVariant {
            parameters,
            weights,
        })
    }

    fn parameters(&self) -> Self::Parameters {
        self.parameters.clone()
    }

    fn weights(&self) -> &Self::Weights {
        &self.weights
    }

    fn train(&mut self, inputs: &BatchInputs, labels: &LabelTensor) -> Fallible<ModelPerformance> {
        if let Some(&label) = labels
            .0
            .iter()
            .find(|&&label| label < 0 || label as usize >= self.parameters.n_outputs)
        {
            return Err(format_err!(
                "Output {} is outside of the output vocabulary of size {}",
                label,
                self.parameters.n_outputs
            ));
        }

        let perf = self.validate(inputs, labels)?;

        for (idx, &label) in labels.0.iter().enumerate() {
            let output = label as usize;
            let lemma = inputs.target_lemma(idx) as usize;
            let token = inputs.tokens[idx] as usize;

            self.weights
                .forms
                .entry((lemma, token))
                .or_default()
                .add(output);
            self.weights.lemmas.entry(lemma).or_default().add(output);
            self.weights.global.add(output);
        }

        Ok(perf)
    }

    fn validate(&self, inputs: &BatchInputs, labels: &LabelTensor) -> Fallible<ModelPerformance> {
        let logits = self.logits(inputs)?;
        Ok(performance(&logits, labels))
    }

    fn logits(&self, inputs: &BatchInputs) -> Fallible<Array2<f32>> {
        let n_outputs = self.parameters.n_outputs;
        let smoothing = self.parameters.smoothing;

        let mut logits = Array2::zeros((inputs.len(), n_outputs));
        for (idx, mut row) in logits.outer_iter_mut().enumerate() {
            let counts = self.counts(inputs, idx);
            let denominator = counts.total as f32 + smoothing * n_outputs as f32;

            for (output, logit) in row.iter_mut().enumerate() {
                let count = counts.counts.get(&output).cloned().unwrap_or(0) as f32;
                *logit = ((count + smoothing) / denominator).max(std::f32::MIN_POSITIVE).ln();
            }
        }

        Ok(logits)
    }
}
