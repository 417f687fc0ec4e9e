use ndarray::ArrayView1;
use serde_derive::{Deserialize, Serialize};

use super::CategoryEncoder;
use crate::io::Example;
use crate::model::softmax;

/// Category of the output vocabulary.
///
/// Lemma variants are keyed by the pair of the lemma and its
/// disambiguation code, so that no separator can make two distinct
/// variants collide.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputCategory {
    Padding,
    Unknown,
    Variant { lemma: String, code: String },
}

impl OutputCategory {
    /// Construct the category of a lemma variant.
    pub fn variant(lemma: impl Into<String>, code: impl Into<String>) -> Self {
        OutputCategory::Variant {
            lemma: lemma.into(),
            code: code.into(),
        }
    }

    /// Get the lemma and disambiguation code of a variant.
    pub fn as_variant(&self) -> Option<(&str, &str)> {
        match self {
            OutputCategory::Variant { lemma, code } => Some((lemma, code)),
            _ => None,
        }
    }
}

impl Default for CategoryEncoder<OutputCategory> {
    fn default() -> Self {
        CategoryEncoder::new(OutputCategory::Padding, OutputCategory::Unknown)
    }
}

/// Policy for the output vocabulary.
///
/// A target strategy decides which output categories an example
/// contributes and how the best category is chosen from classifier
/// scores. The context encoders are shared by all strategies.
pub trait TargetStrategy {
    /// Output category of a lemma variant.
    fn category_key(&self, lemma: &str, code: &str) -> OutputCategory {
        OutputCategory::variant(lemma, code)
    }

    /// Register the output categories of an example.
    fn fit(&self, output: &mut CategoryEncoder<OutputCategory>, example: &Example);

    /// Choose the best candidate.
    ///
    /// `logits` are the classifier scores for the full output
    /// vocabulary. Returns the identifier of the best candidate with its
    /// probability, or `None` if there are no scorable candidates.
    fn score(&self, candidates: &[usize], logits: ArrayView1<f32>) -> Option<(usize, f32)>;
}

/// Targets taken from the disambiguation code of each site.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SupervisedTargets;

impl TargetStrategy for SupervisedTargets {
    fn fit(&self, output: &mut CategoryEncoder<OutputCategory>, example: &Example) {
        if let Some((lemma, code)) = example.target() {
            output.encode(self.category_key(lemma, code));
        }
    }

    fn score(&self, candidates: &[usize], logits: ArrayView1<f32>) -> Option<(usize, f32)> {
        let probs = softmax(logits);

        candidates
            .iter()
            .filter_map(|&id| probs.get(id).map(|&prob| (id, prob)))
            .fold(None, |best, (id, prob)| match best {
                Some((_, best_prob)) if best_prob >= prob => best,
                _ => Some((id, prob)),
            })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    use super::{OutputCategory, SupervisedTargets, TargetStrategy};
    use crate::encoder::CategoryEncoder;
    use crate::io::{Context, Example};

    fn example() -> Example {
        let context = Context::new(
            vec!["je".into(), "sui".into()],
            vec!["je".into(), "estre".into()],
            vec!["PROper".into(), "VERcjg".into()],
        );
        Example::with_code(context.into(), 1, "1")
    }

    #[test]
    fn category_key_is_a_pair() {
        let strategy = SupervisedTargets;
        assert_eq!(
            strategy.category_key("estre", "1"),
            OutputCategory::variant("estre", "1")
        );
        assert_ne!(
            strategy.category_key("a_1", "2"),
            strategy.category_key("a", "1_2")
        );
    }

    #[test]
    fn fit_registers_site_target() {
        let mut output = CategoryEncoder::default();
        let strategy = SupervisedTargets;
        strategy.fit(&mut output, &example());
        strategy.fit(&mut output, &example());

        assert_eq!(output.size(), 3);
        assert_eq!(output.number(&OutputCategory::variant("estre", "1")), Some(2));
    }

    #[test]
    fn score_restricts_to_candidates() {
        let strategy = SupervisedTargets;
        let logits = array![0., 0., 5., 1., 2.];

        let (id, prob) = strategy.score(&[3, 4], logits.view()).unwrap();
        assert_eq!(id, 4);

        let total = 2f32 + 5f32.exp() + 1f32.exp() + 2f32.exp();
        assert_abs_diff_eq!(prob, 2f32.exp() / total, epsilon = 1e-6);

        assert!(strategy.score(&[], logits.view()).is_none());
        assert!(strategy.score(&[10], logits.view()).is_none());
    }
}
