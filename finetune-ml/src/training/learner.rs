//! Learner specification — what the trainer is asked to build.

use crate::zoo::ModelSpec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A metric attached to the learner, reported once per epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Metric {
    /// Top-1 accuracy.
    Accuracy,
    /// `1 - accuracy`.
    ErrorRate,
    /// Fraction of samples whose target is among the `k` highest scores.
    TopKAccuracy { k: usize },
}

impl Metric {
    /// Name under which the metric is logged.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Accuracy => "accuracy",
            Self::ErrorRate => "error_rate",
            Self::TopKAccuracy { .. } => "top_k_accuracy",
        }
    }

    /// Accuracy, error rate and top-5 accuracy.
    pub fn standard() -> Vec<Metric> {
        vec![Self::Accuracy, Self::ErrorRate, Self::TopKAccuracy { k: 5 }]
    }
}

/// How model parameters are grouped for differential learning rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Splitter {
    /// Body and head in separate groups.
    Default,
    /// Every trainable parameter in one group.
    None,
}

impl Splitter {
    /// `"default"` selects [`Splitter::Default`]; anything else selects [`Splitter::None`].
    pub fn from_name(name: &str) -> Self {
        if name == "default" {
            Self::Default
        } else {
            Self::None
        }
    }
}

impl fmt::Display for Splitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Compute precision of the trainer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Fp32,
    /// Mixed precision with half-precision activations.
    #[default]
    Fp16,
}

/// Everything needed to construct a learner around a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerSpec {
    pub model: ModelSpec,
    pub metrics: Vec<Metric>,
    pub concat_pool: bool,
    pub splitter: Splitter,
    pub precision: Precision,
    /// Whether the tracking callback uploads sample predictions.
    pub log_preds: bool,
}

impl LearnerSpec {
    /// The learner used for every sweep repetition: standard metrics,
    /// half precision and no prediction logging.
    pub fn vision_learner(model: ModelSpec, concat_pool: bool, splitter: Splitter) -> Self {
        Self {
            model,
            metrics: Metric::standard(),
            concat_pool,
            splitter,
            precision: Precision::Fp16,
            log_preds: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zoo::TorchvisionArch;

    #[test]
    fn test_splitter_from_name() {
        assert_eq!(Splitter::from_name("default"), Splitter::Default);
        assert_eq!(Splitter::from_name("none"), Splitter::None);
        assert_eq!(Splitter::from_name("Default"), Splitter::None);
        assert_eq!(Splitter::from_name(""), Splitter::None);
    }

    #[test]
    fn test_vision_learner_defaults() {
        let spec = LearnerSpec::vision_learner(
            ModelSpec::Torchvision(TorchvisionArch::Resnet18),
            true,
            Splitter::Default,
        );
        assert_eq!(spec.precision, Precision::Fp16);
        assert!(!spec.log_preds);
        assert!(spec.concat_pool);
        let names: Vec<_> = spec.metrics.iter().map(Metric::name).collect();
        assert_eq!(names, vec!["accuracy", "error_rate", "top_k_accuracy"]);
    }

    #[test]
    fn test_metric_wire_format() {
        let json = serde_json::to_value(Metric::TopKAccuracy { k: 5 }).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "top_k_accuracy", "k": 5}));
    }
}
