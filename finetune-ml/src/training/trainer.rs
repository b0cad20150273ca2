//! Trainer abstraction — a backend that fine-tunes a learner on a data split.

use crate::data::{DataLoaders, Item, ResizeMethod};
use crate::error::Result;
use crate::training::callbacks::TrainingCallback;
use crate::training::learner::LearnerSpec;
use crate::training::memory::DeviceMemory;
use crate::training::metrics::TrainingMetrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The data side of a fit job: the exact split built by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSpec {
    pub root: PathBuf,
    pub vocab: Vec<String>,
    pub train: Vec<Item>,
    pub valid: Vec<Item>,
    pub batch_size: usize,
    pub img_size: u32,
    pub resize_method: ResizeMethod,
    pub seed: u64,
}

impl From<&DataLoaders> for DataSpec {
    fn from(dls: &DataLoaders) -> Self {
        Self {
            root: dls.root.clone(),
            vocab: dls.vocab.classes().to_vec(),
            train: dls.train.items().to_vec(),
            valid: dls.valid.items().to_vec(),
            batch_size: dls.train.batch_size(),
            img_size: dls.resize.size,
            resize_method: dls.resize.method,
            seed: dls.seed,
        }
    }
}

/// One fine-tuning request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitJob {
    pub learner: LearnerSpec,
    pub data: DataSpec,
    /// Epochs after the frozen warm-up epoch.
    pub epochs: usize,
    pub learning_rate: f64,
}

/// What a finished fit reports back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FitReport {
    pub metrics: TrainingMetrics,
    /// Device the model was trained on (e.g. `cuda:0`, `cpu`).
    pub device: String,
    pub memory: DeviceMemory,
}

/// A training backend.
///
/// Each call builds a fresh model; nothing carries over between calls.
#[async_trait]
pub trait Trainer: Send + Sync {
    /// Fine-tune `job.learner` on `job.data`, calling `callback` after every epoch.
    async fn fine_tune(&self, job: &FitJob, callback: &mut dyn TrainingCallback) -> Result<FitReport>;
}
