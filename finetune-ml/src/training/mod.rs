//! Training — learner specs, the trainer seam and the fastai backend.

pub mod callbacks;
pub mod fastai;
pub mod learner;
pub mod memory;
pub mod metrics;
pub mod trainer;

pub use callbacks::{CallbackList, ProgressCallback, TrainingCallback};
pub use fastai::FastaiTrainer;
pub use learner::{LearnerSpec, Metric, Precision, Splitter};
pub use memory::DeviceMemory;
pub use metrics::{EpochRecord, Phase, TrainingMetrics};
pub use trainer::{DataSpec, FitJob, FitReport, Trainer};
