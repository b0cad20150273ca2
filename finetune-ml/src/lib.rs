//! # finetune-ml — repeated fine-tuning experiments on Oxford-IIIT Pets
//!
//! Builds a seeded image-classification pipeline, resolves a pretrained
//! model from the timm or torchvision catalog, fine-tunes it through a
//! Python worker and records every repetition as a tracked run.

// Foundation
pub mod config;
pub mod error;
pub mod persistence;
pub mod runtime;

// Data pipeline
pub mod data;

// Models and training
pub mod training;
pub mod zoo;

// Tracking and the experiment loop
pub mod experiment;
pub mod tracking;

// Re-exports
pub use config::{AppConfig, RunConfig, RunOverrides, load_config};
pub use error::{FinetuneError, Result};
pub use experiment::{ExperimentRunner, GPU_MEM_KEY, RepetitionOutcome};
pub use runtime::PythonRuntime;
pub use tracking::{LocalTracker, MemoryTracker, Tracker};
pub use training::{FastaiTrainer, Trainer};
pub use zoo::{ModelSource, ModelSpec, TorchvisionArch};
