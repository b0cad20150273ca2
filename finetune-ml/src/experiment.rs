//! Experiment runner — the repeated fit-and-log loop.
//!
//! Every repetition opens its own tracking session, rebuilds the data
//! pipeline, resolves the model and fine-tunes it from scratch. Repetitions
//! run strictly one after another and share nothing but the base config.

use crate::config::RunConfig;
use crate::data::{self, DatasetProvider, PipelineParams};
use crate::error::Result;
use crate::tracking::{InitSettings, RunStatus, Tracker, TrackingCallback};
use crate::training::{
    CallbackList, DataSpec, FitJob, FitReport, LearnerSpec, ProgressCallback, Trainer,
    TrainingCallback,
};
use crate::zoo::ModelSpec;
use std::sync::Arc;
use tracing::{Instrument, info, info_span};

/// Summary key for peak reserved device memory in GiB.
pub const GPU_MEM_KEY: &str = "GPU_mem";

/// Result of one repetition.
#[derive(Debug, Clone)]
pub struct RepetitionOutcome {
    pub index: usize,
    pub run_id: String,
    /// Configuration the repetition actually ran with.
    pub config: RunConfig,
    pub model: ModelSpec,
    pub report: FitReport,
    pub gpu_mem: f64,
}

/// Drives `num_experiments` independent fine-tuning repetitions.
#[derive(Clone)]
pub struct ExperimentRunner {
    tracker: Arc<dyn Tracker>,
    trainer: Arc<dyn Trainer>,
    dataset: Arc<dyn DatasetProvider>,
    images_subdir: String,
}

impl ExperimentRunner {
    pub fn new(
        tracker: Arc<dyn Tracker>,
        trainer: Arc<dyn Trainer>,
        dataset: Arc<dyn DatasetProvider>,
    ) -> Self {
        Self {
            tracker,
            trainer,
            dataset,
            images_subdir: "images".to_string(),
        }
    }

    /// Directory under the dataset root that holds the images.
    pub fn with_images_subdir(mut self, subdir: impl Into<String>) -> Self {
        self.images_subdir = subdir.into();
        self
    }

    /// Run every repetition in order. The first failure aborts the loop.
    pub async fn run(&self, base: &RunConfig) -> Result<Vec<RepetitionOutcome>> {
        info!(
            model = %base.model_name,
            experiments = base.num_experiments,
            dataset = %self.dataset.describe(),
            fingerprint = %base.fingerprint(),
            ">> Training {}",
            base.model_name
        );

        let mut outcomes = Vec::with_capacity(base.num_experiments);
        for index in 0..base.num_experiments {
            let span = info_span!("repetition", index, total = base.num_experiments);
            let outcome = self.run_once(index, base).instrument(span).await?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// One repetition. The session guard closes the run as failed on any
    /// early return.
    async fn run_once(&self, index: usize, base: &RunConfig) -> Result<RepetitionOutcome> {
        let settings = InitSettings {
            project: base.wandb_project.clone(),
            group: base.model_source().group().to_string(),
            config: serde_json::to_value(base)?,
        };
        let mut session = self.tracker.open(&settings)?;
        let run_id = session.id().to_string();

        let config = base.merged_with(session.config_overrides())?;

        let dls = data::get_pets(
            self.dataset.as_ref(),
            &self.images_subdir,
            &PipelineParams::from(&config),
        )
        .await?;

        let model = ModelSpec::resolve(config.model_source(), &config.model_name)?;
        let job = FitJob {
            learner: LearnerSpec::vision_learner(
                model.clone(),
                config.concat_pool,
                config.splitter(),
            ),
            data: DataSpec::from(&dls),
            epochs: config.epochs,
            learning_rate: config.learning_rate,
        };

        let report = {
            let mut tracking = TrackingCallback::new(&mut *session);
            let mut progress = ProgressCallback::new(model.to_string());
            let hooks: Vec<&mut dyn TrainingCallback> = vec![&mut tracking, &mut progress];
            let mut callbacks = CallbackList::new(hooks);
            self.trainer.fine_tune(&job, &mut callbacks).await?
        };

        let gpu_mem = report.memory.peak_reserved_gb();
        session.set_summary(GPU_MEM_KEY, gpu_mem)?;
        session.finish(RunStatus::Success)?;

        info!(
            index,
            run_id = %run_id,
            %model,
            gpu_mem,
            device = %report.device,
            "Repetition complete"
        );

        Ok(RepetitionOutcome {
            index,
            run_id,
            config,
            model,
            report,
            gpu_mem,
        })
    }
}
