//! fastai-backed trainer running in a Python worker process.

use crate::error::{FinetuneError, Result};
use crate::runtime::PythonRuntime;
use crate::training::callbacks::TrainingCallback;
use crate::training::memory::DeviceMemory;
use crate::training::metrics::{EpochRecord, TrainingMetrics};
use crate::training::trainer::{FitJob, FitReport, Trainer};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

const WORKER_SCRIPT: &str = include_str!("../../assets/fastai_worker.py");

/// One line of the worker's stdout protocol.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WorkerEvent {
    Epoch(EpochRecord),
    Done {
        device: String,
        #[serde(default)]
        memory: DeviceMemory,
    },
}

/// Fine-tunes through fastai's `vision_learner(...).fine_tune(...)`.
#[derive(Debug, Clone)]
pub struct FastaiTrainer {
    runtime: PythonRuntime,
}

impl FastaiTrainer {
    pub fn new(runtime: PythonRuntime) -> Self {
        Self { runtime }
    }
}

/// Folds worker events into a report while forwarding epochs to a callback.
struct EventSink<'a> {
    callback: &'a mut dyn TrainingCallback,
    metrics: TrainingMetrics,
    done: Option<(String, DeviceMemory)>,
}

impl EventSink<'_> {
    fn handle_line(&mut self, line: &str) -> Result<()> {
        let event: WorkerEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(_) => {
                debug!(target: "finetune::worker", "{line}");
                return Ok(());
            }
        };
        match event {
            WorkerEvent::Epoch(record) => {
                self.metrics.record_epoch(&record);
                self.callback.on_epoch_end(&record)?;
            }
            WorkerEvent::Done { device, memory } => {
                self.done = Some((device, memory));
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<FitReport> {
        let (device, memory) = self
            .done
            .ok_or_else(|| FinetuneError::training("worker exited without reporting completion"))?;
        Ok(FitReport {
            metrics: self.metrics,
            device,
            memory,
        })
    }
}

#[async_trait]
impl Trainer for FastaiTrainer {
    async fn fine_tune(&self, job: &FitJob, callback: &mut dyn TrainingCallback) -> Result<FitReport> {
        info!(
            model = %job.learner.model,
            epochs = job.epochs,
            lr = job.learning_rate,
            train = job.data.train.len(),
            valid = job.data.valid.len(),
            "Starting fine-tune"
        );

        let input = serde_json::to_value(job)?;
        let mut sink = EventSink {
            callback,
            metrics: TrainingMetrics::default(),
            done: None,
        };
        self.runtime
            .run_streaming(WORKER_SCRIPT, &input, None, |line| sink.handle_line(line))
            .await?;

        let report = sink.finish()?;
        info!(
            device = %report.device,
            epochs = report.metrics.epochs_completed,
            best_loss = ?report.metrics.best_loss,
            "Fine-tune finished"
        );
        Ok(report)
    }
}
