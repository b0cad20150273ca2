//! Training callbacks — hooks the trainer calls as epochs complete.

use crate::error::Result;
use crate::training::metrics::EpochRecord;
use tracing::info;

/// Receives epoch results while a fit is running.
pub trait TrainingCallback: Send {
    /// Called once per completed epoch, in order. An error aborts the fit.
    fn on_epoch_end(&mut self, record: &EpochRecord) -> Result<()>;
}

/// Logs a progress line per epoch.
#[derive(Debug, Default, Clone)]
pub struct ProgressCallback {
    pub model: String,
}

impl ProgressCallback {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

impl TrainingCallback for ProgressCallback {
    fn on_epoch_end(&mut self, record: &EpochRecord) -> Result<()> {
        info!(
            model = %self.model,
            epoch = record.epoch,
            phase = ?record.phase,
            train_loss = record.train_loss,
            valid_loss = ?record.valid_loss,
            accuracy = ?record.metrics.get("accuracy"),
            "Epoch complete"
        );
        Ok(())
    }
}

/// Fans one record out to several callbacks in order.
pub struct CallbackList<'a> {
    callbacks: Vec<&'a mut dyn TrainingCallback>,
}

impl<'a> CallbackList<'a> {
    pub fn new(callbacks: Vec<&'a mut dyn TrainingCallback>) -> Self {
        Self { callbacks }
    }
}

impl TrainingCallback for CallbackList<'_> {
    fn on_epoch_end(&mut self, record: &EpochRecord) -> Result<()> {
        for cb in self.callbacks.iter_mut() {
            cb.on_epoch_end(record)?;
        }
        Ok(())
    }
}
