//! Per-epoch training metrics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which stage of fine-tuning an epoch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Body frozen, only the head trains.
    Frozen,
    /// All parameter groups train.
    Unfrozen,
}

/// Results of one epoch as reported by the trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    /// Zero-based index across the whole fine-tune, both phases included.
    pub epoch: usize,
    pub phase: Phase,
    pub train_loss: f64,
    pub valid_loss: Option<f64>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub elapsed_secs: f64,
}

impl EpochRecord {
    /// Flat scalar map for the tracking session.
    pub fn scalars(&self) -> BTreeMap<String, f64> {
        let mut out = self.metrics.clone();
        out.insert("epoch".to_string(), self.epoch as f64);
        out.insert("train_loss".to_string(), self.train_loss);
        if let Some(vl) = self.valid_loss {
            out.insert("valid_loss".to_string(), vl);
        }
        out
    }
}

/// Accumulated metrics of one fit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub epochs_completed: usize,
    pub loss_history: Vec<f64>,
    pub val_loss_history: Vec<f64>,
    pub custom_metrics: BTreeMap<String, Vec<f64>>,
    pub best_epoch: Option<usize>,
    pub best_loss: Option<f64>,
    pub total_training_time_secs: f64,
}

impl TrainingMetrics {
    pub fn record_epoch(&mut self, record: &EpochRecord) {
        self.loss_history.push(record.train_loss);
        if let Some(vl) = record.valid_loss {
            self.val_loss_history.push(vl);
        }
        for (name, value) in &record.metrics {
            self.custom_metrics
                .entry(name.clone())
                .or_default()
                .push(*value);
        }
        self.epochs_completed += 1;
        self.total_training_time_secs += record.elapsed_secs;

        let check_loss = record.valid_loss.unwrap_or(record.train_loss);
        if self.best_loss.is_none_or(|best| check_loss < best) {
            self.best_loss = Some(check_loss);
            self.best_epoch = Some(record.epoch);
        }
    }

    /// Last reported value of a metric.
    pub fn last(&self, name: &str) -> Option<f64> {
        self.custom_metrics.get(name).and_then(|v| v.last().copied())
    }
}
