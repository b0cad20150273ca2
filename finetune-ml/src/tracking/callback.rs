//! Streams epoch results into a tracking session.

use super::TrackingSession;
use crate::error::Result;
use crate::training::{EpochRecord, TrainingCallback};

/// Logs every epoch's scalars at step `epoch`.
///
/// Sample predictions are never uploaded.
pub struct TrackingCallback<'a> {
    session: &'a mut dyn TrackingSession,
}

impl<'a> TrackingCallback<'a> {
    pub fn new(session: &'a mut dyn TrackingSession) -> Self {
        Self { session }
    }
}

impl TrainingCallback for TrackingCallback<'_> {
    fn on_epoch_end(&mut self, record: &EpochRecord) -> Result<()> {
        self.session.log(record.epoch, &record.scalars())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::{InitSettings, MemoryTracker, Tracker};
    use crate::training::Phase;
    use std::collections::BTreeMap;

    #[test]
    fn test_logs_scalars_per_epoch() {
        let tracker = MemoryTracker::new();
        let mut guard = tracker
            .open(&InitSettings {
                project: "p".into(),
                group: "timm".into(),
                config: serde_json::json!({}),
            })
            .unwrap();
        let id = guard.id().to_string();
        {
            let mut cb = TrackingCallback::new(&mut *guard);
            for epoch in 0..2 {
                cb.on_epoch_end(&EpochRecord {
                    epoch,
                    phase: Phase::Unfrozen,
                    train_loss: 1.0,
                    valid_loss: Some(0.5),
                    metrics: BTreeMap::from([("accuracy".to_string(), 0.8)]),
                    elapsed_secs: 0.0,
                })
                .unwrap();
            }
        }

        let points = tracker.metrics(&id);
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].step, 1);
        assert_eq!(points[1].values["accuracy"], 0.8);
        assert_eq!(points[1].values["valid_loss"], 0.5);
    }
}
