//! Experiment tracking — one session per repetition.
//!
//! A [`Tracker`] opens sessions; a [`SessionGuard`] owns one and guarantees it
//! is closed. Sessions dropped without an explicit [`SessionGuard::finish`]
//! are recorded as [`RunStatus::Failed`].

pub mod callback;
pub mod local;
pub mod memory;
pub mod record;

pub use callback::TrackingCallback;
pub use local::{LocalTracker, RunSummary, SWEEP_CONFIG_ENV, list_runs};
pub use memory::MemoryTracker;
pub use record::{RunRecord, RunStatus};

use crate::error::Result;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use tracing::warn;

/// What a session is opened with.
#[derive(Debug, Clone, PartialEq)]
pub struct InitSettings {
    pub project: String,
    /// Group tag, the model source (`"timm"` or `"torchvision"`).
    pub group: String,
    /// Base configuration snapshot.
    pub config: Value,
}

/// An open tracking session.
pub trait TrackingSession: Send {
    fn id(&self) -> &str;

    /// Overrides the tracking service pushes onto this run (a sweep agent, for
    /// instance). Empty when nothing is overridden.
    fn config_overrides(&self) -> &Map<String, Value>;

    /// Record scalars at `step`.
    fn log(&mut self, step: usize, scalars: &BTreeMap<String, f64>) -> Result<()>;

    /// Set a run-level summary value, replacing any previous one.
    fn set_summary(&mut self, key: &str, value: f64) -> Result<()>;

    /// Close the session. Later calls are no-ops.
    fn finish(&mut self, status: RunStatus) -> Result<()>;
}

/// A tracking backend.
pub trait Tracker: Send + Sync {
    fn init(&self, settings: &InitSettings) -> Result<Box<dyn TrackingSession>>;

    /// Open a session wrapped in a guard.
    fn open(&self, settings: &InitSettings) -> Result<SessionGuard> {
        Ok(SessionGuard::new(self.init(settings)?))
    }
}

/// Owns a session and closes it on every exit path.
pub struct SessionGuard {
    session: Box<dyn TrackingSession>,
    finished: bool,
}

impl SessionGuard {
    pub fn new(session: Box<dyn TrackingSession>) -> Self {
        Self {
            session,
            finished: false,
        }
    }

    /// Close the session with `status`.
    pub fn finish(mut self, status: RunStatus) -> Result<()> {
        self.finished = true;
        self.session.finish(status)
    }
}

impl Deref for SessionGuard {
    type Target = dyn TrackingSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(run_id = %self.session.id(), "Tracking session dropped unfinished, marking failed");
        if let Err(e) = self.session.finish(RunStatus::Failed) {
            warn!(run_id = %self.session.id(), error = %e, "Failed to close tracking session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> InitSettings {
        InitSettings {
            project: "proj".into(),
            group: "timm".into(),
            config: serde_json::json!({"epochs": 1}),
        }
    }

    #[test]
    fn test_guard_finish_records_status() {
        let tracker = MemoryTracker::new();
        let guard = tracker.open(&settings()).unwrap();
        let id = guard.id().to_string();
        guard.finish(RunStatus::Success).unwrap();

        assert_eq!(tracker.run(&id).unwrap().status, RunStatus::Success);
        assert_eq!(tracker.open_sessions(), 0);
    }

    #[test]
    fn test_dropped_guard_marks_failed() {
        let tracker = MemoryTracker::new();
        let id = {
            let mut guard = tracker.open(&settings()).unwrap();
            guard.log(0, &BTreeMap::from([("loss".to_string(), 1.0)])).unwrap();
            guard.id().to_string()
        };
        let run = tracker.run(&id).unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.ended_at.is_some());
        assert_eq!(tracker.open_sessions(), 0);
    }
}
