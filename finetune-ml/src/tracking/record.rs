//! Run record — one tracked repetition and its lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a tracked run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Session open, repetition in progress.
    Running,
    /// Repetition completed and the session was closed normally.
    Success,
    /// The repetition failed or its session was dropped without finishing.
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A single tracked run: identity, group tag, status and the config snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub project: String,
    pub group: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Effective configuration of the repetition, overrides applied.
    pub config: serde_json::Value,
}

impl RunRecord {
    /// Start a run now.
    pub fn start(
        run_id: impl Into<String>,
        project: impl Into<String>,
        group: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            project: project.into(),
            group: group.into(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            config,
        }
    }

    /// Close the run with `status`. Closing twice keeps the first outcome.
    pub fn complete(&mut self, status: RunStatus) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.ended_at = Some(Utc::now());
    }

    /// Wall time between start and end, if the run has ended.
    pub fn duration_secs(&self) -> Option<f64> {
        self.ended_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}
