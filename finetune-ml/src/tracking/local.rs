//! Filesystem run store.
//!
//! Layout under the tracking root:
//!
//! ```text
//! <root>/<project>/<run_id>/run.json       run record
//! <root>/<project>/<run_id>/metrics.jsonl  one line per logged step
//! <root>/<project>/<run_id>/summary.json   summary scalars
//! ```

use super::{InitSettings, RunRecord, RunStatus, Tracker, TrackingSession};
use crate::config::TrackingConfig;
use crate::error::{FinetuneError, Result};
use crate::persistence::{append_jsonl, atomic_write_json, load_json, read_jsonl};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Env var naming a JSON file of sweep overrides.
pub const SWEEP_CONFIG_ENV: &str = "FINETUNE_SWEEP_CONFIG";

const RUN_FILE: &str = "run.json";
const METRICS_FILE: &str = "metrics.jsonl";
const SUMMARY_FILE: &str = "summary.json";

/// Tracker writing runs to a local directory tree.
#[derive(Debug, Clone)]
pub struct LocalTracker {
    root: PathBuf,
    sweep_file: Option<PathBuf>,
}

impl LocalTracker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sweep_file: None,
        }
    }

    /// Build from the `[tracking]` section. Without a configured sweep file,
    /// [`SWEEP_CONFIG_ENV`] is consulted.
    pub fn from_config(config: &TrackingConfig) -> Self {
        Self {
            root: config.root_dir.clone(),
            sweep_file: config
                .sweep_file
                .clone()
                .or_else(|| std::env::var_os(SWEEP_CONFIG_ENV).map(PathBuf::from)),
        }
    }

    pub fn with_sweep_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sweep_file = Some(path.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read the sweep overrides, re-read at every session open.
    fn load_overrides(&self) -> Result<Map<String, Value>> {
        let Some(path) = &self.sweep_file else {
            return Ok(Map::new());
        };
        match load_json::<Value>(path)? {
            Some(Value::Object(map)) => Ok(map),
            Some(other) => Err(FinetuneError::tracking(format!(
                "sweep file {} must hold a JSON object, found {other}",
                path.display()
            ))),
            None => Err(FinetuneError::tracking(format!(
                "sweep file {} not found",
                path.display()
            ))),
        }
    }
}

/// Project names become a single directory level under the tracking root.
fn validate_project(project: &str) -> Result<()> {
    let plain = !project.is_empty()
        && project != "."
        && project != ".."
        && !project.contains(['/', '\\'])
        && Path::new(project).components().count() == 1;
    if plain {
        Ok(())
    } else {
        Err(FinetuneError::invalid_input(format!(
            "project name '{project}' must be a single path component"
        )))
    }
}

impl Tracker for LocalTracker {
    fn init(&self, settings: &InitSettings) -> Result<Box<dyn TrackingSession>> {
        validate_project(&settings.project)?;
        let overrides = self.load_overrides()?;
        let mut config = settings.config.clone();
        if let Value::Object(map) = &mut config {
            map.extend(overrides.clone());
        }

        let run_id = format!(
            "{}-{}",
            Utc::now().format("%Y%m%dT%H%M%S"),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        let dir = self.root.join(&settings.project).join(&run_id);
        std::fs::create_dir_all(&dir)?;

        let record = RunRecord::start(
            run_id.clone(),
            settings.project.clone(),
            settings.group.clone(),
            config,
        );
        atomic_write_json(&dir.join(RUN_FILE), &record)?;
        info!(
            run_id = %run_id,
            project = %settings.project,
            group = %settings.group,
            overrides = overrides.len(),
            "Opened tracking session"
        );

        Ok(Box::new(LocalSession {
            dir,
            record,
            overrides,
            summary: BTreeMap::new(),
        }))
    }
}

/// One line of `metrics.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricLine {
    pub step: usize,
    pub timestamp: DateTime<Utc>,
    pub values: BTreeMap<String, f64>,
}

struct LocalSession {
    dir: PathBuf,
    record: RunRecord,
    overrides: Map<String, Value>,
    summary: BTreeMap<String, f64>,
}

impl TrackingSession for LocalSession {
    fn id(&self) -> &str {
        &self.record.run_id
    }

    fn config_overrides(&self) -> &Map<String, Value> {
        &self.overrides
    }

    fn log(&mut self, step: usize, scalars: &BTreeMap<String, f64>) -> Result<()> {
        let line = MetricLine {
            step,
            timestamp: Utc::now(),
            values: scalars.clone(),
        };
        append_jsonl(&self.dir.join(METRICS_FILE), &line)?;
        Ok(())
    }

    fn set_summary(&mut self, key: &str, value: f64) -> Result<()> {
        self.summary.insert(key.to_string(), value);
        atomic_write_json(&self.dir.join(SUMMARY_FILE), &self.summary)?;
        Ok(())
    }

    fn finish(&mut self, status: RunStatus) -> Result<()> {
        if self.record.status.is_terminal() {
            return Ok(());
        }
        self.record.complete(status);
        atomic_write_json(&self.dir.join(RUN_FILE), &self.record)?;
        debug!(run_id = %self.record.run_id, %status, "Closed tracking session");
        Ok(())
    }
}

/// A stored run with its summary scalars.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub record: RunRecord,
    pub summary: BTreeMap<String, f64>,
    /// Number of logged metric steps.
    pub steps: usize,
}

/// All runs under `root`, oldest first. Directories without a readable
/// `run.json` are skipped.
pub fn list_runs(root: &Path) -> Result<Vec<RunSummary>> {
    let mut runs = Vec::new();
    if !root.exists() {
        return Ok(runs);
    }
    for project in std::fs::read_dir(root)? {
        let project = project?.path();
        if !project.is_dir() {
            continue;
        }
        for run_dir in std::fs::read_dir(&project)? {
            let run_dir = run_dir?.path();
            let Ok(Some(record)) = load_json::<RunRecord>(&run_dir.join(RUN_FILE)) else {
                continue;
            };
            let summary: BTreeMap<String, f64> =
                load_json(&run_dir.join(SUMMARY_FILE))?.unwrap_or_default();
            let steps = read_jsonl::<MetricLine>(&run_dir.join(METRICS_FILE))?.len();
            runs.push(RunSummary {
                record,
                summary,
                steps,
            });
        }
    }
    runs.sort_by_key(|r| r.record.started_at);
    Ok(runs)
}
