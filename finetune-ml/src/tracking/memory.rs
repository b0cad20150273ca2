//! In-memory tracker, used when tracking is disabled and in tests.

use super::{InitSettings, RunRecord, RunStatus, Tracker, TrackingSession};
use crate::error::{FinetuneError, Result};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One logged step.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub step: usize,
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Default)]
struct Store {
    runs: Vec<RunRecord>,
    metrics: HashMap<String, Vec<MetricPoint>>,
    summaries: HashMap<String, BTreeMap<String, f64>>,
    open: usize,
    max_open: usize,
}

impl Store {
    fn run_mut(&mut self, id: &str) -> Result<&mut RunRecord> {
        self.runs
            .iter_mut()
            .find(|r| r.run_id == id)
            .ok_or_else(|| FinetuneError::tracking(format!("unknown run {id}")))
    }
}

/// Keeps runs, metrics and summaries in process memory.
///
/// Clones share the same store, so a test can hand one clone to the runner
/// and inspect another afterwards.
#[derive(Debug, Clone, Default)]
pub struct MemoryTracker {
    store: Arc<Mutex<Store>>,
    overrides: Map<String, Value>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every session opened by this tracker reports `overrides`.
    pub fn with_overrides(mut self, overrides: Map<String, Value>) -> Self {
        self.overrides = overrides;
        self
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All runs in opening order.
    pub fn runs(&self) -> Vec<RunRecord> {
        self.store().runs.clone()
    }

    pub fn run(&self, id: &str) -> Option<RunRecord> {
        self.store().runs.iter().find(|r| r.run_id == id).cloned()
    }

    pub fn metrics(&self, id: &str) -> Vec<MetricPoint> {
        self.store().metrics.get(id).cloned().unwrap_or_default()
    }

    pub fn summary(&self, id: &str) -> BTreeMap<String, f64> {
        self.store().summaries.get(id).cloned().unwrap_or_default()
    }

    /// Sessions currently open.
    pub fn open_sessions(&self) -> usize {
        self.store().open
    }

    /// Highest number of sessions ever open at once.
    pub fn max_concurrent_sessions(&self) -> usize {
        self.store().max_open
    }
}

impl Tracker for MemoryTracker {
    fn init(&self, settings: &InitSettings) -> Result<Box<dyn TrackingSession>> {
        let id = uuid::Uuid::new_v4().to_string();
        let mut config = settings.config.clone();
        if let Value::Object(map) = &mut config {
            map.extend(self.overrides.clone());
        }

        let mut store = self.store();
        store.runs.push(RunRecord::start(
            id.clone(),
            settings.project.clone(),
            settings.group.clone(),
            config,
        ));
        store.open += 1;
        store.max_open = store.max_open.max(store.open);

        Ok(Box::new(MemorySession {
            id,
            store: Arc::clone(&self.store),
            overrides: self.overrides.clone(),
            closed: false,
        }))
    }
}

struct MemorySession {
    id: String,
    store: Arc<Mutex<Store>>,
    overrides: Map<String, Value>,
    closed: bool,
}

impl MemorySession {
    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TrackingSession for MemorySession {
    fn id(&self) -> &str {
        &self.id
    }

    fn config_overrides(&self) -> &Map<String, Value> {
        &self.overrides
    }

    fn log(&mut self, step: usize, scalars: &BTreeMap<String, f64>) -> Result<()> {
        self.store()
            .metrics
            .entry(self.id.clone())
            .or_default()
            .push(MetricPoint {
                step,
                values: scalars.clone(),
            });
        Ok(())
    }

    fn set_summary(&mut self, key: &str, value: f64) -> Result<()> {
        self.store()
            .summaries
            .entry(self.id.clone())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn finish(&mut self, status: RunStatus) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut store = self.store();
        store.run_mut(&self.id)?.complete(status);
        store.open -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> InitSettings {
        InitSettings {
            project: "proj".into(),
            group: "torchvision".into(),
            config: serde_json::json!({"batch_size": 64, "epochs": 5}),
        }
    }

    #[test]
    fn test_overrides_applied_to_snapshot() {
        let mut overrides = Map::new();
        overrides.insert("epochs".into(), serde_json::json!(1));
        let tracker = MemoryTracker::new().with_overrides(overrides);

        let mut session = tracker.init(&settings()).unwrap();
        assert_eq!(session.config_overrides()["epochs"], 1);
        session.finish(RunStatus::Success).unwrap();

        let run = &tracker.runs()[0];
        assert_eq!(run.config["epochs"], 1);
        assert_eq!(run.config["batch_size"], 64);
        assert_eq!(run.group, "torchvision");
    }

    #[test]
    fn test_concurrency_counters() {
        let tracker = MemoryTracker::new();
        let mut a = tracker.init(&settings()).unwrap();
        let mut b = tracker.init(&settings()).unwrap();
        assert_eq!(tracker.open_sessions(), 2);
        a.finish(RunStatus::Success).unwrap();
        b.finish(RunStatus::Success).unwrap();
        b.finish(RunStatus::Failed).unwrap();
        assert_eq!(tracker.open_sessions(), 0);
        assert_eq!(tracker.max_concurrent_sessions(), 2);
    }

    #[test]
    fn test_metrics_and_summary() {
        let tracker = MemoryTracker::new();
        let mut session = tracker.init(&settings()).unwrap();
        let id = session.id().to_string();
        session
            .log(0, &BTreeMap::from([("train_loss".to_string(), 0.5)]))
            .unwrap();
        session.set_summary("GPU_mem", 1.0).unwrap();
        session.set_summary("GPU_mem", 2.5).unwrap();

        assert_eq!(tracker.metrics(&id).len(), 1);
        assert_eq!(tracker.summary(&id)["GPU_mem"], 2.5);
    }
}
