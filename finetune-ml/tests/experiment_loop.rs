//! Integration tests for the experiment loop.
//!
//! A scripted trainer stands in for the Python worker and an in-memory
//! tracker records sessions, so the whole loop runs against a small
//! on-disk Pets fixture.

use async_trait::async_trait;
use finetune_ml::data::LocalDataset;
use finetune_ml::error::{FinetuneError, Result};
use finetune_ml::tracking::{MemoryTracker, RunStatus};
use finetune_ml::training::{
    DeviceMemory, EpochRecord, FitJob, FitReport, Phase, Splitter, Trainer, TrainingCallback,
    TrainingMetrics,
};
use finetune_ml::{ExperimentRunner, GPU_MEM_KEY, ModelSpec, RunConfig, TorchvisionArch};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const GIB: u64 = 1024 * 1024 * 1024;

/// Emits `1 + epochs` epoch records and reports a fixed memory peak.
#[derive(Clone, Default)]
struct ScriptedTrainer {
    jobs: Arc<Mutex<Vec<FitJob>>>,
    open_during_fit: Arc<Mutex<Vec<usize>>>,
    tracker: Option<MemoryTracker>,
}

impl ScriptedTrainer {
    fn watching(tracker: &MemoryTracker) -> Self {
        Self {
            tracker: Some(tracker.clone()),
            ..Self::default()
        }
    }

    fn jobs(&self) -> Vec<FitJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Trainer for ScriptedTrainer {
    async fn fine_tune(&self, job: &FitJob, callback: &mut dyn TrainingCallback) -> Result<FitReport> {
        self.jobs.lock().unwrap().push(job.clone());
        if let Some(tracker) = &self.tracker {
            self.open_during_fit
                .lock()
                .unwrap()
                .push(tracker.open_sessions());
        }

        let mut metrics = TrainingMetrics::default();
        for epoch in 0..=job.epochs {
            let record = EpochRecord {
                epoch,
                phase: if epoch == 0 {
                    Phase::Frozen
                } else {
                    Phase::Unfrozen
                },
                train_loss: 1.0 / (epoch as f64 + 1.0),
                valid_loss: Some(0.8 / (epoch as f64 + 1.0)),
                metrics: BTreeMap::from([("accuracy".to_string(), 0.5 + epoch as f64 * 0.1)]),
                elapsed_secs: 0.01,
            };
            metrics.record_epoch(&record);
            callback.on_epoch_end(&record)?;
        }

        let mut memory = DeviceMemory::default();
        memory.reserved_bytes.small_pool.peak = GIB / 2;
        memory.reserved_bytes.large_pool.peak = GIB;
        Ok(FitReport {
            metrics,
            device: "cuda:0".to_string(),
            memory,
        })
    }
}

/// Fails before reporting any epoch.
struct FailingTrainer;

#[async_trait]
impl Trainer for FailingTrainer {
    async fn fine_tune(&self, _job: &FitJob, _callback: &mut dyn TrainingCallback) -> Result<FitReport> {
        Err(FinetuneError::training("CUDA out of memory"))
    }
}

fn pets_fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    let images = dir.path().join("images");
    std::fs::create_dir_all(&images).unwrap();
    for class in ["Abyssinian", "basset_hound", "Bengal", "yorkshire_terrier"] {
        for i in 0..5 {
            std::fs::write(images.join(format!("{class}_{i}.jpg")), b"jpg").unwrap();
        }
    }
    dir
}

fn small_config() -> RunConfig {
    RunConfig {
        batch_size: 4,
        img_size: 8,
        epochs: 2,
        num_experiments: 2,
        ..RunConfig::default()
    }
}

fn runner(tracker: &MemoryTracker, trainer: Arc<dyn Trainer>, fixture: &TempDir) -> ExperimentRunner {
    ExperimentRunner::new(
        Arc::new(tracker.clone()),
        trainer,
        Arc::new(LocalDataset::new(fixture.path().to_path_buf())),
    )
}

#[tokio::test]
async fn test_one_session_per_repetition_in_sequence() {
    let fixture = pets_fixture();
    let tracker = MemoryTracker::new();
    let trainer = ScriptedTrainer::watching(&tracker);
    let config = RunConfig {
        num_experiments: 3,
        ..small_config()
    };

    let outcomes = runner(&tracker, Arc::new(trainer.clone()), &fixture)
        .run(&config)
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 3);
    let runs = tracker.runs();
    assert_eq!(runs.len(), 3);
    assert!(runs.iter().all(|r| r.status == RunStatus::Success));
    assert_eq!(tracker.max_concurrent_sessions(), 1);
    assert_eq!(tracker.open_sessions(), 0);
    assert_eq!(*trainer.open_during_fit.lock().unwrap(), vec![1, 1, 1]);

    let ids: Vec<_> = outcomes.iter().map(|o| o.run_id.clone()).collect();
    let run_ids: Vec<_> = runs.iter().map(|r| r.run_id.clone()).collect();
    assert_eq!(ids, run_ids);
}

#[tokio::test]
async fn test_single_repetition_logs_gpu_mem() {
    let fixture = pets_fixture();
    let tracker = MemoryTracker::new();
    let config = RunConfig {
        num_experiments: 1,
        epochs: 1,
        ..small_config()
    };

    let outcomes = runner(&tracker, Arc::new(ScriptedTrainer::default()), &fixture)
        .run(&config)
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 1);
    let id = &outcomes[0].run_id;
    let summary = tracker.summary(id);
    assert_eq!(summary[GPU_MEM_KEY], 1.5);
    assert!(summary[GPU_MEM_KEY] >= 0.0);

    let points = tracker.metrics(id);
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].step, 0);
    assert!(points[1].values.contains_key("accuracy"));
    assert!(points[1].values.contains_key("valid_loss"));
}

#[tokio::test]
async fn test_timm_name_passes_through() {
    let fixture = pets_fixture();
    let tracker = MemoryTracker::new();
    let trainer = ScriptedTrainer::default();
    let config = RunConfig {
        model_name: "convnext_nano_not_in_any_list".into(),
        num_experiments: 1,
        ..small_config()
    };

    runner(&tracker, Arc::new(trainer.clone()), &fixture)
        .run(&config)
        .await
        .unwrap();

    let jobs = trainer.jobs();
    assert_eq!(
        jobs[0].learner.model,
        ModelSpec::Timm("convnext_nano_not_in_any_list".into())
    );
    assert_eq!(tracker.runs()[0].group, "timm");
}

#[tokio::test]
async fn test_force_torchvision_resolves_catalog() {
    let fixture = pets_fixture();
    let tracker = MemoryTracker::new();
    let trainer = ScriptedTrainer::default();
    let config = RunConfig {
        model_name: "resnet18".into(),
        force_torchvision: true,
        num_experiments: 1,
        ..small_config()
    };

    let outcomes = runner(&tracker, Arc::new(trainer.clone()), &fixture)
        .run(&config)
        .await
        .unwrap();

    let expected = ModelSpec::Torchvision(TorchvisionArch::Resnet18);
    assert_eq!(outcomes[0].model, expected);
    assert_eq!(trainer.jobs()[0].learner.model, expected);
    assert_eq!(tracker.runs()[0].group, "torchvision");
}

#[tokio::test]
async fn test_unknown_torchvision_name_fails_before_fit() {
    let fixture = pets_fixture();
    let tracker = MemoryTracker::new();
    let trainer = ScriptedTrainer::default();
    let config = RunConfig {
        model_name: "resnet19".into(),
        force_torchvision: true,
        ..small_config()
    };

    let err = runner(&tracker, Arc::new(trainer.clone()), &fixture)
        .run(&config)
        .await
        .unwrap_err();

    assert!(matches!(err, FinetuneError::UnknownModel { ref name, .. } if name == "resnet19"));
    assert!(trainer.jobs().is_empty());
    let runs = tracker.runs();
    assert_eq!(runs.len(), 1, "the loop stops at the first failure");
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert_eq!(tracker.open_sessions(), 0);
}

#[tokio::test]
async fn test_training_failure_closes_session_as_failed() {
    let fixture = pets_fixture();
    let tracker = MemoryTracker::new();

    let result = runner(&tracker, Arc::new(FailingTrainer), &fixture)
        .run(&small_config())
        .await;

    assert!(matches!(result, Err(FinetuneError::Training(_))));
    assert_eq!(tracker.runs().len(), 1);
    assert_eq!(tracker.runs()[0].status, RunStatus::Failed);
    assert_eq!(tracker.open_sessions(), 0);
}

#[tokio::test]
async fn test_split_func_selects_splitter() {
    let fixture = pets_fixture();
    for (split_func, expected) in [
        ("default", Splitter::Default),
        ("none", Splitter::None),
        ("anything", Splitter::None),
    ] {
        let tracker = MemoryTracker::new();
        let trainer = ScriptedTrainer::default();
        let config = RunConfig {
            split_func: split_func.into(),
            num_experiments: 1,
            ..small_config()
        };
        runner(&tracker, Arc::new(trainer.clone()), &fixture)
            .run(&config)
            .await
            .unwrap();
        assert_eq!(trainer.jobs()[0].learner.splitter, expected, "{split_func}");
    }
}

#[tokio::test]
async fn test_sweep_overrides_drive_the_repetition() {
    let fixture = pets_fixture();
    let mut overrides = serde_json::Map::new();
    overrides.insert("epochs".into(), serde_json::json!(4));
    overrides.insert("learning_rate".into(), serde_json::json!(0.01));
    let tracker = MemoryTracker::new().with_overrides(overrides);
    let trainer = ScriptedTrainer::default();
    let base = RunConfig {
        num_experiments: 1,
        ..small_config()
    };

    let outcomes = runner(&tracker, Arc::new(trainer.clone()), &fixture)
        .run(&base)
        .await
        .unwrap();

    let job = &trainer.jobs()[0];
    assert_eq!(job.epochs, 4);
    assert_eq!(job.learning_rate, 0.01);
    assert_eq!(outcomes[0].config.epochs, 4);
    assert_eq!(base.epochs, 2);
    assert_eq!(tracker.metrics(&outcomes[0].run_id).len(), 5);
}

#[tokio::test]
async fn test_every_repetition_sees_same_split() {
    let fixture = pets_fixture();
    let tracker = MemoryTracker::new();
    let trainer = ScriptedTrainer::default();

    runner(&tracker, Arc::new(trainer.clone()), &fixture)
        .run(&small_config())
        .await
        .unwrap();

    let jobs = trainer.jobs();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].data, jobs[1].data);
    assert_eq!(jobs[0].data.valid.len(), 4);
    assert_eq!(jobs[0].data.train.len(), 16);
    assert_eq!(jobs[0].data.vocab.len(), 4);
}

#[tokio::test]
async fn test_zero_sizes_fail_before_fit() {
    let fixture = pets_fixture();
    for config in [
        RunConfig {
            batch_size: 0,
            ..small_config()
        },
        RunConfig {
            img_size: 0,
            resize_method: "pad".into(),
            ..small_config()
        },
    ] {
        let tracker = MemoryTracker::new();
        let trainer = ScriptedTrainer::default();

        let err = runner(&tracker, Arc::new(trainer.clone()), &fixture)
            .run(&config)
            .await
            .unwrap_err();

        assert!(matches!(err, FinetuneError::InvalidInput(_)));
        assert!(trainer.jobs().is_empty());
        assert_eq!(tracker.runs().len(), 1);
        assert_eq!(tracker.runs()[0].status, RunStatus::Failed);
    }
}
