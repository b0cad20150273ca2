//! Configuration system for finetune sweeps.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace `finetune.toml` -> environment (`FINETUNE_*`) -> CLI overrides.
//! Only the flags actually supplied on the command line take part in the last
//! layer, so a value set in a config file survives an omitted flag.

use crate::error::Result;
use crate::training::learner::Splitter;
use crate::zoo::ModelSource;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Default tracking project.
pub const DEFAULT_PROJECT: &str = "fine_tune_timm";

/// Workspace-level config file name.
pub const WORKSPACE_CONFIG_FILE: &str = "finetune.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// The swept run configuration.
    #[serde(default)]
    pub run: RunConfig,
    /// Dataset location and cache.
    #[serde(default)]
    pub data: DataConfig,
    /// Python worker runtime.
    #[serde(default)]
    pub python: PythonConfig,
    /// Experiment tracking backend.
    #[serde(default)]
    pub tracking: TrackingConfig,
}

/// The configuration record shared by every repetition of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub batch_size: usize,
    pub epochs: usize,
    pub num_experiments: usize,
    pub learning_rate: f64,
    pub img_size: u32,
    pub resize_method: String,
    pub model_name: String,
    pub concat_pool: bool,
    pub seed: u64,
    pub force_torchvision: bool,
    pub wandb_project: String,
    pub split_func: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            epochs: 5,
            num_experiments: 3,
            learning_rate: 2e-3,
            img_size: 224,
            resize_method: "crop".to_string(),
            model_name: "resnet34".to_string(),
            concat_pool: false,
            seed: 42,
            force_torchvision: false,
            wandb_project: DEFAULT_PROJECT.to_string(),
            split_func: "default".to_string(),
        }
    }
}

impl RunConfig {
    /// Which catalog `model_name` is resolved against.
    pub fn model_source(&self) -> ModelSource {
        if self.force_torchvision {
            ModelSource::Torchvision
        } else {
            ModelSource::Timm
        }
    }

    /// Parameter grouping selected by `split_func`.
    pub fn splitter(&self) -> Splitter {
        Splitter::from_name(&self.split_func)
    }

    /// Returns a new record with `overrides` layered on top of `self`.
    ///
    /// Keys that are not configuration fields are ignored. `self` is left
    /// untouched.
    pub fn merged_with(&self, overrides: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        if overrides.is_empty() {
            return Ok(self.clone());
        }
        let merged = Figment::from(Serialized::defaults(self))
            .merge(Serialized::defaults(overrides))
            .extract()?;
        Ok(merged)
    }

    /// Stable SHA-256 fingerprint of the record, used to group repeated runs.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        format!("{:x}", hasher.finalize())
    }
}

/// Command-line overrides for [`RunConfig`].
///
/// Absent options and unset switches serialize to nothing, so merging this
/// layer only replaces the fields that were given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epochs: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_experiments: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub img_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_func: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub concat_pool: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub force_torchvision: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wandb_project: Option<String>,
}

/// Dataset configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory where archives are downloaded and extracted.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Archive URL of the benchmark dataset.
    #[serde(default = "default_dataset_url")]
    pub dataset_url: String,
    /// Subdirectory of the extracted dataset holding the images.
    #[serde(default = "default_images_subdir")]
    pub images_subdir: String,
    /// Use an already-extracted dataset directory instead of downloading.
    #[serde(default)]
    pub local_path: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            dataset_url: default_dataset_url(),
            images_subdir: default_images_subdir(),
            local_path: None,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "finetune", "finetune")
        .map(|d| d.cache_dir().join("data"))
        .unwrap_or_else(|| PathBuf::from(".finetune/data"))
}

fn default_dataset_url() -> String {
    "https://s3.amazonaws.com/fast-ai-imageclas/oxford-iiit-pet.tgz".to_string()
}

fn default_images_subdir() -> String {
    "images".to_string()
}

/// Python worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PythonConfig {
    /// Path to the Python executable.
    #[serde(default = "default_python_path")]
    pub python_path: PathBuf,
    /// Virtual environment to run the worker in (auto-detected if not set).
    #[serde(default)]
    pub venv_path: Option<PathBuf>,
    /// Optional upper bound for a single fit subprocess (seconds). Unset runs
    /// the worker to completion.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            python_path: default_python_path(),
            venv_path: None,
            timeout_secs: None,
        }
    }
}

fn default_python_path() -> PathBuf {
    PathBuf::from("python3")
}

/// Tracking backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingBackend {
    /// Run store on the local filesystem.
    #[default]
    Local,
    /// Keep runs in memory only; nothing is persisted.
    Disabled,
}

/// Experiment tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default)]
    pub backend: TrackingBackend,
    /// Root of the local run store.
    #[serde(default = "default_tracking_root")]
    pub root_dir: PathBuf,
    /// JSON file with sweep overrides applied to every new session.
    #[serde(default)]
    pub sweep_file: Option<PathBuf>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            backend: TrackingBackend::default(),
            root_dir: default_tracking_root(),
            sweep_file: None,
        }
    }
}

fn default_tracking_root() -> PathBuf {
    PathBuf::from(".finetune/runs")
}

/// Load configuration from all layers.
///
/// `config_file` replaces the workspace-level file when given.
pub fn load_config(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
    overrides: Option<&RunOverrides>,
) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    // User-level config
    if let Some(dirs) = directories::ProjectDirs::from("dev", "finetune", "finetune") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level or explicit config
    match (config_file, workspace) {
        (Some(file), _) => figment = figment.merge(Toml::file(file)),
        (None, Some(ws)) => {
            let ws_config = ws.join(WORKSPACE_CONFIG_FILE);
            if ws_config.exists() {
                figment = figment.merge(Toml::file(&ws_config));
            }
        }
        (None, None) => {}
    }

    // Environment variables (FINETUNE_RUN__EPOCHS, FINETUNE_TRACKING__BACKEND, ...)
    figment = figment.merge(Env::prefixed("FINETUNE_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::default("run", overrides));
    }

    let mut config: AppConfig = figment.extract()?;
    if let Some(ws) = workspace {
        config.resolve_paths(ws);
    }
    Ok(config)
}

impl AppConfig {
    /// Anchor relative paths at the workspace directory.
    fn resolve_paths(&mut self, workspace: &Path) {
        let anchor = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = workspace.join(&*p);
            }
        };
        anchor(&mut self.tracking.root_dir);
        anchor(&mut self.data.cache_dir);
        if let Some(p) = self.tracking.sweep_file.as_mut() {
            anchor(p);
        }
        if let Some(p) = self.data.local_path.as_mut() {
            anchor(p);
        }
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| crate::error::FinetuneError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_run_config() {
        let config = RunConfig::default();
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.epochs, 5);
        assert_eq!(config.num_experiments, 3);
        assert_eq!(config.learning_rate, 0.002);
        assert_eq!(config.img_size, 224);
        assert_eq!(config.resize_method, "crop");
        assert_eq!(config.model_name, "resnet34");
        assert_eq!(config.split_func, "default");
        assert_eq!(config.seed, 42);
        assert_eq!(config.wandb_project, "fine_tune_timm");
        assert!(!config.concat_pool);
        assert!(!config.force_torchvision);
    }

    #[test]
    fn test_load_config_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(dir.path()), None, None).unwrap();
        assert_eq!(config.run, RunConfig::default());
        assert_eq!(config.tracking.backend, TrackingBackend::Local);
        assert!(config.tracking.root_dir.starts_with(dir.path()));
    }

    #[test]
    fn test_overrides_replace_only_given_fields() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = RunOverrides {
            epochs: Some(1),
            num_experiments: Some(1),
            model_name: Some("resnet18".into()),
            force_torchvision: true,
            ..Default::default()
        };
        let config = load_config(Some(dir.path()), None, Some(&overrides)).unwrap();

        let expected = RunConfig {
            epochs: 1,
            num_experiments: 1,
            model_name: "resnet18".into(),
            force_torchvision: true,
            ..RunConfig::default()
        };
        assert_eq!(config.run, expected);
    }

    #[test]
    fn test_workspace_file_survives_absent_flags() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(WORKSPACE_CONFIG_FILE),
            r#"
[run]
batch_size = 32
concat_pool = true

[tracking]
backend = "disabled"
"#,
        )
        .unwrap();

        let overrides = RunOverrides {
            seed: Some(7),
            ..Default::default()
        };
        let config = load_config(Some(dir.path()), None, Some(&overrides)).unwrap();
        assert_eq!(config.run.batch_size, 32);
        assert!(config.run.concat_pool);
        assert_eq!(config.run.seed, 7);
        assert_eq!(config.tracking.backend, TrackingBackend::Disabled);
    }

    #[test]
    fn test_merged_with_leaves_base_untouched() {
        let base = RunConfig::default();
        let mut overrides = serde_json::Map::new();
        overrides.insert("learning_rate".into(), serde_json::json!(0.01));
        overrides.insert("not_a_field".into(), serde_json::json!("ignored"));

        let merged = base.merged_with(&overrides).unwrap();
        assert_eq!(merged.learning_rate, 0.01);
        assert_eq!(base.learning_rate, 0.002);
        assert_eq!(merged.model_name, base.model_name);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = RunConfig::default();
        let mut b = RunConfig::default();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.seed = 1;
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_worker_timeout_is_opt_in() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(dir.path()), None, None).unwrap();
        assert_eq!(config.python.timeout_secs, None);

        std::fs::write(
            dir.path().join(WORKSPACE_CONFIG_FILE),
            "[python]\ntimeout_secs = 600\n",
        )
        .unwrap();
        let config = load_config(Some(dir.path()), None, None).unwrap();
        assert_eq!(config.python.timeout_secs, Some(600));
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = AppConfig::default();
        let rendered = config.to_toml().unwrap();
        let parsed: AppConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.run, config.run);
    }
}
