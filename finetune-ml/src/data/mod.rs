//! Data pipeline: dataset fetch, labeling and the seeded split.

pub mod dataset;
pub mod labels;
pub mod loader;
pub mod split;
pub mod transforms;

pub use dataset::{DatasetProvider, LocalDataset, RemoteDataset, get_image_files};
pub use labels::{LabelPattern, Vocab};
pub use loader::{DataLoader, Item};
pub use split::{RandomSplitter, Split, VALID_PCT};
pub use transforms::{Resize, ResizeMethod};

use crate::config::RunConfig;
use crate::error::{FinetuneError, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// The inputs of pipeline construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineParams {
    pub batch_size: usize,
    pub img_size: u32,
    pub seed: u64,
    pub resize_method: String,
}

impl From<&RunConfig> for PipelineParams {
    fn from(config: &RunConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            img_size: config.img_size,
            seed: config.seed,
            resize_method: config.resize_method.clone(),
        }
    }
}

/// Train and validation loaders over one labeled corpus.
#[derive(Debug, Clone)]
pub struct DataLoaders {
    pub root: PathBuf,
    pub vocab: Vocab,
    pub train: DataLoader,
    pub valid: DataLoader,
    pub resize: Resize,
    pub seed: u64,
}

impl DataLoaders {
    /// Label items from file names under `images_dir` and split them by seed.
    pub fn from_name_re(
        root: &Path,
        images_dir: &Path,
        pattern: &LabelPattern,
        params: &PipelineParams,
    ) -> Result<Self> {
        let method: ResizeMethod = params.resize_method.parse()?;
        let resize = Resize::new(params.img_size, method)?;

        let files = get_image_files(images_dir)?;
        if files.is_empty() {
            return Err(FinetuneError::dataset(format!(
                "no images found under {}",
                images_dir.display()
            )));
        }

        let labels = files
            .iter()
            .map(|f| pattern.label_for(f))
            .collect::<Result<Vec<_>>>()?;
        let vocab = Vocab::from_labels(labels.iter().map(String::as_str));

        let split = RandomSplitter::new(params.seed).split(files.len());
        let to_items = |indices: &[usize]| -> Vec<Item> {
            indices
                .iter()
                .map(|&i| Item {
                    path: files[i].clone(),
                    label: vocab.index_of(&labels[i]).unwrap_or_default(),
                })
                .collect()
        };
        let train = DataLoader::train(to_items(&split.train), params.batch_size)?;
        let valid = DataLoader::valid(to_items(&split.valid), params.batch_size)?;

        info!(
            images = files.len(),
            train = train.items().len(),
            valid = valid.items().len(),
            classes = vocab.len(),
            "Built data pipeline"
        );

        Ok(Self {
            root: root.to_path_buf(),
            train,
            valid,
            vocab,
            resize,
            seed: params.seed,
        })
    }
}

/// Fetch the Pets corpus through `provider` and build its loaders.
pub async fn get_pets(
    provider: &dyn DatasetProvider,
    images_subdir: &str,
    params: &PipelineParams,
) -> Result<DataLoaders> {
    let root = provider.fetch().await?;
    let images = root.join(images_subdir);
    DataLoaders::from_name_re(&root, &images, &LabelPattern::pets(), params)
}
