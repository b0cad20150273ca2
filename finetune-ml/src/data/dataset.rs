//! Dataset providers — download, extract and cache benchmark corpora.

use crate::error::{FinetuneError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Marker written once an archive has been fully extracted.
const COMPLETE_MARKER: &str = ".finetune-complete";

/// Image extensions picked up by [`get_image_files`].
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "webp", "tif", "tiff"];

/// Resolves a dataset to a directory on local storage.
#[async_trait]
pub trait DatasetProvider: Send + Sync {
    /// Make the dataset available locally and return its root directory.
    ///
    /// Calling this again after a successful fetch must not re-download.
    async fn fetch(&self) -> Result<PathBuf>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// A `.tgz` archive downloaded over HTTP and extracted into a cache dir.
#[derive(Debug, Clone)]
pub struct RemoteDataset {
    pub url: String,
    pub cache_dir: PathBuf,
}

impl RemoteDataset {
    pub fn new(url: impl Into<String>, cache_dir: PathBuf) -> Self {
        Self {
            url: url.into(),
            cache_dir,
        }
    }

    /// Archive file name taken from the last URL segment.
    fn archive_name(&self) -> Result<&str> {
        self.url
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FinetuneError::dataset(format!("no file name in URL {}", self.url)))
    }

    /// Directory the archive extracts to (`oxford-iiit-pet.tgz` -> `oxford-iiit-pet`).
    pub fn extract_dir(&self) -> Result<PathBuf> {
        let name = self.archive_name()?;
        let stem = name
            .strip_suffix(".tgz")
            .or_else(|| name.strip_suffix(".tar.gz"))
            .unwrap_or(name);
        Ok(self.cache_dir.join(stem))
    }

    async fn download(&self, target: &Path) -> Result<()> {
        info!(url = %self.url, path = %target.display(), "Downloading dataset");
        let mut response = reqwest::get(&self.url).await?.error_for_status()?;

        let partial = target.with_extension("part");
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&partial, target).await?;
        debug!(bytes = written, "Download complete");
        Ok(())
    }
}

#[async_trait]
impl DatasetProvider for RemoteDataset {
    async fn fetch(&self) -> Result<PathBuf> {
        let dest = self.extract_dir()?;
        if dest.join(COMPLETE_MARKER).exists() {
            debug!(path = %dest.display(), "Dataset already cached");
            return Ok(dest);
        }

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let archive = self.cache_dir.join(self.archive_name()?);
        if !archive.exists() {
            self.download(&archive).await?;
        }

        info!(archive = %archive.display(), "Extracting dataset");
        let cache_dir = self.cache_dir.clone();
        let archive_path = archive.clone();
        tokio::task::spawn_blocking(move || extract_tgz(&archive_path, &cache_dir))
            .await
            .map_err(|e| FinetuneError::dataset(format!("extraction task failed: {e}")))??;

        if !dest.is_dir() {
            return Err(FinetuneError::dataset(format!(
                "archive {} did not contain {}",
                archive.display(),
                dest.display()
            )));
        }
        std::fs::write(dest.join(COMPLETE_MARKER), b"")?;
        Ok(dest)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Unpack a gzip-compressed tarball into `into`.
pub fn extract_tgz(archive: &Path, into: &Path) -> Result<()> {
    let file = std::fs::File::open(archive)?;
    let gz = flate2::read::GzDecoder::new(std::io::BufReader::new(file));
    tar::Archive::new(gz).unpack(into)?;
    Ok(())
}

/// A dataset that is already extracted on disk.
#[derive(Debug, Clone)]
pub struct LocalDataset {
    pub root: PathBuf,
}

impl LocalDataset {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl DatasetProvider for LocalDataset {
    async fn fetch(&self) -> Result<PathBuf> {
        if !self.root.is_dir() {
            return Err(FinetuneError::dataset(format!(
                "dataset directory {} does not exist",
                self.root.display()
            )));
        }
        Ok(self.root.clone())
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Recursively list image files under `dir`, sorted by path.
pub fn get_image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_image = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if is_image {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}
