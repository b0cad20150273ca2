//! Label extraction from image file names.

use crate::error::{FinetuneError, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;

/// File-name pattern of the Pets images: the breed is the leading run of
/// letters, optionally joined to a second run by underscores.
pub const PETS_PATTERN: &str = r"(^[a-zA-Z]+_*[a-zA-Z]+)";

/// Extracts a class label from a file name with a regex capture group.
#[derive(Debug, Clone)]
pub struct LabelPattern {
    regex: Regex,
}

impl LabelPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| FinetuneError::invalid_input(format!("label pattern: {e}")))?;
        if regex.captures_len() < 2 {
            return Err(FinetuneError::invalid_input(format!(
                "label pattern '{pattern}' has no capture group"
            )));
        }
        Ok(Self { regex })
    }

    pub fn pets() -> Self {
        Self::new(PETS_PATTERN).expect("PETS_PATTERN is a valid single-group regex")
    }

    /// Label of the file at `path`, matched against its file name only.
    pub fn label_for(&self, path: &Path) -> Result<String> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| FinetuneError::Label(path.display().to_string()))?;
        self.regex
            .captures(name)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| FinetuneError::Label(name.to_string()))
    }
}

/// Sorted class vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocab {
    classes: Vec<String>,
}

impl Vocab {
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let set: BTreeSet<&str> = labels.into_iter().collect();
        Self {
            classes: set.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.classes.binary_search_by(|c| c.as_str().cmp(label)).ok()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
