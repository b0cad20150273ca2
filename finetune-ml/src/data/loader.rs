//! Batched views over labeled image items.
//!
//! Items are only listed here. Decoding and resizing happen in the backend.

use crate::error::{FinetuneError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One labeled image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub path: PathBuf,
    pub label: usize,
}

/// One side of a split, cut into batches of `batch_size`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataLoader {
    items: Vec<Item>,
    batch_size: usize,
    drop_last: bool,
}

impl DataLoader {
    /// Training side: the last partial batch is dropped.
    pub fn train(items: Vec<Item>, batch_size: usize) -> Result<Self> {
        Self::build(items, batch_size, true)
    }

    /// Validation side: every item is visited.
    pub fn valid(items: Vec<Item>, batch_size: usize) -> Result<Self> {
        Self::build(items, batch_size, false)
    }

    fn build(items: Vec<Item>, batch_size: usize, drop_last: bool) -> Result<Self> {
        if batch_size == 0 {
            return Err(FinetuneError::invalid_input("batch_size must be at least 1"));
        }
        Ok(Self {
            items,
            batch_size,
            drop_last,
        })
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches per epoch.
    pub fn len(&self) -> usize {
        let n = self.items.len();
        if self.drop_last {
            n / self.batch_size
        } else {
            n.div_ceil(self.batch_size)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
