//! Item transforms handed to the training backend.

use crate::error::{FinetuneError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Strategy for mapping a source image onto an `size x size` square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMethod {
    /// Cut a square out of the image, then scale it.
    Crop,
    /// Scale to fit inside the square and pad the borders.
    Pad,
    /// Stretch to the square, ignoring aspect ratio.
    Squish,
}

impl FromStr for ResizeMethod {
    type Err = FinetuneError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "crop" => Ok(Self::Crop),
            "pad" => Ok(Self::Pad),
            "squish" => Ok(Self::Squish),
            other => Err(FinetuneError::invalid_input(format!(
                "unknown resize method '{other}' (expected crop, pad or squish)"
            ))),
        }
    }
}

impl fmt::Display for ResizeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crop => write!(f, "crop"),
            Self::Pad => write!(f, "pad"),
            Self::Squish => write!(f, "squish"),
        }
    }
}

/// Per-item resize, applied by the backend when it loads a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resize {
    pub size: u32,
    pub method: ResizeMethod,
}

impl Resize {
    /// A resize to a non-empty square.
    pub fn new(size: u32, method: ResizeMethod) -> Result<Self> {
        if size == 0 {
            return Err(FinetuneError::invalid_input("img_size must be at least 1"));
        }
        Ok(Self { size, method })
    }
}
