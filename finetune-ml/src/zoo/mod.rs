//! Model catalogs — the primary timm source and the alternate torchvision catalog.

pub mod torchvision;

pub use torchvision::TorchvisionArch;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which catalog a model name is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    /// Names are passed through to timm, which resolves them itself.
    Timm,
    /// Names must be one of the known torchvision constructors.
    Torchvision,
}

impl ModelSource {
    /// Group tag attached to tracking sessions.
    pub fn group(&self) -> &'static str {
        match self {
            Self::Timm => "timm",
            Self::Torchvision => "torchvision",
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.group())
    }
}

/// A model reference ready to be handed to a trainer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "name", rename_all = "snake_case")]
pub enum ModelSpec {
    /// Opaque timm architecture name.
    Timm(String),
    /// A resolved torchvision constructor.
    Torchvision(TorchvisionArch),
}

impl ModelSpec {
    /// Resolve `name` against `source`.
    ///
    /// Timm names are not checked here; the trainer reports unknown ones.
    pub fn resolve(source: ModelSource, name: &str) -> Result<Self> {
        match source {
            ModelSource::Timm => Ok(Self::Timm(name.to_string())),
            ModelSource::Torchvision => Ok(Self::Torchvision(name.parse()?)),
        }
    }

    pub fn source(&self) -> ModelSource {
        match self {
            Self::Timm(_) => ModelSource::Timm,
            Self::Torchvision(_) => ModelSource::Torchvision,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Timm(name) => name,
            Self::Torchvision(arch) => arch.name(),
        }
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source(), self.name())
    }
}
