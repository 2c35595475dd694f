//! Model-asset availability.
//!
//! The worker loads its weights from a shared model root. A request is
//! refused up front when any of the required model directories is absent,
//! rather than letting the worker fail minutes into a run.

use std::path::{Path, PathBuf};

/// Model directories that must exist under the model root.
pub const REQUIRED_MODEL_DIRS: &[&str] = &[
    "Wan2.1-T2V-14B",
    "OmniAvatar-14B",
    "Wan2.1-T2V-1.3B",
    "OmniAvatar-1.3B",
    "wav2vec2-base-960h",
];

/// Reports which required model assets cannot be resolved.
pub trait AssetCheck: Send + Sync {
    /// Paths of required assets that are absent. Empty when all are present.
    fn missing(&self) -> Vec<PathBuf>;
}

/// [`AssetCheck`] backed by plain filesystem existence checks.
#[derive(Debug, Clone)]
pub struct FsAssetCheck {
    required: Vec<PathBuf>,
}

impl FsAssetCheck {
    /// Check the standard model set under `model_root`.
    pub fn for_model_root(model_root: &Path) -> Self {
        Self {
            required: REQUIRED_MODEL_DIRS
                .iter()
                .map(|dir| model_root.join(dir))
                .collect(),
        }
    }

    /// Check an arbitrary list of paths.
    pub fn new(required: Vec<PathBuf>) -> Self {
        Self { required }
    }
}

impl AssetCheck for FsAssetCheck {
    fn missing(&self) -> Vec<PathBuf> {
        self.required
            .iter()
            .filter(|path| !path.exists())
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
