//! Generation request value object and its defaults.
//!
//! A [`GenerationRequest`] is built once per operator submission, consumed
//! by the orchestrator and then discarded. Numeric fields default to the
//! values the operator form starts with, so a JSON body only needs to carry
//! the prompt and the two uploads.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Form defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_GUIDANCE_SCALE: f64 = 4.5;
pub const DEFAULT_AUDIO_SCALE: f64 = 3.0;
pub const DEFAULT_NUM_STEPS: u32 = 25;
/// `0.0` disables the cache entirely.
pub const DEFAULT_TEA_CACHE_THRESH: f64 = 0.0;
pub const DEFAULT_MAX_TOKENS: u32 = 30_000;
pub const DEFAULT_OVERLAP_FRAME: u32 = 13;
pub const DEFAULT_SP_SIZE: u32 = 1;

// ---------------------------------------------------------------------------
// Model size
// ---------------------------------------------------------------------------

pub const MODEL_SIZE_LARGE: &str = "14B";
pub const MODEL_SIZE_SMALL: &str = "1.3B";

/// Which model variant the worker loads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelSize {
    #[default]
    #[serde(rename = "14B")]
    Large,
    #[serde(rename = "1.3B")]
    Small,
}

impl ModelSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Large => MODEL_SIZE_LARGE,
            Self::Small => MODEL_SIZE_SMALL,
        }
    }

    /// File name of the worker configuration for this size.
    pub fn config_file_name(&self) -> &'static str {
        match self {
            Self::Large => "inference.yaml",
            Self::Small => "inference_1.3B.yaml",
        }
    }
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// One operator submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Free text, conventionally `[first frame] - [behavior] - [background]`.
    #[serde(default)]
    pub prompt: String,
    /// Source image. `None` means nothing was uploaded.
    #[serde(default)]
    pub image: Option<PathBuf>,
    /// Source audio clip. `None` means nothing was uploaded.
    #[serde(default)]
    pub audio: Option<PathBuf>,
    #[serde(default)]
    pub model_size: ModelSize,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f64,
    #[serde(default = "default_audio_scale")]
    pub audio_scale: f64,
    #[serde(default = "default_num_steps")]
    pub num_steps: u32,
    #[serde(default)]
    pub tea_cache_thresh: f64,
    /// Sharded-parameter memory optimization (FSDP).
    #[serde(default)]
    pub use_fsdp: bool,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Must satisfy `overlap_frame % 4 == 1`.
    #[serde(default = "default_overlap_frame")]
    pub overlap_frame: u32,
    /// Sequence-parallel degree; `1` runs a single local worker.
    #[serde(default = "default_sp_size")]
    pub sp_size: u32,
    #[serde(default)]
    pub use_gradient_checkpointing: bool,
}

impl GenerationRequest {
    /// A request with form defaults for every knob.
    pub fn new(
        prompt: impl Into<String>,
        image: Option<PathBuf>,
        audio: Option<PathBuf>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            image,
            audio,
            model_size: ModelSize::default(),
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
            audio_scale: DEFAULT_AUDIO_SCALE,
            num_steps: DEFAULT_NUM_STEPS,
            tea_cache_thresh: DEFAULT_TEA_CACHE_THRESH,
            use_fsdp: false,
            max_tokens: DEFAULT_MAX_TOKENS,
            overlap_frame: DEFAULT_OVERLAP_FRAME,
            sp_size: DEFAULT_SP_SIZE,
            use_gradient_checkpointing: false,
        }
    }
}

fn default_guidance_scale() -> f64 {
    DEFAULT_GUIDANCE_SCALE
}

fn default_audio_scale() -> f64 {
    DEFAULT_AUDIO_SCALE
}

fn default_num_steps() -> u32 {
    DEFAULT_NUM_STEPS
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_overlap_frame() -> u32 {
    DEFAULT_OVERLAP_FRAME
}

fn default_sp_size() -> u32 {
    DEFAULT_SP_SIZE
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
