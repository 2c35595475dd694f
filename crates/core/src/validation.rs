//! Request validation.
//!
//! Pure checks run before any staging or process launch. Structural checks
//! (uploads present, parameters in range) come first; the model-asset check
//! touches the filesystem and runs last.

use crate::assets::AssetCheck;
use crate::error::{GenerationError, InputKind, ParameterError};
use crate::request::GenerationRequest;

/// Overlap frames must be congruent to this value modulo [`OVERLAP_FRAME_MODULUS`].
pub const OVERLAP_FRAME_RESIDUE: u32 = 1;
pub const OVERLAP_FRAME_MODULUS: u32 = 4;

/// Whether `value` is an accepted overlap-frame count (1, 5, 9, 13, ...).
pub fn is_valid_overlap_frame(value: u32) -> bool {
    value % OVERLAP_FRAME_MODULUS == OVERLAP_FRAME_RESIDUE
}

/// Validate a request against structural and domain constraints.
pub fn validate(
    request: &GenerationRequest,
    assets: &dyn AssetCheck,
) -> Result<(), GenerationError> {
    validate_inputs(request)?;
    validate_parameters(request)?;

    let missing = assets.missing();
    if !missing.is_empty() {
        return Err(GenerationError::MissingDependency { missing });
    }

    Ok(())
}

/// Both uploads must be present.
pub fn validate_inputs(request: &GenerationRequest) -> Result<(), GenerationError> {
    if request.image.is_none() {
        return Err(GenerationError::MissingInput(InputKind::Image));
    }
    if request.audio.is_none() {
        return Err(GenerationError::MissingInput(InputKind::Audio));
    }
    Ok(())
}

/// Numeric knobs must be inside their accepted domains.
pub fn validate_parameters(request: &GenerationRequest) -> Result<(), ParameterError> {
    if !is_valid_overlap_frame(request.overlap_frame) {
        return Err(ParameterError::OverlapFrame {
            value: request.overlap_frame,
        });
    }

    for (name, value) in [
        ("sp_size", request.sp_size),
        ("num_steps", request.num_steps),
        ("max_tokens", request.max_tokens),
    ] {
        if value < 1 {
            return Err(ParameterError::BelowOne { name, value });
        }
    }

    for (name, value) in [
        ("guidance_scale", request.guidance_scale),
        ("audio_scale", request.audio_scale),
        ("tea_cache_thresh", request.tea_cache_thresh),
    ] {
        if !value.is_finite() {
            return Err(ParameterError::NotFinite { name, value });
        }
    }

    if request.tea_cache_thresh < 0.0 {
        return Err(ParameterError::Negative {
            name: "tea_cache_thresh",
            value: request.tea_cache_thresh,
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
