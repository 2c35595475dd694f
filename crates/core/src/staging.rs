//! Per-request staging area.
//!
//! Holds copies of the uploaded inputs and the request descriptor the worker
//! reads via `--input_file`. The directory is removed when the
//! [`StagingArea`] is dropped, so every exit path of a job releases it.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::GenerationError;

/// Name of the request descriptor inside the staging directory.
pub const DESCRIPTOR_FILE: &str = "input.txt";
/// Separator between descriptor fields.
pub const DESCRIPTOR_DELIMITER: &str = "@@";

const STAGING_PREFIX: &str = "avatar-job-";
const IMAGE_STEM: &str = "input_image";
const AUDIO_STEM: &str = "input_audio";
const DEFAULT_IMAGE_EXT: &str = "jpg";
const DEFAULT_AUDIO_EXT: &str = "wav";

/// Render the one-line descriptor: `prompt@@image@@audio`.
///
/// Line breaks in the prompt are flattened to spaces; the worker reads the
/// file line by line.
pub fn descriptor_line(prompt: &str, image: &Path, audio: &Path) -> String {
    let prompt = prompt.replace(['\r', '\n'], " ");
    format!(
        "{prompt}{DESCRIPTOR_DELIMITER}{}{DESCRIPTOR_DELIMITER}{}",
        image.display(),
        audio.display()
    )
}

/// Temporary directory scoped to one generation request.
#[derive(Debug)]
pub struct StagingArea {
    /// Removed on drop.
    _dir: TempDir,
    root: PathBuf,
    image: PathBuf,
    audio: PathBuf,
    descriptor: PathBuf,
}

impl StagingArea {
    /// Create the staging directory under `parent` (system temp dir when
    /// `None`), copy both inputs into it and write the descriptor.
    pub async fn prepare(
        parent: Option<&Path>,
        prompt: &str,
        image: &Path,
        audio: &Path,
    ) -> Result<Self, GenerationError> {
        if let Some(parent) = parent {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| GenerationError::io("failed to create staging root", parent, e))?;
        }

        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);
        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|e| GenerationError::Unexpected(format!("failed to create staging area: {e}")))?;

        // The descriptor must carry absolute paths.
        let root = dir
            .path()
            .canonicalize()
            .map_err(|e| GenerationError::io("failed to resolve", dir.path(), e))?;

        let staged_image = root.join(staged_name(image, IMAGE_STEM, DEFAULT_IMAGE_EXT));
        let staged_audio = root.join(staged_name(audio, AUDIO_STEM, DEFAULT_AUDIO_EXT));
        copy_input(image, &staged_image).await?;
        copy_input(audio, &staged_audio).await?;

        let descriptor = root.join(DESCRIPTOR_FILE);
        tokio::fs::write(
            &descriptor,
            descriptor_line(prompt, &staged_image, &staged_audio),
        )
        .await
        .map_err(|e| GenerationError::io("failed to write", &descriptor, e))?;

        Ok(Self {
            _dir: dir,
            root,
            image: staged_image,
            audio: staged_audio,
            descriptor,
        })
    }

    /// Absolute path of the staging directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn image(&self) -> &Path {
        &self.image
    }

    pub fn audio(&self) -> &Path {
        &self.audio
    }

    /// Path passed to the worker as `--input_file`.
    pub fn descriptor(&self) -> &Path {
        &self.descriptor
    }
}

/// `<stem>.<source extension>`, falling back to `default_ext`.
fn staged_name(source: &Path, stem: &str, default_ext: &str) -> String {
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .unwrap_or(default_ext);
    format!("{stem}.{ext}")
}

async fn copy_input(source: &Path, dest: &Path) -> Result<(), GenerationError> {
    tokio::fs::copy(source, dest)
        .await
        .map(|_| ())
        .map_err(|e| GenerationError::io("failed to stage", source, e))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
