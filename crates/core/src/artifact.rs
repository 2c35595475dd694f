//! Output artifact discovery and persistence.
//!
//! The worker writes its video somewhere below a shared output root, in a
//! run-specific subdirectory it chooses itself. The resolver scans the whole
//! tree and takes the most recently created video. Older files from prior
//! runs may sit next to it, and two overlapping runs can race each other;
//! recency is a heuristic, not a guarantee.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::error::GenerationError;

/// Extension of worker output files (matched case-insensitively).
pub const VIDEO_EXTENSION: &str = "mp4";
/// Prefix of persisted copies, distinguishing them from raw worker output.
pub const PERSISTED_PREFIX: &str = "generated_";

/// A video file found under the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub created: SystemTime,
}

/// The selected artifact and its persisted copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    /// Raw worker output, left in place.
    pub source: PathBuf,
    /// Copy under the persistent root.
    pub persisted: PathBuf,
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(VIDEO_EXTENSION))
}

/// Creation time, or modification time where the filesystem records no
/// birth time.
fn creation_time(metadata: &std::fs::Metadata) -> std::io::Result<SystemTime> {
    metadata.created().or_else(|_| metadata.modified())
}

/// Every video file below `root`, at any depth.
///
/// Symlinks to video files count; symlinked directories are not descended
/// into. Entries that cannot be read (a stale run dir without permissions,
/// a file removed mid-scan) are logged and skipped.
pub fn discover(root: &Path) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(
                    root = %root.display(),
                    error = %e,
                    "Skipping unreadable output entry",
                );
                continue;
            }
        };

        if entry.file_type().is_dir() || !is_video(entry.path()) {
            continue;
        }

        // Follows symlinks.
        let created = match std::fs::metadata(entry.path()) {
            Ok(metadata) if metadata.is_file() => creation_time(&metadata),
            Ok(_) => continue,
            Err(e) => Err(e),
        };
        let created = match created {
            Ok(created) => created,
            Err(e) => {
                tracing::warn!(
                    path = %entry.path().display(),
                    error = %e,
                    "Skipping unreadable video",
                );
                continue;
            }
        };

        candidates.push(Candidate {
            path: entry.into_path(),
            created,
        });
    }

    candidates
}

/// The candidate with the latest creation time.
///
/// Ties go to the lexicographically greatest path so the choice is
/// deterministic.
pub fn select_latest(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates
        .iter()
        .max_by(|a, b| a.created.cmp(&b.created).then_with(|| a.path.cmp(&b.path)))
}

/// Destination of the persisted copy of `source`.
pub fn persisted_path(source: &Path, persist_root: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    persist_root.join(format!("{PERSISTED_PREFIX}{name}"))
}

/// Find the newest video under `output_root` and copy it into
/// `persist_root`.
pub fn resolve(output_root: &Path, persist_root: &Path) -> Result<ResolvedArtifact, GenerationError> {
    if !output_root.is_dir() {
        return Err(GenerationError::NoOutputArea {
            path: output_root.to_path_buf(),
        });
    }

    let candidates = discover(output_root);
    let latest = select_latest(&candidates).ok_or_else(|| GenerationError::NoArtifact {
        path: output_root.to_path_buf(),
    })?;

    std::fs::create_dir_all(persist_root)
        .map_err(|e| GenerationError::io("failed to create", persist_root, e))?;

    let persisted = persisted_path(&latest.path, persist_root);
    std::fs::copy(&latest.path, &persisted)
        .map_err(|e| GenerationError::io("failed to persist", &latest.path, e))?;

    tracing::info!(
        candidates = candidates.len(),
        source = %latest.path.display(),
        persisted = %persisted.display(),
        "Resolved output video",
    );

    Ok(ResolvedArtifact {
        source: latest.path.clone(),
        persisted,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
