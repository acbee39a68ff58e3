//! Working directory arena for short-lived conversion artifacts.
//!
//! Every intermediate file of a conversion (stripes, joined stripes, resized
//! sources, pyramid levels) is named by the [`Workspace`] and tracked until it
//! is discarded. Names carry a per-conversion prefix so several images can be
//! converted against the same directory at once without collisions.
//!
//! The arena is not a cache: nothing is ever looked up by content, and a
//! failed conversion purges whatever is still tracked.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::TilingError;

/// Process-wide sequence number so prefixes never repeat within a process.
static NEXT_WORKSPACE_ID: AtomicU64 = AtomicU64::new(0);

/// Extension of intermediate raster files.
pub const ARTIFACT_EXTENSION: &str = "tif";

/// Arena of uniquely named intermediate files for one conversion.
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    prefix: String,
    live: Mutex<BTreeSet<PathBuf>>,
}

impl Workspace {
    /// Open an arena in `dir` for the image named `stem`.
    ///
    /// Creates the directory when it does not exist yet.
    pub fn open(dir: impl Into<PathBuf>, stem: &str) -> Result<Self, TilingError> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| TilingError::io(&dir, e))?;
        }

        let id = NEXT_WORKSPACE_ID.fetch_add(1, Ordering::Relaxed);
        let prefix = format!("{}-{}-{}", sanitize(stem), std::process::id(), id);
        debug!(dir = %dir.display(), prefix = %prefix, "Opened workspace");

        Ok(Workspace {
            dir,
            prefix,
            live: Mutex::new(BTreeSet::new()),
        })
    }

    /// Directory holding the artifacts.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Unique prefix of this conversion's artifacts.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Path of an artifact named `label`, without tracking it.
    pub fn artifact_path(&self, label: &str) -> PathBuf {
        self.dir
            .join(format!("{}-{}.{}", self.prefix, label, ARTIFACT_EXTENSION))
    }

    /// Path pattern (`%d` placeholder) for a numbered artifact series.
    pub fn artifact_pattern(&self, label: &str) -> PathBuf {
        self.dir
            .join(format!("{}-{}-%d.{}", self.prefix, label, ARTIFACT_EXTENSION))
    }

    /// Path pattern for freshly cut tiles awaiting their final address.
    pub fn tile_pattern(&self, label: &str, extension: &str) -> PathBuf {
        self.dir
            .join(format!("{}-{}-tile-%d.{}", self.prefix, label, extension))
    }

    /// Start tracking an artifact.
    pub fn track(&self, path: impl Into<PathBuf>) {
        self.live_set().insert(path.into());
    }

    /// Whether an artifact is still tracked.
    pub fn is_tracked(&self, path: &Path) -> bool {
        self.live_set().contains(path)
    }

    /// Number of tracked artifacts.
    pub fn live_count(&self) -> usize {
        self.live_set().len()
    }

    /// Stop tracking an artifact that was moved out of the workspace.
    pub fn forget(&self, path: &Path) {
        self.live_set().remove(path);
    }

    /// Delete a tracked artifact.
    ///
    /// The artifact is forgotten even if deletion fails, so a later
    /// [`Workspace::purge`] does not retry it.
    pub fn discard(&self, path: &Path) -> Result<(), TilingError> {
        self.live_set().remove(path);
        fs::remove_file(path).map_err(|e| TilingError::CleanupFailure {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Best-effort deletion of everything still tracked.
    ///
    /// Returns the number of artifacts that could not be deleted.
    pub fn purge(&self) -> usize {
        let paths: Vec<PathBuf> = std::mem::take(&mut *self.live_set()).into_iter().collect();
        let mut failures = 0;
        for path in paths {
            if path.exists() {
                if let Err(e) = fs::remove_file(&path) {
                    warn!("Could not delete {}: {}", path.display(), e);
                    failures += 1;
                }
            }
        }
        failures
    }

    fn live_set(&self) -> std::sync::MutexGuard<'_, BTreeSet<PathBuf>> {
        // A poisoned lock only means another thread panicked mid-insert; the
        // set itself is still usable.
        self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Replace characters that would break pattern substitution or paths.
fn sanitize(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}
