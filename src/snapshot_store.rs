use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};

/// The directory annotated snapshots live in for the lifetime of the process.
///
/// Acquired at startup and emptied on every exit path: explicitly through
/// [`SnapshotDir::release`] during a graceful shutdown, or on drop otherwise.
#[derive(Debug)]
pub struct SnapshotDir {
    path: PathBuf,
    released: bool,
}

impl SnapshotDir {
    /// Create the directory if needed and remove snapshots left by a previous run.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or listed.
    pub fn acquire(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        fs::create_dir_all(&path)?;
        let dir = Self {
            path,
            released: false,
        };

        let stale = dir.clear()?;
        if stale > 0 {
            info!(
                "Removed {} stale snapshot(s) from {}",
                stale,
                dir.path.display()
            );
        }
        Ok(dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete every file in the directory, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error hit while listing or deleting.
    pub fn clear(&self) -> io::Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Empty the directory as part of a graceful shutdown.
    ///
    /// # Errors
    ///
    /// See [`SnapshotDir::clear`].
    pub fn release(mut self) -> io::Result<usize> {
        self.released = true;
        self.clear()
    }
}

impl Drop for SnapshotDir {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.clear() {
            warn!(
                "Failed to empty snapshot directory {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

/// Builds externally reachable URLs for stored snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotLinks {
    base_url: String,
    mount: String,
}

impl SnapshotLinks {
    /// # Arguments
    ///
    /// * `base_url` - Externally reachable host (e.g., "http://192.168.1.20:8080")
    /// * `mount` - Path the snapshot server serves files under (e.g., "/snapshots")
    pub fn new(base_url: &str, mount: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            mount: normalize_mount(mount),
        }
    }

    pub fn url_for(&self, file_name: &str) -> String {
        format!("{}{}/{}", self.base_url, self.mount, file_name)
    }
}

/// `"snapshots/"` and `"/snapshots"` both become `"/snapshots"`; an empty mount becomes `""`.
pub fn normalize_mount(mount: &str) -> String {
    let trimmed = mount.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// True for a bare file name that cannot escape the snapshot directory.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('.') && !name.contains(['/', '\\'])
}
