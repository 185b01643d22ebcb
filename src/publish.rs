//! Authorized-Keys Publisher.
//!
//! The target file is replaced wholesale on every publish. Keys added to it
//! by hand are lost on the next cycle.
//!
//! Publishing renames a fresh file over the target, so the target gets a new
//! inode owned by the user running keysync. When running as root against
//! another account's `~/.ssh/authorized_keys`, the file ends up owned by root
//! and sshd's `StrictModes` may then ignore it. Run as the account whose keys
//! are managed. A symlink at the target is replaced rather than followed.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

/// A publish failure. Always fatal to the daemon.
#[derive(Error, Debug)]
pub enum PublishError {
    /// Could not create the staging file next to the target.
    #[error("failed to create temporary file in {dir}: {source}")]
    CreateTemp {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write or flush the staged contents.
    #[error("failed to write keys for {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not move the staged file over the target.
    #[error("failed to replace {path}: {source}")]
    Replace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Replaces the file at `path` with `keys`, owner read/write only.
///
/// The contents are staged in a sibling temporary file and renamed into
/// place, so readers see either the old file or the new one. On any error
/// the temporary file is removed and the target is left untouched.
pub fn publish(path: &Path, keys: &[u8]) -> Result<(), PublishError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::with_prefix_in(".keysync-", dir).map_err(|source| {
        PublishError::CreateTemp {
            dir: dir.to_path_buf(),
            source,
        }
    })?;
    debug!(tmp = %tmp.path().display(), "Staging authorized keys");

    let write_err = |source| PublishError::Write {
        path: path.to_path_buf(),
        source,
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(write_err)?;
    }

    tmp.write_all(keys).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;

    tmp.persist(path).map_err(|e| PublishError::Replace {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    Ok(())
}
