//! Backup-before-mutate handles for persisted artifacts.
//!
//! Every destructive change to a tracked file is preceded by a timestamped
//! copy. The handle is restored on verification failure and discarded once
//! the owning run has no further use for it.

use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// A backup of one file, taken before a destructive change.
///
/// If the file did not exist at creation time, restoring the handle removes
/// whatever the mutation wrote, returning the tree to its pre-run state.
#[derive(Debug)]
pub struct BackupHandle {
    original: PathBuf,
    backup: Option<PathBuf>,
}

impl BackupHandle {
    /// Snapshot the file at `path`. Must be called before the mutation.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let original = path.as_ref().to_path_buf();

        if !original.exists() {
            return Ok(Self {
                original,
                backup: None,
            });
        }

        let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
        let file_name = original
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string());

        let mut backup = original.with_file_name(format!("{}.bak-{}", file_name, stamp));
        let mut attempt = 1u32;
        while backup.exists() {
            backup = original.with_file_name(format!("{}.bak-{}.{}", file_name, stamp, attempt));
            attempt += 1;
        }

        fs::copy(&original, &backup)?;

        Ok(Self {
            original,
            backup: Some(backup),
        })
    }

    /// Path of the file this handle protects.
    pub fn original(&self) -> &Path {
        &self.original
    }

    /// Put the original bytes back (or remove the file if it did not exist
    /// when the backup was taken). The backup copy is consumed.
    pub fn restore(&self) -> Result<()> {
        match &self.backup {
            Some(backup) => {
                fs::copy(backup, &self.original)?;
                fs::remove_file(backup)?;
            }
            None => {
                if self.original.exists() {
                    fs::remove_file(&self.original)?;
                }
            }
        }
        Ok(())
    }

    /// Drop the backup copy after the mutation has been verified.
    pub fn discard(self) -> Result<()> {
        if let Some(backup) = self.backup {
            if backup.exists() {
                fs::remove_file(backup)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_restore_returns_original_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Info.plist");
        fs::write(&path, b"before").unwrap();

        let handle = BackupHandle::create(&path).unwrap();
        fs::write(&path, b"after").unwrap();

        handle.restore().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"before");
    }

    #[test]
    fn test_restore_removes_file_created_after_backup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Contents.json");

        let handle = BackupHandle::create(&path).unwrap();
        fs::write(&path, b"new artifact").unwrap();

        handle.restore().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_discard_removes_backup_copy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Info.plist");
        fs::write(&path, b"content").unwrap();

        let handle = BackupHandle::create(&path).unwrap();
        handle.discard().unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".bak-"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
