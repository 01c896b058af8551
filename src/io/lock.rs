//! Exclusive process lock over a store directory.

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{Result, StoreError};

/// OS-level exclusive lock held for the lifetime of a store handle.
///
/// Guards the snapshot against a second process opening the same directory.
/// Released automatically when the handle drops.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = fs_err::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?
            .into_parts()
            .0;
        file.try_lock_exclusive().map_err(|err| {
            if err.kind() == ErrorKind::WouldBlock {
                StoreError::Lock {
                    reason: format!("{} is held by another process", path.display()),
                }
            } else {
                StoreError::Io(err)
            }
        })?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
