//! Workspace management
//!
//! The workspace holds everything a walk writes: task products, the
//! symbol store and a lock file that keeps two walks apart.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::debug;

use super::{Config, SymbolStore};

const LOCK_FILE: &str = ".depwalk.lock";

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Failed to create workspace {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Workspace {} is in use by another walk", path.display())]
    Locked { path: PathBuf },

    #[error("Failed to lock workspace {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A workspace directory and the store inside it
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    database: PathBuf,
    max_identifier_length: usize,
}

impl Workspace {
    /// Opens (creating if needed) the workspace at `dir`
    pub fn open(dir: &Path, config: &Config) -> Result<Self, WorkspaceError> {
        let create_error = |source| WorkspaceError::Create {
            path: dir.to_path_buf(),
            source,
        };
        fs::create_dir_all(dir).map_err(create_error)?;
        let root = dir.canonicalize().map_err(create_error)?;

        Ok(Self {
            database: config.database_path(&root),
            max_identifier_length: config.max_identifier_length,
            root,
        })
    }

    /// Absolute workspace directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> &Path {
        &self.database
    }

    pub fn open_store(&self) -> Result<SymbolStore, super::StoreError> {
        SymbolStore::open(&self.database, self.max_identifier_length)
    }

    /// Takes the workspace lock without waiting
    ///
    /// The lock is held until the returned guard is dropped.
    pub fn lock(&self) -> Result<WorkspaceLock, WorkspaceError> {
        let path = self.root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| WorkspaceError::Lock {
                path: path.clone(),
                source,
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(lock = %path.display(), "Workspace locked");
                Ok(WorkspaceLock { file, path })
            }
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                Err(WorkspaceError::Locked { path: self.root.clone() })
            }
            Err(source) => Err(WorkspaceError::Lock { path, source }),
        }
    }
}

/// Exclusive hold on a workspace
#[derive(Debug)]
pub struct WorkspaceLock {
    file: File,
    path: PathBuf,
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            debug!(lock = %self.path.display(), error = %err, "Failed to release workspace lock");
        }
    }
}
