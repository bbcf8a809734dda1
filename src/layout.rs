//! On-disk layout of the synchronized tree
//!
//! ```text
//! <root>/
//!   forks/<repo>/
//!   mirrors/<repo>/
//!   private/<repo>/
//!   public/<repo>/
//!   watched/<repo>/
//! ```
//!
//! All paths are composed explicitly from the root; nothing here (or anywhere
//! else in the crate) changes the process working directory.

use std::path::PathBuf;
use tracing::debug;

use crate::category::Category;
use crate::error::GhSyncError;

/// Whether a working copy is already present for a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalState {
    Present,
    Absent,
}

#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.root.join(category.as_str())
    }

    pub fn repo_dir(&self, category: Category, name: &str) -> PathBuf {
        self.category_dir(category).join(name)
    }

    /// Read the filesystem for the clone-vs-pull decision
    pub fn local_state(&self, category: Category, name: &str) -> LocalState {
        if self.repo_dir(category, name).is_dir() {
            LocalState::Present
        } else {
            LocalState::Absent
        }
    }

    /// Create the category directory if needed. An existing directory is
    /// success; anything else that prevents creation is an error.
    pub async fn ensure_category_dir(&self, category: Category) -> Result<PathBuf, GhSyncError> {
        let dir = self.category_dir(category);

        match tokio::fs::create_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && dir.is_dir() => {}
            Err(source) => return Err(GhSyncError::DirectoryCreation { path: dir, source }),
        }

        // create_dir_all is satisfied by any existing entry on some platforms
        if !dir.is_dir() {
            return Err(GhSyncError::DirectoryCreation {
                source: std::io::Error::new(std::io::ErrorKind::AlreadyExists, "not a directory"),
                path: dir,
            });
        }

        debug!("Category directory ready: {}", dir.display());
        Ok(dir)
    }
}
