//! Iterative depth-first descent

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use super::{TreeVisitor, WalkError};

/// Walks a directory tree, offering every file to a visitor
///
/// The frontier is a stack. Directory children are pushed in sorted order
/// and popped ascending; paths a visitor returns are pushed the same way,
/// so a file's products are visited before its remaining siblings.
#[derive(Debug, Clone)]
pub struct TreeDescent {
    root: PathBuf,
    excluded: Vec<PathBuf>,
}

impl TreeDescent {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            excluded: Vec::new(),
        }
    }

    /// Skips a directory if the descent reaches it
    pub fn exclude(mut self, dir: &Path) -> Self {
        self.excluded.push(dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf()));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Visits every file under the root, and every product the visitor
    /// returns; the number of candidates offered is returned
    pub fn descend(&self, visitor: &mut dyn TreeVisitor) -> Result<usize, WalkError> {
        let mut frontier = vec![self.root.clone()];
        let mut offered = 0;

        while let Some(candidate) = frontier.pop() {
            if candidate.is_dir() {
                if self.is_excluded(&candidate) {
                    debug!(dir = %candidate.display(), "Skipping excluded directory");
                    continue;
                }
                let mut children = children(&candidate)?;
                children.sort();
                trace!(dir = %candidate.display(), children = children.len(), "Expanding");
                frontier.extend(children.into_iter().rev());
                continue;
            }

            offered += 1;
            let products = visitor.visit(&candidate)?;
            frontier.extend(products.into_iter().rev());
        }

        Ok(offered)
    }

    fn is_excluded(&self, dir: &Path) -> bool {
        if self.excluded.is_empty() {
            return false;
        }
        dir.canonicalize()
            .map(|dir| self.excluded.contains(&dir))
            .unwrap_or(false)
    }
}

/// Entries of a directory; symlinked directories are not followed
fn children(dir: &Path) -> Result<Vec<PathBuf>, WalkError> {
    let read_error = |source| WalkError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut children = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_error)? {
        let entry = entry.map_err(read_error)?;
        let file_type = entry.file_type().map_err(read_error)?;
        let path = entry.path();

        if file_type.is_symlink() && path.is_dir() {
            debug!(path = %path.display(), "Not following directory symlink");
            continue;
        }
        children.push(path);
    }
    Ok(children)
}
