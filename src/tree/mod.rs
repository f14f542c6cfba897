//! # Tree walking and dispatch
//!
//! [`TreeDescent`] walks a source tree and offers each file to a
//! [`TreeVisitor`]. The [`SourceVisitor`] matches the file against an
//! ordered rule list, builds the task the winning rule names, hands it to
//! the task handler and returns the task's products, which the descent
//! then visits in turn.
//!
//! ```text
//! a.c ──c-pragma-injector──▶ a.prag.c ──c-preprocessor──▶ a.prag.i ──c-analyser──▶ store
//! ```

mod descent;
mod visitor;

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

pub use descent::TreeDescent;
pub use visitor::{SourceRule, SourceVisitor, TaskHandler};

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("Rule '{pattern}' matched {} but names unknown handler '{handler}'", file.display())]
    UnrecognizedHandler {
        file: PathBuf,
        pattern: String,
        handler: String,
    },

    #[error("Failed to read directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Receives each file found by a [`TreeDescent`]
pub trait TreeVisitor {
    /// Handles one file, returning further paths to visit
    fn visit(&mut self, candidate: &Path) -> Result<Vec<PathBuf>, WalkError>;
}

/// A task that failed during a walk
#[derive(Debug, Clone, Serialize)]
pub struct TaskFailure {
    pub file: PathBuf,
    pub handler: String,
    pub error: String,
}

/// What a walk did
#[derive(Debug, Clone, Default, Serialize)]
pub struct WalkSummary {
    /// Files offered to the visitor
    pub visited: usize,
    /// Tasks that ran successfully
    pub tasks: usize,
    /// Products fed back into the walk
    pub products: usize,
    pub failures: Vec<TaskFailure>,
    /// Products written by more than one source; the last write wins
    pub shadowed: Vec<PathBuf>,
}

impl WalkSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}
