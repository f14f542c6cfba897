//! # Task capability model
//!
//! Every file the walker dispatches becomes exactly one [`Task`]. A task
//! runs once, names the files it depends on ([`Task::prerequisites`]) and
//! the files it produces ([`Task::products`]); products are fed back into
//! the walk.
//!
//! | Handler | Variant | Effect |
//! |---------|---------|--------|
//! | `c-analyser` | [`Analyser`] | replaces the file's records in the store |
//! | `c-preprocessor` | [`CommandTask`] | runs `cpp -P` into the workspace |
//! | `c-pragma-injector` | [`TextModifier`] | copies the file with include markers |
//!
//! Handlers are a closed set: [`HandlerKind::from_name`] is the only way a
//! configured handler name becomes a task constructor.

mod analyser;
mod command;
mod modifier;

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::analysis::{CParser, SymbolParser};
use crate::source::{FileSource, PragmaInjector, SourceError, TextSource};
use crate::storage::StoreError;

pub use analyser::Analyser;
pub use command::{Command, CommandTask};
pub use modifier::TextModifier;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start {program}: {source}")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command exited with {status}: {command}{}", stderr_suffix(.stderr))]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\n{stderr}")
    }
}

/// Languages an [`Analyser`] can read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalyserKind {
    C,
}

impl AnalyserKind {
    pub fn parser(&self) -> Box<dyn SymbolParser> {
        match self {
            AnalyserKind::C => Box::new(CParser),
        }
    }
}

/// External commands a [`CommandTask`] can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    CPreProcessor,
}

impl CommandKind {
    /// Program run when none is configured
    pub fn default_program(&self) -> &'static str {
        match self {
            CommandKind::CPreProcessor => "cpp",
        }
    }

    /// Arguments placed before the configured flags
    pub fn leading_args(&self) -> &'static [&'static str] {
        match self {
            CommandKind::CPreProcessor => &["-P"],
        }
    }

    /// Extension of the single output file
    pub fn output_extension(&self) -> &'static str {
        match self {
            CommandKind::CPreProcessor => "i",
        }
    }

    /// Arguments that make quoted includes resolve next to `dir`, the
    /// directory of the file a workspace copy was made from
    pub fn source_dir_args(&self, dir: &Path) -> Vec<String> {
        match self {
            CommandKind::CPreProcessor => vec!["-iquote".to_string(), dir.display().to_string()],
        }
    }
}

/// Text rewrites a [`TextModifier`] can apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierKind {
    CPragmaInjector,
}

impl ModifierKind {
    /// Extension substituted into the product's file name
    pub fn output_extension(&self) -> &'static str {
        match self {
            ModifierKind::CPragmaInjector => "prag.c",
        }
    }

    /// Builds the decorated source chain that reads `upstream`
    pub fn decorate(&self, upstream: Box<dyn TextSource>) -> Box<dyn TextSource> {
        match self {
            ModifierKind::CPragmaInjector => Box::new(PragmaInjector::new(upstream)),
        }
    }
}

/// A handler a dispatch rule can name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    Analyser(AnalyserKind),
    Command(CommandKind),
    TextModifier(ModifierKind),
}

impl HandlerKind {
    pub const ALL: [HandlerKind; 3] = [
        HandlerKind::Analyser(AnalyserKind::C),
        HandlerKind::Command(CommandKind::CPreProcessor),
        HandlerKind::TextModifier(ModifierKind::CPragmaInjector),
    ];

    /// The name used for this handler in configuration
    pub fn name(&self) -> &'static str {
        match self {
            HandlerKind::Analyser(AnalyserKind::C) => "c-analyser",
            HandlerKind::Command(CommandKind::CPreProcessor) => "c-preprocessor",
            HandlerKind::TextModifier(ModifierKind::CPragmaInjector) => "c-pragma-injector",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One unit of per-file work
pub enum Task {
    Analyser(Analyser),
    Command(CommandTask),
    TextModifier(TextModifier),
}

impl Task {
    pub fn run(&mut self) -> Result<(), TaskError> {
        match self {
            Task::Analyser(task) => task.run(),
            Task::Command(task) => task.run(),
            Task::TextModifier(task) => task.run(),
        }
    }

    /// Files this task reads; empty for synthetic sources
    pub fn prerequisites(&self) -> Vec<PathBuf> {
        match self {
            Task::Analyser(task) => task.prerequisites(),
            Task::Command(task) => task.prerequisites(),
            Task::TextModifier(task) => task.prerequisites(),
        }
    }

    /// Files this task writes
    pub fn products(&self) -> Vec<PathBuf> {
        match self {
            Task::Analyser(_) => Vec::new(),
            Task::Command(task) => task.products(),
            Task::TextModifier(task) => task.products(),
        }
    }

    pub fn handler(&self) -> HandlerKind {
        match self {
            Task::Analyser(task) => HandlerKind::Analyser(task.kind()),
            Task::Command(task) => HandlerKind::Command(task.command().kind()),
            Task::TextModifier(task) => HandlerKind::TextModifier(task.kind()),
        }
    }
}

/// Opens a file for a task to read
pub fn file_source(path: impl Into<PathBuf>) -> Box<dyn TextSource> {
    Box::new(FileSource::new(path))
}
