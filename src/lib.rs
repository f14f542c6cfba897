//! depwalk - an incremental build-dependency analyzer
//!
//! depwalk walks a source tree, dispatches each file to a handler chosen by
//! an ordered list of path patterns, and feeds the files handlers produce
//! back into the walk. Along the way C sources are marked, preprocessed and
//! analysed, and the symbols each file defines and needs are kept in a
//! SQLite store that build ordering and rebuild invalidation query later.

pub mod analysis;
pub mod cli;
pub mod domain;
pub mod source;
pub mod storage;
pub mod tasks;
pub mod tree;

pub use domain::{BuildGraph, ResolvedSymbol, SymbolInfo, SymbolRecord, SymbolRef, UnresolvedSymbol};
pub use storage::{Config, SymbolStore};
