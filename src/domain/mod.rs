//! Domain models for depwalk
//!
//! Symbol identities and the file-level build graph, without any I/O concerns.

mod graph;
mod symbol;

pub use graph::{BuildGraph, GraphError};
pub use symbol::{ResolvedSymbol, SymbolInfo, SymbolRecord, SymbolRef, UnresolvedSymbol};
