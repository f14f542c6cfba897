//! Symbol identities and records
//!
//! A symbol is identified by the pair (name, defining file). The same name
//! may legitimately be defined in more than one file, so lookups that know
//! the file never collapse to the name alone. A prerequisite whose defining
//! file is not known yet is an [`UnresolvedSymbol`].

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// A symbol fully qualified by its name and the file that defines it
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ResolvedSymbol {
    pub name: String,
    pub file: PathBuf,
}

impl ResolvedSymbol {
    pub fn new(name: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

impl fmt::Display for ResolvedSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.file.display())
    }
}

/// A symbol known only by name; it may be external or simply not analysed yet
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct UnresolvedSymbol {
    pub name: String,
}

impl UnresolvedSymbol {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for UnresolvedSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (unresolved)", self.name)
    }
}

/// A reference to a symbol, resolved or not
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SymbolRef {
    Resolved(ResolvedSymbol),
    Unresolved(UnresolvedSymbol),
}

impl SymbolRef {
    pub fn name(&self) -> &str {
        match self {
            SymbolRef::Resolved(symbol) => &symbol.name,
            SymbolRef::Unresolved(symbol) => &symbol.name,
        }
    }

    /// The defining file, when one is known
    pub fn file(&self) -> Option<&Path> {
        match self {
            SymbolRef::Resolved(symbol) => Some(symbol.file()),
            SymbolRef::Unresolved(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, SymbolRef::Resolved(_))
    }
}

impl fmt::Display for SymbolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolRef::Resolved(symbol) => symbol.fmt(f),
            SymbolRef::Unresolved(symbol) => symbol.fmt(f),
        }
    }
}

/// One definition event produced by an analyser: the symbol it defines
/// and the names of the symbols that definition needs
///
/// Prerequisites are kept by name; resolving them to a defining file is a
/// query-time concern of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRecord {
    pub name: String,
    pub prerequisites: Vec<String>,
}

impl SymbolRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prerequisites: Vec::new(),
        }
    }

    /// Adds a prerequisite name, keeping first-seen order and skipping repeats
    pub fn add_prerequisite(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.prerequisites.contains(&name) {
            self.prerequisites.push(name);
        }
    }
}

/// A stored definition with its prerequisite names, as returned by queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolInfo {
    pub symbol: ResolvedSymbol,
    pub prerequisites: Vec<String>,
}

impl SymbolInfo {
    /// Renders the record as one snapshot line: `name<TAB>file<TAB>p1,p2`
    pub fn snapshot_line(&self) -> String {
        format!(
            "{}\t{}\t{}",
            self.symbol.name,
            self.symbol.file.display(),
            self.prerequisites.join(",")
        )
    }
}
