//! # Symbol analysis
//!
//! Turns a (possibly preprocessed) source file into [`SymbolRecord`]s.
//!
//! A [`SymbolParser`] supplies the token stream and the file-scope
//! declarations; [`symbol_records`] recovers the include markers from the
//! tokens and decides, for every declaration, whether it belongs to the
//! file itself, to a project header or to a library header:
//!
//! - externally visible definitions in the file itself become records;
//! - names those definitions use that are only *declared* by the file or
//!   a project header become prerequisites;
//! - anything declared only by a library header is not tracked.
//!
//! Uses of file-local (`static`) definitions are followed, so a public
//! function inherits the prerequisites of the private helpers it calls.

mod lexer;
mod markers;
mod parser;

use std::collections::{BTreeMap, HashSet};

use crate::domain::SymbolRecord;
use crate::source::Provenance;

pub use lexer::{tokenize, Token, TokenKind};
pub use markers::{IncludeRegion, IncludeRegions};
pub use parser::{parse_declarations, DeclKind, Declaration, Linkage};

/// A parsed file: its tokens and file-scope declarations
#[derive(Debug, Clone, Default)]
pub struct ParsedUnit {
    pub tokens: Vec<Token>,
    pub declarations: Vec<Declaration>,
}

/// Parses source text of one language
pub trait SymbolParser {
    fn parse(&self, text: &str) -> ParsedUnit;
}

/// Parser for C and preprocessed C
#[derive(Debug, Clone, Copy, Default)]
pub struct CParser;

impl SymbolParser for CParser {
    fn parse(&self, text: &str) -> ParsedUnit {
        let tokens = tokenize(text);
        let declarations = parse_declarations(&tokens);
        ParsedUnit {
            tokens,
            declarations,
        }
    }
}

/// Derives the symbol records of a parsed file
pub fn symbol_records(unit: &ParsedUnit) -> Vec<SymbolRecord> {
    let regions = IncludeRegions::recover(&unit.tokens);
    let own = |decl: &&Declaration| regions.provenance_of(decl.line).is_none();

    // Definitions written in the file itself, merged by name
    let mut definitions: BTreeMap<&str, (Linkage, Vec<&str>)> = BTreeMap::new();
    for decl in unit.declarations.iter().filter(|d| d.is_definition).filter(own) {
        let entry = definitions
            .entry(decl.name.as_str())
            .or_insert((decl.linkage, Vec::new()));
        if decl.linkage == Linkage::External {
            entry.0 = Linkage::External;
        }
        entry.1.extend(decl.references.iter().map(String::as_str));
    }

    let tracked: HashSet<&str> = unit
        .declarations
        .iter()
        .filter(|decl| !decl.is_definition)
        .filter(|decl| regions.provenance_of(decl.line) != Some(Provenance::Library))
        .map(|decl| decl.name.as_str())
        .filter(|name| !definitions.contains_key(name))
        .collect();

    let mut records = Vec::new();
    for (name, (linkage, _)) in &definitions {
        if *linkage != Linkage::External {
            continue;
        }

        let mut record = SymbolRecord::new(*name);
        let mut visited: HashSet<&str> = HashSet::from([*name]);
        let mut pending: Vec<&str> = vec![*name];

        while let Some(current) = pending.pop() {
            let Some((_, references)) = definitions.get(current) else {
                continue;
            };
            for reference in references {
                if tracked.contains(reference) {
                    record.add_prerequisite(*reference);
                } else if definitions
                    .get(reference)
                    .is_some_and(|(linkage, _)| *linkage == Linkage::Internal)
                    && visited.insert(*reference)
                {
                    pending.push(*reference);
                }
            }
        }

        records.push(record);
    }

    records
}
