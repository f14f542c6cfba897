//! Symbol analysis task

use std::path::PathBuf;

use tracing::{debug, info};

use super::{AnalyserKind, TaskError};
use crate::analysis::symbol_records;
use crate::source::{read_to_string, TextSource};
use crate::storage::SharedStore;

/// Parses one source and replaces its records in the store
pub struct Analyser {
    kind: AnalyserKind,
    source: Box<dyn TextSource>,
    store: SharedStore,
}

impl Analyser {
    pub fn new(kind: AnalyserKind, source: Box<dyn TextSource>, store: SharedStore) -> Self {
        Self {
            kind,
            source,
            store,
        }
    }

    pub fn kind(&self) -> AnalyserKind {
        self.kind
    }

    /// The file identity records are stored under: the origin path, or
    /// the source name for synthetic text
    pub fn file(&self) -> PathBuf {
        match self.source.origin() {
            Some(origin) => origin.to_path_buf(),
            None => PathBuf::from(self.source.name()),
        }
    }

    pub fn prerequisites(&self) -> Vec<PathBuf> {
        self.source.origin().map(|p| p.to_path_buf()).into_iter().collect()
    }

    pub fn run(&mut self) -> Result<(), TaskError> {
        let file = self.file();
        let text = read_to_string(self.source.as_mut())?;

        let unit = self.kind.parser().parse(&text);
        debug!(
            file = %file.display(),
            tokens = unit.tokens.len(),
            declarations = unit.declarations.len(),
            "Parsed"
        );

        let records = symbol_records(&unit);
        self.store.lock().replace_file(&file, &records)?;

        info!(file = %file.display(), symbols = records.len(), "Analysed");
        Ok(())
    }
}
