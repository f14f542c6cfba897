//! SQLite symbol dependency store
//!
//! The store sits in `<workspace>/depwalk.db` and holds two tables: symbol
//! definitions (symbol, file) and symbol prerequisites (symbol, file,
//! prerequisite). Both are keyed by the (symbol, file) pair. Prerequisites
//! are recorded by name and resolved to a defining file at query time.
//!
//! Invalidation is per file: [`SymbolStore::remove_file`] drops everything
//! a file contributed, and [`SymbolStore::replace_file`] swaps a file's
//! records in a single transaction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{ResolvedSymbol, SymbolInfo, SymbolRecord, SymbolRef, UnresolvedSymbol};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Symbol not found: {0}")]
    NotFound(String),

    #[error("Symbol name '{name}' exceeds the maximum identifier length of {max}")]
    NameTooLong { name: String, max: usize },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A store handle shared between the dispatcher and analyser tasks
pub type SharedStore = Arc<Mutex<SymbolStore>>;

/// Persistent store of symbol definitions and their prerequisites
pub struct SymbolStore {
    /// Path to the SQLite database, `None` when in memory
    db_path: Option<PathBuf>,

    /// Longest symbol name the store accepts
    max_name_length: usize,

    /// Database connection
    conn: Connection,
}

impl SymbolStore {
    /// Schema version - bump when schema changes to force rebuild
    const SCHEMA_VERSION: i32 = 2;

    /// Creates or opens the store at `db_path`
    pub fn open(db_path: &Path, max_name_length: usize) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let mut store = Self {
            db_path: Some(db_path.to_path_buf()),
            max_name_length,
            conn,
        };
        store.ensure_schema()?;

        debug!(path = %db_path.display(), "opened symbol store");
        Ok(store)
    }

    /// Creates a store that lives only as long as the connection
    pub fn open_in_memory(max_name_length: usize) -> Result<Self, StoreError> {
        let mut store = Self {
            db_path: None,
            max_name_length,
            conn: Connection::open_in_memory()?,
        };
        store.ensure_schema()?;

        Ok(store)
    }

    /// Wraps the store for sharing with tasks
    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    /// Ensures the schema is up to date and sized for `max_name_length`
    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        let current_version = self.get_schema_version()?;

        if current_version != Self::SCHEMA_VERSION {
            self.create_schema()?;
        } else if self.stored_name_width()? != Some(self.max_name_length) {
            self.resize_schema()?;
        }

        Ok(())
    }

    /// Gets the current schema version
    fn get_schema_version(&self) -> Result<i32, StoreError> {
        let result: Option<i32> = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .optional()?;

        Ok(result.unwrap_or(0))
    }

    /// Name width the tables were created with
    fn stored_name_width(&self) -> Result<Option<usize>, StoreError> {
        let width: Option<i64> = self
            .conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = 'name_width'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        Ok(width.map(|w| w as usize))
    }

    /// Creates the schema from scratch
    fn create_schema(&mut self) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "
            DROP TABLE IF EXISTS symbol_prerequisites;
            DROP TABLE IF EXISTS symbol_definitions;
            DROP TABLE IF EXISTS store_meta;

            CREATE TABLE store_meta (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );
            ",
        )?;
        create_tables(&tx, self.max_name_length)?;
        tx.commit()?;

        // Set schema version
        self.conn.execute(
            &format!("PRAGMA user_version = {}", Self::SCHEMA_VERSION),
            [],
        )?;

        Ok(())
    }

    /// Rebuilds the tables at a new name width, keeping existing records
    ///
    /// Files with any name longer than the new width lose all their
    /// records, so no file is left half recorded.
    fn resize_schema(&mut self) -> Result<(), StoreError> {
        let width = self.max_name_length;
        let tx = self.conn.transaction()?;

        tx.execute_batch(
            "
            DROP INDEX IF EXISTS idx_definitions_symbol_file;
            DROP INDEX IF EXISTS idx_definitions_file;
            DROP INDEX IF EXISTS idx_prerequisites_symbol_file;
            DROP INDEX IF EXISTS idx_prerequisites_file;
            ALTER TABLE symbol_definitions RENAME TO old_definitions;
            ALTER TABLE symbol_prerequisites RENAME TO old_prerequisites;
            ",
        )?;
        create_tables(&tx, width)?;

        let dropped: i64 = tx.query_row(
            "SELECT COUNT(DISTINCT file) FROM (
                 SELECT file FROM old_definitions WHERE length(symbol) > ?1
                 UNION
                 SELECT file FROM old_prerequisites
                 WHERE length(symbol) > ?1 OR length(prerequisite) > ?1
             )",
            params![width as i64],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO symbol_definitions (symbol, file)
             SELECT symbol, file FROM old_definitions
             WHERE file NOT IN (
                 SELECT file FROM old_definitions WHERE length(symbol) > ?1
                 UNION
                 SELECT file FROM old_prerequisites
                 WHERE length(symbol) > ?1 OR length(prerequisite) > ?1
             )
             ORDER BY rowid",
            params![width as i64],
        )?;
        tx.execute(
            "INSERT INTO symbol_prerequisites (symbol, file, prerequisite)
             SELECT symbol, file, prerequisite FROM old_prerequisites
             WHERE file NOT IN (
                 SELECT file FROM old_definitions WHERE length(symbol) > ?1
                 UNION
                 SELECT file FROM old_prerequisites
                 WHERE length(symbol) > ?1 OR length(prerequisite) > ?1
             )
             ORDER BY rowid",
            params![width as i64],
        )?;

        tx.execute_batch(
            "
            DROP TABLE old_prerequisites;
            DROP TABLE old_definitions;
            ",
        )?;
        tx.commit()?;

        if dropped > 0 {
            warn!(width, files = dropped, "Name width shrank; dropped records of files with longer names");
        } else {
            debug!(width, "Resized symbol tables");
        }
        Ok(())
    }

    fn check_name(&self, name: &str) -> Result<(), StoreError> {
        check_name(name, self.max_name_length)
    }

    /// Records that `file` defines `name`
    ///
    /// Rows are not deduplicated; call [`remove_file`](Self::remove_file)
    /// before re-recording a file.
    pub fn add_symbol(&self, name: &str, file: &Path) -> Result<(), StoreError> {
        self.check_name(name)?;
        insert_symbol(&self.conn, name, file)
    }

    /// Records that the definition of `name` in `file` needs `prerequisite`
    ///
    /// Neither definition has to exist yet.
    pub fn add_dependency(
        &self,
        name: &str,
        file: &Path,
        prerequisite: &str,
    ) -> Result<(), StoreError> {
        self.check_name(name)?;
        self.check_name(prerequisite)?;
        insert_dependency(&self.conn, name, file, prerequisite)
    }

    /// Removes every definition and prerequisite recorded for `file`
    ///
    /// Removing a file with no records is not an error.
    pub fn remove_file(&mut self, file: &Path) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        delete_file(&tx, file)?;
        tx.commit()?;

        Ok(())
    }

    /// Replaces everything recorded for `file` with `records`, atomically
    pub fn replace_file(&mut self, file: &Path, records: &[SymbolRecord]) -> Result<(), StoreError> {
        for record in records {
            self.check_name(&record.name)?;
            for prerequisite in &record.prerequisites {
                self.check_name(prerequisite)?;
            }
        }

        let tx = self.conn.transaction()?;
        delete_file(&tx, file)?;
        for record in records {
            insert_symbol(&tx, &record.name, file)?;
            for prerequisite in &record.prerequisites {
                insert_dependency(&tx, &record.name, file, prerequisite)?;
            }
        }
        tx.commit()?;

        debug!(file = %file.display(), symbols = records.len(), "replaced file records");
        Ok(())
    }

    /// Query: Every definition of `name`, across all files
    ///
    /// Several results are expected when the name is defined in several
    /// files. No definition at all is [`StoreError::NotFound`].
    pub fn get_symbol(&self, name: &str) -> Result<Vec<SymbolInfo>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT file FROM symbol_definitions WHERE symbol = ?1 ORDER BY file",
        )?;
        let files: Vec<String> = stmt
            .query_map(params![name], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        if files.is_empty() {
            return Err(StoreError::NotFound(name.to_string()));
        }

        files
            .into_iter()
            .map(|file| {
                let file = PathBuf::from(file);
                let prerequisites = self.prerequisites(name, &file)?;
                Ok(SymbolInfo {
                    symbol: ResolvedSymbol::new(name, file),
                    prerequisites,
                })
            })
            .collect()
    }

    /// Prerequisite names of one definition, in recording order
    fn prerequisites(&self, name: &str, file: &Path) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT prerequisite FROM symbol_prerequisites
             WHERE symbol = ?1 AND file = ?2
             ORDER BY rowid",
        )?;
        let names = stmt
            .query_map(params![name, path_key(file)], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(names)
    }

    /// Query: Prerequisites of the definition of `name` in `file`, resolved
    ///
    /// A prerequisite defined somewhere in the store becomes one
    /// [`SymbolRef::Resolved`] per defining file; anything else stays
    /// [`SymbolRef::Unresolved`].
    pub fn depends_on(&self, name: &str, file: &Path) -> Result<Vec<SymbolRef>, StoreError> {
        let defined: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM symbol_definitions WHERE symbol = ?1 AND file = ?2 LIMIT 1",
                params![name, path_key(file)],
                |row| row.get(0),
            )
            .optional()?;

        if defined.is_none() {
            return Err(StoreError::NotFound(format!("{} in {}", name, file.display())));
        }

        let mut definers = self.conn.prepare(
            "SELECT DISTINCT file FROM symbol_definitions WHERE symbol = ?1 ORDER BY file",
        )?;

        let mut result = Vec::new();
        for prerequisite in self.prerequisites(name, file)? {
            let files: Vec<String> = definers
                .query_map(params![&prerequisite], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;

            if files.is_empty() {
                result.push(SymbolRef::Unresolved(UnresolvedSymbol::new(prerequisite)));
            } else {
                result.extend(files.into_iter().map(|f| {
                    SymbolRef::Resolved(ResolvedSymbol::new(prerequisite.clone(), f))
                }));
            }
        }

        Ok(result)
    }

    /// Query: One record per (symbol, file), sorted by symbol, file, then
    /// prerequisite name
    pub fn records(&self) -> Result<Vec<SymbolInfo>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT d.symbol, d.file, p.prerequisite
             FROM (SELECT DISTINCT symbol, file FROM symbol_definitions) d
             LEFT JOIN symbol_prerequisites p
               ON p.symbol = d.symbol AND p.file = d.file
             ORDER BY d.symbol, d.file, p.prerequisite",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut records: Vec<SymbolInfo> = Vec::new();
        for row in rows {
            let (name, file, prerequisite) = row?;
            let file = PathBuf::from(file);

            let same = records
                .last()
                .is_some_and(|last| last.symbol.name == name && last.symbol.file == file);
            if !same {
                records.push(SymbolInfo {
                    symbol: ResolvedSymbol::new(name, file),
                    prerequisites: Vec::new(),
                });
            }

            if let (Some(prerequisite), Some(last)) = (prerequisite, records.last_mut()) {
                last.prerequisites.push(prerequisite);
            }
        }

        Ok(records)
    }

    /// Query: Files with at least one definition, sorted
    pub fn files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT file FROM symbol_definitions ORDER BY file")?;
        let files = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|file| file.map(PathBuf::from))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(files)
    }

    /// Query: Definition and prerequisite row counts
    pub fn counts(&self) -> Result<(usize, usize), StoreError> {
        let definitions: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM symbol_definitions", [], |row| row.get(0))?;
        let prerequisites: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM symbol_prerequisites", [], |row| row.get(0))?;

        Ok((definitions as usize, prerequisites as usize))
    }

    /// Returns the path to the store database, if it is on disk
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Returns the longest symbol name the store accepts
    pub fn max_name_length(&self) -> usize {
        self.max_name_length
    }
}

fn check_name(name: &str, max: usize) -> Result<(), StoreError> {
    if name.chars().count() > max {
        return Err(StoreError::NameTooLong {
            name: name.to_string(),
            max,
        });
    }
    Ok(())
}

/// Creates the symbol tables and records their name width
fn create_tables(conn: &Connection, width: usize) -> Result<(), StoreError> {
    conn.execute_batch(&format!(
        "
        CREATE TABLE symbol_definitions (
            symbol VARCHAR({width}) NOT NULL CHECK (length(symbol) <= {width}),
            file TEXT NOT NULL
        );

        CREATE TABLE symbol_prerequisites (
            symbol VARCHAR({width}) NOT NULL CHECK (length(symbol) <= {width}),
            file TEXT NOT NULL,
            prerequisite VARCHAR({width}) NOT NULL CHECK (length(prerequisite) <= {width})
        );

        CREATE INDEX idx_definitions_symbol_file ON symbol_definitions(symbol, file);
        CREATE INDEX idx_definitions_file ON symbol_definitions(file);
        CREATE INDEX idx_prerequisites_symbol_file ON symbol_prerequisites(symbol, file);
        CREATE INDEX idx_prerequisites_file ON symbol_prerequisites(file);
        "
    ))?;
    conn.execute(
        "INSERT OR REPLACE INTO store_meta (key, value) VALUES ('name_width', ?1)",
        params![width as i64],
    )?;
    Ok(())
}

/// File identity as stored: the path text
fn path_key(file: &Path) -> String {
    file.to_string_lossy().into_owned()
}

fn insert_symbol(conn: &Connection, name: &str, file: &Path) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO symbol_definitions (symbol, file) VALUES (?1, ?2)",
        params![name, path_key(file)],
    )?;
    Ok(())
}

fn insert_dependency(
    conn: &Connection,
    name: &str,
    file: &Path,
    prerequisite: &str,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO symbol_prerequisites (symbol, file, prerequisite) VALUES (?1, ?2, ?3)",
        params![name, path_key(file), prerequisite],
    )?;
    Ok(())
}

/// Prerequisites go first so no prerequisite row outlives its definition
fn delete_file(tx: &Transaction<'_>, file: &Path) -> Result<(), StoreError> {
    let key = path_key(file);
    tx.execute("DELETE FROM symbol_prerequisites WHERE file = ?1", params![&key])?;
    tx.execute("DELETE FROM symbol_definitions WHERE file = ?1", params![&key])?;
    Ok(())
}
