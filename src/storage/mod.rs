//! # Storage Layer
//!
//! Persistence for depwalk: the symbol store, configuration and the
//! workspace that holds them.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Symbols | SQLite | `<workspace>/depwalk.db` |
//! | Config | TOML | `depwalk.toml` |
//! | Products | text files | `<workspace>/<name>.<ext>` |
//!
//! ## Concurrency Safety
//!
//! - A walk holds an exclusive `fs2` lock on `<workspace>/.depwalk.lock`
//! - Each file's records are replaced in one SQLite transaction
//! - Text products are written to a temp file and persisted when complete
//!
//! ## Workspace Structure
//!
//! ```text
//! working/
//! ├── depwalk.db          # Symbol store
//! ├── .depwalk.lock       # Walk lock
//! ├── a.prag.c            # Marked copy of a.c
//! └── a.prag.i            # Preprocessed a.prag.c
//! ```

mod config;
mod store;
mod workspace;

pub use config::{Config, ConfigError, RuleConfig, CONFIG_FILE};
pub use store::{SharedStore, StoreError, SymbolStore};
pub use workspace::{Workspace, WorkspaceError, WorkspaceLock};
