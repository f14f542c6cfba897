//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Commands
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Walk | Record a tree's symbols | `analyse src` |
//! | Query | Read the store | `symbol main`, `depends main working/a.prag.i`, `dump` |
//! | Maintenance | Invalidate records | `forget working/a.prag.i` |
//! | Graph | Build ordering | `order`, `affected working/b.prag.i` |
//!
//! Files are named by the path the analyser read. Under the default rules
//! that is the preprocessed copy in the workspace, not the original source.
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug logs on stderr:
//! ```bash
//! depwalk --verbose analyse src
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod analyse;
mod app;
mod graph_cmd;
mod logging;
mod output;
mod query;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
