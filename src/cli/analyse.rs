//! The `analyse` command: walk a source tree into the store

use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use tracing::info;

use super::output::Output;
use crate::storage::{Config, Workspace};
use crate::tasks::CommandKind;
use crate::tree::{SourceVisitor, TreeDescent};

pub fn run(output: &Output, config: &Config, workspace: &Workspace, source: &Path) -> Result<()> {
    let root = source
        .canonicalize()
        .with_context(|| format!("Source not found: {}", source.display()))?;

    let _lock = workspace.lock()?;
    let store = workspace
        .open_store()
        .with_context(|| format!("Failed to open store: {}", workspace.database_path().display()))?
        .into_shared();

    // Quoted includes resolve next to the original source first, then
    // under the root
    let include_dir = if root.is_dir() {
        root.clone()
    } else {
        root.parent().unwrap_or(root.as_path()).to_path_buf()
    };
    let mut flags = config.command_flags();
    let configured = flags.remove(&CommandKind::CPreProcessor).unwrap_or_default();
    let mut preprocessor = vec!["-I".to_string(), include_dir.display().to_string()];
    preprocessor.extend(configured);
    flags.insert(CommandKind::CPreProcessor, preprocessor);

    let mut visitor = SourceVisitor::new(config.source_rules()?, store.clone(), workspace.root())
        .with_flags(flags)
        .with_programs(config.command_programs());

    info!(root = %root.display(), "Walking");
    let started = Instant::now();
    TreeDescent::new(&root)
        .exclude(workspace.root())
        .descend(&mut visitor)
        .with_context(|| format!("Walk of {} aborted", root.display()))?;
    let elapsed = started.elapsed();

    let summary = visitor.into_summary();
    let (definitions, prerequisites) = store.lock().counts()?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "root": root.display().to_string(),
            "visited": summary.visited,
            "tasks": summary.tasks,
            "products": summary.products,
            "failures": summary.failures,
            "shadowed": summary.shadowed,
            "definitions": definitions,
            "prerequisites": prerequisites,
            "duration_ms": elapsed.as_millis(),
        }));
    } else {
        output.success(&format!(
            "Analysed {} in {:?}: {} files visited, {} tasks run, {} products",
            root.display(),
            elapsed,
            summary.visited,
            summary.tasks,
            summary.products
        ));
        let definitions = format!("{definitions} definitions");
        let prerequisites = format!("{prerequisites} prerequisites");
        output.row(&["Store:", definitions.as_str(), prerequisites.as_str()]);
        for product in &summary.shadowed {
            output.error(&format!(
                "{} was produced by more than one source; only the last one is recorded",
                product.display()
            ));
        }
        for failure in &summary.failures {
            output.error(&format!(
                "{} ({}): {}",
                failure.file.display(),
                failure.handler,
                failure.error
            ));
        }
    }

    if !summary.is_success() {
        bail!("{} of {} tasks failed", summary.failures.len(), summary.tasks + summary.failures.len());
    }
    Ok(())
}
