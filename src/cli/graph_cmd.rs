//! Build graph commands (order, affected)

use std::path::Path;

use anyhow::{Context, Result};

use super::app::resolve_file;
use super::output::Output;
use crate::domain::{BuildGraph, GraphError};
use crate::storage::Workspace;

fn load_graph(workspace: &Workspace) -> Result<BuildGraph> {
    let store = workspace.open_store()?;
    let records = store.records().context("Failed to read store records")?;
    Ok(BuildGraph::from_records(&records))
}

/// Print analysed files, prerequisites first
pub fn order(output: &Output, workspace: &Workspace) -> Result<()> {
    let graph = load_graph(workspace)?;
    let order = graph.build_order().context("Cannot order files")?;

    if output.is_json() {
        output.data(&order);
    } else if order.is_empty() {
        println!("No analysed files.");
    } else {
        for (position, file) in order.iter().enumerate() {
            println!("{:>4}  {}", position + 1, file.display());
        }
    }

    Ok(())
}

/// List every file whose records depend, directly or not, on `file`
pub fn affected(output: &Output, workspace: &Workspace, file: &Path) -> Result<()> {
    let file = resolve_file(file)?;
    let graph = load_graph(workspace)?;

    let affected = match graph.affected_by(&file) {
        Ok(files) => files,
        Err(GraphError::FileNotFound(_)) => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    if output.is_json() {
        output.data(&serde_json::json!({
            "file": file.display().to_string(),
            "known": graph.contains(&file),
            "affected": affected,
        }));
    } else if !graph.contains(&file) {
        println!("{} has no records.", file.display());
    } else if affected.is_empty() {
        println!("Nothing depends on {}.", file.display());
    } else {
        for path in &affected {
            println!("{}", path.display());
        }
    }

    Ok(())
}
