//! Store query commands (symbol, depends, dump, forget)

use std::path::Path;

use anyhow::Result;

use super::app::resolve_file;
use super::output::Output;
use crate::domain::SymbolRef;
use crate::storage::{StoreError, Workspace};

/// Show every definition of a symbol
///
/// A name with no definition is reported, not treated as a failure: it is
/// either external to the analysed tree or not analysed yet.
pub fn symbol(output: &Output, workspace: &Workspace, name: &str) -> Result<()> {
    let store = workspace.open_store()?;

    let definitions = match store.get_symbol(name) {
        Ok(definitions) => definitions,
        Err(StoreError::NotFound(_)) => {
            if output.is_json() {
                output.data(&serde_json::json!({
                    "name": name,
                    "found": false,
                    "definitions": [],
                }));
            } else {
                println!("{}: not defined in any analysed file (external or unknown)", name);
            }
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if output.is_json() {
        output.data(&serde_json::json!({
            "name": name,
            "found": true,
            "definitions": definitions,
        }));
    } else {
        for info in &definitions {
            println!("{}\t{}", info.symbol.name, info.symbol.file.display());
            if !info.prerequisites.is_empty() {
                println!("  needs: {}", info.prerequisites.join(", "));
            }
        }
    }

    Ok(())
}

/// Resolve the prerequisites of one definition
pub fn depends(output: &Output, workspace: &Workspace, name: &str, file: &Path) -> Result<()> {
    let file = resolve_file(file)?;
    let store = workspace.open_store()?;
    let refs = store.depends_on(name, &file)?;

    if output.is_json() {
        output.data(&refs);
    } else if refs.is_empty() {
        println!("{} in {} has no prerequisites.", name, file.display());
    } else {
        for symbol in &refs {
            match symbol {
                SymbolRef::Resolved(resolved) => {
                    let file = resolved.file.display().to_string();
                    output.row(&[resolved.name.as_str(), file.as_str()])
                }
                SymbolRef::Unresolved(unresolved) => {
                    output.row(&[unresolved.name.as_str(), "(unresolved)"])
                }
            }
        }
    }

    Ok(())
}

/// Print every record, one per line, in stable order
pub fn dump(output: &Output, workspace: &Workspace) -> Result<()> {
    let store = workspace.open_store()?;
    let records = store.records()?;

    if output.is_json() {
        output.data(&records);
    } else {
        for record in &records {
            println!("{}", record.snapshot_line());
        }
    }

    Ok(())
}

/// Drop every record a file contributed
pub fn forget(output: &Output, workspace: &Workspace, file: &Path) -> Result<()> {
    let file = resolve_file(file)?;
    let _lock = workspace.lock()?;
    let mut store = workspace.open_store()?;

    let before = store.counts()?;
    store.remove_file(&file)?;
    let after = store.counts()?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "file": file.display().to_string(),
            "definitions_removed": before.0 - after.0,
            "prerequisites_removed": before.1 - after.1,
        }));
    } else {
        output.success(&format!(
            "Forgot {} ({} definitions, {} prerequisites)",
            file.display(),
            before.0 - after.0,
            before.1 - after.1
        ));
    }

    Ok(())
}
