//! Text rewriting tasks

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use super::command::product_name;
use super::{ModifierKind, TaskError};
use crate::source::TextSource;

/// Copies a decorated source line by line into a workspace file
///
/// The lines are written unmodified; the decorator chain built by
/// [`ModifierKind::decorate`] is what changes content. The product only
/// appears once the whole sequence has been read.
///
/// A source with no file behind it has no product: running it still reads
/// the decorated lines, so malformed input fails, but nothing is written.
pub struct TextModifier {
    kind: ModifierKind,
    workspace: PathBuf,
    source: Box<dyn TextSource>,
    product: Option<PathBuf>,
}

impl TextModifier {
    /// Wraps `upstream` in the modifier's decorators
    pub fn new(kind: ModifierKind, workspace: &Path, upstream: Box<dyn TextSource>) -> Self {
        let product = upstream
            .origin()
            .map(|origin| workspace.join(product_name(origin, kind.output_extension())));

        Self {
            kind,
            workspace: workspace.to_path_buf(),
            source: kind.decorate(upstream),
            product,
        }
    }

    pub fn kind(&self) -> ModifierKind {
        self.kind
    }

    pub fn prerequisites(&self) -> Vec<PathBuf> {
        self.source.origin().map(|p| p.to_path_buf()).into_iter().collect()
    }

    pub fn products(&self) -> Vec<PathBuf> {
        self.product.iter().cloned().collect()
    }

    pub fn run(&mut self) -> Result<(), TaskError> {
        let Some(product) = self.product.clone() else {
            let lines = self.source.lines().collect::<Result<Vec<_>, _>>()?.len();
            debug!(source = %self.source.name(), lines, "No file behind source; nothing written");
            return Ok(());
        };

        let io_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source| TaskError::Io { path, source }
        };

        std::fs::create_dir_all(&self.workspace).map_err(io_error(&self.workspace))?;
        let staging = NamedTempFile::new_in(&self.workspace).map_err(io_error(&self.workspace))?;

        let mut writer = BufWriter::new(staging);
        let mut lines = 0usize;
        for line in self.source.lines() {
            writer
                .write_all(line?.as_bytes())
                .map_err(io_error(&product))?;
            lines += 1;
        }

        let staging = writer
            .into_inner()
            .map_err(|err| io_error(&product)(err.into_error()))?;
        staging
            .persist(&product)
            .map_err(|err| io_error(&product)(err.error))?;

        debug!(product = %product.display(), lines, "Wrote");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FileSource, SourceError, StringSource};
    use tempfile::TempDir;

    #[test]
    fn writes_marked_copy_into_workspace() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.c");
        std::fs::write(&input, "#include \"b.h\"\nint a;\n").unwrap();
        let workspace = dir.path().join("working");

        let mut task = TextModifier::new(
            ModifierKind::CPragmaInjector,
            &workspace,
            Box::new(FileSource::new(&input)),
        );
        assert_eq!(task.products(), vec![workspace.join("a.prag.c")]);
        assert_eq!(task.prerequisites(), vec![input]);

        task.run().unwrap();

        let written = std::fs::read_to_string(workspace.join("a.prag.c")).unwrap();
        assert_eq!(
            written,
            "#pragma depwalk begin_project_include\n#include \"b.h\"\n#pragma depwalk end_project_include\nint a;\n"
        );
    }

    #[test]
    fn malformed_directive_leaves_no_product() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("bad.c");
        std::fs::write(&input, "int a;\n#include HEADER\n").unwrap();
        let workspace = dir.path().join("working");

        let mut task = TextModifier::new(
            ModifierKind::CPragmaInjector,
            &workspace,
            Box::new(FileSource::new(&input)),
        );

        let err = task.run().unwrap_err();
        assert!(matches!(err, TaskError::Source(SourceError::MalformedInclude { .. })));
        assert!(!workspace.join("bad.prag.c").exists());
        assert_eq!(std::fs::read_dir(&workspace).unwrap().count(), 0);
    }

    #[test]
    fn synthetic_source_has_no_product() {
        let dir = TempDir::new().unwrap();
        let mut task = TextModifier::new(
            ModifierKind::CPragmaInjector,
            dir.path(),
            Box::new(StringSource::new("generated.c", "#include <stdio.h>\nint a;\n")),
        );

        assert!(task.prerequisites().is_empty());
        assert!(task.products().is_empty());

        task.run().unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
