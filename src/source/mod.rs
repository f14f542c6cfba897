//! # Readable text sources
//!
//! A [`TextSource`] yields the lines of some text, terminators included,
//! and names where the text came from. Sources compose: a decorator such
//! as [`PragmaInjector`] owns its upstream source and rewrites the line
//! sequence as it is pulled.
//!
//! | Source | Origin |
//! |--------|--------|
//! | [`FileSource`] | a file on disk |
//! | [`StringSource`] | in-memory text, no origin path |
//! | [`PragmaInjector`] | its upstream's origin |

mod pragma;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use pragma::{IncludeMarker, PragmaInjector, Provenance, MARKER_NAMESPACE};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Badly formatted include directive at {origin}:{line}: {text}")]
    MalformedInclude {
        origin: String,
        line: usize,
        text: String,
    },
}

/// A lazy line iterator over a text source
pub type Lines<'a> = Box<dyn Iterator<Item = Result<String, SourceError>> + 'a>;

/// Something that produces text line by line
pub trait TextSource {
    /// The file the text comes from, `None` for synthetic text
    fn origin(&self) -> Option<&Path>;

    /// A display name: the origin path, or a label for synthetic text
    fn name(&self) -> String;

    /// The lines of the text, each with its line terminator
    ///
    /// Iteration stops after the first error.
    fn lines(&mut self) -> Lines<'_>;
}

impl<S: TextSource + ?Sized> TextSource for Box<S> {
    fn origin(&self) -> Option<&Path> {
        (**self).origin()
    }

    fn name(&self) -> String {
        (**self).name()
    }

    fn lines(&mut self) -> Lines<'_> {
        (**self).lines()
    }
}

/// Reads text from a file
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TextSource for FileSource {
    fn origin(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn lines(&mut self) -> Lines<'_> {
        let path = self.path.clone();
        match File::open(&path) {
            Ok(file) => Box::new(FileLines {
                path,
                reader: Some(BufReader::new(file)),
            }),
            Err(source) => Box::new(std::iter::once(Err(SourceError::Io { path, source }))),
        }
    }
}

struct FileLines {
    path: PathBuf,
    reader: Option<BufReader<File>>,
}

impl Iterator for FileLines {
    type Item = Result<String, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => {
                self.reader = None;
                None
            }
            Ok(_) => Some(Ok(line)),
            Err(source) => {
                self.reader = None;
                Some(Err(SourceError::Io {
                    path: self.path.clone(),
                    source,
                }))
            }
        }
    }
}

/// Text held in memory; it has no origin path
#[derive(Debug, Clone)]
pub struct StringSource {
    label: String,
    text: String,
}

impl StringSource {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

impl TextSource for StringSource {
    fn origin(&self) -> Option<&Path> {
        None
    }

    fn name(&self) -> String {
        self.label.clone()
    }

    fn lines(&mut self) -> Lines<'_> {
        Box::new(self.text.split_inclusive('\n').map(|line| Ok(line.to_string())))
    }
}

/// Reads a whole source into one string
pub fn read_to_string(source: &mut dyn TextSource) -> Result<String, SourceError> {
    let mut text = String::new();
    for line in source.lines() {
        text.push_str(&line?);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_source_keeps_line_terminators() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.c");
        std::fs::write(&path, "int a;\r\nint b;\nint c;").unwrap();

        let mut source = FileSource::new(&path);
        let lines: Vec<String> = source.lines().collect::<Result<_, _>>().unwrap();

        assert_eq!(lines, vec!["int a;\r\n", "int b;\n", "int c;"]);
        assert_eq!(source.origin(), Some(path.as_path()));
    }

    #[test]
    fn file_source_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut source = FileSource::new(dir.path().join("missing.c"));

        let results: Vec<_> = source.lines().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(SourceError::Io { .. })));
    }

    #[test]
    fn file_source_is_restartable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.c");
        std::fs::write(&path, "one\ntwo\n").unwrap();

        let mut source = FileSource::new(&path);
        assert_eq!(read_to_string(&mut source).unwrap(), "one\ntwo\n");
        assert_eq!(read_to_string(&mut source).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn string_source_has_no_origin() {
        let mut source = StringSource::new("<memory>", "first\nsecond\n");

        assert_eq!(source.origin(), None);
        assert_eq!(source.name(), "<memory>");
        assert_eq!(read_to_string(&mut source).unwrap(), "first\nsecond\n");
    }
}
