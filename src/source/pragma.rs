//! Include marker injection
//!
//! Wraps every `#include` line of a C source in a pair of `#pragma` lines
//! naming where the included file comes from. The pragmas survive the
//! preprocessor, so after preprocessing the text between a start and end
//! marker is known to come from a library (`<...>`) or project (`"..."`)
//! header.

use std::collections::VecDeque;
use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::Serialize;

use super::{Lines, SourceError, TextSource};

/// Pragma namespace shared by every injected marker
pub const MARKER_NAMESPACE: &str = "depwalk";

/// Where an included file comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Angle-bracket include, provided by a system or third-party library
    Library,
    /// Quoted include, part of the project
    Project,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Library => write!(f, "library"),
            Provenance::Project => write!(f, "project"),
        }
    }
}

/// One half of a marker pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncludeMarker {
    Start(Provenance),
    End(Provenance),
}

impl IncludeMarker {
    pub const ALL: [IncludeMarker; 4] = [
        IncludeMarker::Start(Provenance::Library),
        IncludeMarker::End(Provenance::Library),
        IncludeMarker::Start(Provenance::Project),
        IncludeMarker::End(Provenance::Project),
    ];

    /// The pragma word that tells the markers apart
    pub fn keyword(&self) -> &'static str {
        match self {
            IncludeMarker::Start(Provenance::Library) => "begin_library_include",
            IncludeMarker::End(Provenance::Library) => "end_library_include",
            IncludeMarker::Start(Provenance::Project) => "begin_project_include",
            IncludeMarker::End(Provenance::Project) => "end_project_include",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|marker| marker.keyword() == keyword)
    }

    /// The marker as a source line, terminator included
    pub fn line(&self) -> String {
        format!("#pragma {} {}\n", MARKER_NAMESPACE, self.keyword())
    }

    pub fn provenance(&self) -> Provenance {
        match self {
            IncludeMarker::Start(provenance) | IncludeMarker::End(provenance) => *provenance,
        }
    }
}

/// Decorates a source, bracketing each include directive with markers
///
/// Every other line passes through untouched. An include whose target is
/// neither `<...>` nor quoted fails the sequence at that line.
pub struct PragmaInjector<S> {
    upstream: S,
    include: Regex,
}

impl<S: TextSource> PragmaInjector<S> {
    pub fn new(upstream: S) -> Self {
        Self {
            upstream,
            include: Regex::new(r"^[ \t]*#[ \t]*include[ \t]+(\S+)").expect("valid regex"),
        }
    }
}

impl<S: TextSource> TextSource for PragmaInjector<S> {
    fn origin(&self) -> Option<&Path> {
        self.upstream.origin()
    }

    fn name(&self) -> String {
        self.upstream.name()
    }

    fn lines(&mut self) -> Lines<'_> {
        let origin = self.upstream.name();
        Box::new(InjectedLines {
            upstream: self.upstream.lines(),
            include: &self.include,
            origin,
            pending: VecDeque::new(),
            line: 0,
            failed: false,
        })
    }
}

struct InjectedLines<'a> {
    upstream: Lines<'a>,
    include: &'a Regex,
    origin: String,
    pending: VecDeque<String>,
    line: usize,
    failed: bool,
}

impl Iterator for InjectedLines<'_> {
    type Item = Result<String, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(line) = self.pending.pop_front() {
            return Some(Ok(line));
        }
        if self.failed {
            return None;
        }

        let line = match self.upstream.next()? {
            Ok(line) => line,
            Err(err) => {
                self.failed = true;
                return Some(Err(err));
            }
        };
        self.line += 1;

        let Some(captures) = self.include.captures(&line) else {
            return Some(Ok(line));
        };

        let target = &captures[1];
        let provenance = if target.starts_with('<') {
            Provenance::Library
        } else if target.starts_with(['"', '\'']) {
            Provenance::Project
        } else {
            self.failed = true;
            return Some(Err(SourceError::MalformedInclude {
                origin: self.origin.clone(),
                line: self.line,
                text: line.trim_end().to_string(),
            }));
        };

        // Markers are whole lines, even after an unterminated final directive
        let mut line = line;
        if !line.ends_with('\n') {
            line.push('\n');
        }
        self.pending.push_back(line);
        self.pending.push_back(IncludeMarker::End(provenance).line());
        Some(Ok(IncludeMarker::Start(provenance).line()))
    }
}
