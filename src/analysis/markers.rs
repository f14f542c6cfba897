//! Include marker recovery
//!
//! Finds the marker pragmas written by the injector in a token stream and
//! turns them into line ranges tagged with their [`Provenance`]. Matching
//! keeps a window of the last four tokens; the window is only compared
//! against the marker text when its newest token is one of the marker
//! keywords.

use std::collections::VecDeque;
use std::ops::RangeInclusive;

use tracing::warn;

use super::lexer::Token;
use crate::source::{IncludeMarker, Provenance, MARKER_NAMESPACE};

/// Tokens in one marker: `#`, `pragma`, namespace, keyword
const WINDOW: usize = 4;

/// Lines produced by one included file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeRegion {
    pub provenance: Provenance,
    pub lines: RangeInclusive<usize>,
}

/// The include regions of a file, in order of their start markers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeRegions {
    regions: Vec<IncludeRegion>,
}

impl IncludeRegions {
    /// Recovers the regions bracketed by markers in `tokens`
    ///
    /// An end marker with no open region of its kind is ignored; a start
    /// marker never closed runs to the end of the file.
    pub fn recover(tokens: &[Token]) -> Self {
        let mut window: VecDeque<&Token> = VecDeque::with_capacity(WINDOW);
        let mut open: Vec<(Provenance, usize)> = Vec::new();
        let mut regions = Vec::new();

        for token in tokens {
            if window.len() == WINDOW {
                window.pop_front();
            }
            window.push_back(token);

            let Some(marker) = IncludeMarker::from_keyword(&token.spelling) else {
                continue;
            };
            if !is_marker(&window) {
                continue;
            }

            match marker {
                IncludeMarker::Start(provenance) => open.push((provenance, token.line)),
                IncludeMarker::End(provenance) => {
                    match open.iter().rposition(|(kind, _)| *kind == provenance) {
                        Some(at) => {
                            let (_, start) = open.remove(at);
                            regions.push(IncludeRegion {
                                provenance,
                                lines: start..=token.line,
                            });
                        }
                        None => warn!(line = token.line, %provenance, "unmatched include end marker"),
                    }
                }
            }
        }

        let last_line = tokens.last().map_or(0, |token| token.line);
        for (provenance, start) in open {
            regions.push(IncludeRegion {
                provenance,
                lines: start..=last_line.max(start),
            });
        }

        regions.sort_by_key(|region| *region.lines.start());
        Self { regions }
    }

    /// The provenance of the innermost region containing `line`, or `None`
    /// when the line belongs to the file itself
    pub fn provenance_of(&self, line: usize) -> Option<Provenance> {
        self.regions
            .iter()
            .filter(|region| region.lines.contains(&line))
            .max_by_key(|region| *region.lines.start())
            .map(|region| region.provenance)
    }

    pub fn regions(&self) -> &[IncludeRegion] {
        &self.regions
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// True when the window holds exactly `# pragma <namespace> <keyword>`,
/// all on one line
fn is_marker(window: &VecDeque<&Token>) -> bool {
    if window.len() < WINDOW {
        return false;
    }
    let line = window[WINDOW - 1].line;
    if window.iter().any(|token| token.line != line) {
        return false;
    }
    let joined = window
        .iter()
        .map(|token| token.spelling.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    joined == format!("# pragma {} {}", MARKER_NAMESPACE, window[WINDOW - 1].spelling)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::lexer::tokenize;
    use crate::source::{read_to_string, PragmaInjector, StringSource};
    use proptest::prelude::*;

    fn regions(source: &str) -> IncludeRegions {
        IncludeRegions::recover(&tokenize(source))
    }

    #[test]
    fn recovers_preprocessed_regions() {
        let source = "\
#pragma depwalk begin_library_include
extern int printf(const char *, ...);
#pragma depwalk end_library_include
#pragma depwalk begin_project_include
int helper(int);
#pragma depwalk end_project_include
int main(void) { return helper(printf(\"hi\")); }
";
        let regions = regions(source);

        assert_eq!(
            regions.regions(),
            &[
                IncludeRegion {
                    provenance: Provenance::Library,
                    lines: 1..=3
                },
                IncludeRegion {
                    provenance: Provenance::Project,
                    lines: 4..=6
                },
            ]
        );
        assert_eq!(regions.provenance_of(2), Some(Provenance::Library));
        assert_eq!(regions.provenance_of(5), Some(Provenance::Project));
        assert_eq!(regions.provenance_of(7), None);
    }

    #[test]
    fn keyword_alone_is_not_a_marker() {
        let source = "int begin_project_include;\n#pragma other begin_project_include\n";
        assert!(regions(source).is_empty());
    }

    #[test]
    fn marker_split_across_lines_is_ignored() {
        let source = "#pragma depwalk\nbegin_library_include\n";
        assert!(regions(source).is_empty());
    }

    #[test]
    fn unmatched_end_is_ignored_and_open_start_runs_to_end() {
        let source = "\
#pragma depwalk end_library_include
#pragma depwalk begin_project_include
int a;
int b;
";
        let regions = regions(source);

        assert_eq!(
            regions.regions(),
            &[IncludeRegion {
                provenance: Provenance::Project,
                lines: 2..=4
            }]
        );
    }

    #[test]
    fn nested_regions_resolve_to_innermost() {
        let source = "\
#pragma depwalk begin_project_include
int a;
#pragma depwalk begin_library_include
int b;
#pragma depwalk end_library_include
int c;
#pragma depwalk end_project_include
";
        let regions = regions(source);

        assert_eq!(regions.provenance_of(2), Some(Provenance::Project));
        assert_eq!(regions.provenance_of(4), Some(Provenance::Library));
        assert_eq!(regions.provenance_of(6), Some(Provenance::Project));
    }

    proptest! {
        #[test]
        fn injection_round_trips_provenance(
            includes in prop::collection::vec(("[a-z]{1,6}", any::<bool>()), 1..12)
        ) {
            let text: String = includes
                .iter()
                .map(|(name, library)| {
                    if *library {
                        format!("#include <{name}.h>\n")
                    } else {
                        format!("#include \"{name}.h\"\n")
                    }
                })
                .collect();

            let mut injector = PragmaInjector::new(StringSource::new("t.c", text));
            let marked = read_to_string(&mut injector).unwrap();
            let recovered = regions(&marked);

            prop_assert_eq!(recovered.regions().len(), includes.len());
            for (region, (_, library)) in recovered.regions().iter().zip(&includes) {
                let expected = if *library { Provenance::Library } else { Provenance::Project };
                prop_assert_eq!(region.provenance, expected);
            }
        }
    }
}
