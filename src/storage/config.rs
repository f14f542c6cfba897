//! Configuration handling for depwalk
//!
//! Configuration is read from `depwalk.toml` in the current directory, or
//! from the file given with `--config`. Every key is optional.
//!
//! ```toml
//! workspace = "working"
//! database = "depwalk.db"
//! max_identifier_length = 63
//!
//! [[rules]]
//! pattern = '.*\.c$'
//! handler = "c-pragma-injector"
//!
//! [flags]
//! c-preprocessor = ["-DNDEBUG"]
//!
//! [programs]
//! c-preprocessor = "cpp"
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::tasks::{CommandKind, HandlerKind};
use crate::tree::SourceRule;

/// File name searched for in the current directory
pub const CONFIG_FILE: &str = "depwalk.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// One dispatch rule as written in the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub pattern: String,
    pub handler: String,
}

impl RuleConfig {
    fn new(pattern: &str, handler: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            handler: handler.to_string(),
        }
    }
}

/// Walk and store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory for products and the store
    pub workspace: PathBuf,

    /// Store file name, relative to the workspace
    pub database: PathBuf,

    /// Longest symbol name the store accepts
    pub max_identifier_length: usize,

    /// Ordered dispatch rules; the last match wins
    pub rules: Vec<RuleConfig>,

    /// Extra flags per command handler
    pub flags: BTreeMap<String, Vec<String>>,

    /// Program overrides per command handler
    pub programs: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("working"),
            database: PathBuf::from("depwalk.db"),
            max_identifier_length: 63,
            rules: vec![
                RuleConfig::new(r".*\.c$", "c-pragma-injector"),
                RuleConfig::new(r".*\.prag\.c$", "c-preprocessor"),
                RuleConfig::new(r".*\.i$", "c-analyser"),
            ],
            flags: BTreeMap::new(),
            programs: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Loads `explicit` if given, otherwise `depwalk.toml` in the current
    /// directory when present, otherwise the defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = Path::new(CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("Failed to load config: {}", path.display()))
    }

    /// Parses and validates configuration text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values and compiles every rule pattern
    ///
    /// Handler names are not checked here; a rule naming an unknown
    /// handler fails the walk when it first matches.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_identifier_length == 0 {
            return Err(ConfigError::Invalid(
                "max_identifier_length must be at least 1".to_string(),
            ));
        }
        if self.database.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database must not be empty".to_string()));
        }
        self.source_rules().map(|_| ())
    }

    pub fn source_rules(&self) -> Result<Vec<SourceRule>, ConfigError> {
        self.rules
            .iter()
            .map(|rule| {
                SourceRule::new(&rule.pattern, rule.handler.clone()).map_err(|e| {
                    ConfigError::Invalid(format!("rule pattern '{}': {}", rule.pattern, e))
                })
            })
            .collect()
    }

    /// Flag lists keyed by command kind
    pub fn command_flags(&self) -> HashMap<CommandKind, Vec<String>> {
        self.flags
            .iter()
            .filter_map(|(name, flags)| Some((command_kind(name, "flags")?, flags.clone())))
            .collect()
    }

    /// Program overrides keyed by command kind
    pub fn command_programs(&self) -> HashMap<CommandKind, String> {
        self.programs
            .iter()
            .filter_map(|(name, program)| Some((command_kind(name, "programs")?, program.clone())))
            .collect()
    }

    /// Store location inside `workspace`
    pub fn database_path(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.database)
    }
}

fn command_kind(name: &str, section: &str) -> Option<CommandKind> {
    match HandlerKind::from_name(name) {
        Some(HandlerKind::Command(kind)) => Some(kind),
        _ => {
            warn!(handler = name, section, "Ignoring entry for a handler that runs no command");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config() {
        let config = Config::default();

        assert_eq!(config.workspace, PathBuf::from("working"));
        assert_eq!(config.max_identifier_length, 63);
        assert_eq!(config.rules.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_rules_form_the_c_pipeline() {
        let rules = Config::default().source_rules().unwrap();
        let handler_for = |path: &str| {
            rules
                .iter()
                .filter(|rule| rule.matches(Path::new(path)))
                .last()
                .map(|rule| rule.handler().to_string())
        };

        assert_eq!(handler_for("src/a.c").as_deref(), Some("c-pragma-injector"));
        assert_eq!(handler_for("working/a.prag.c").as_deref(), Some("c-preprocessor"));
        assert_eq!(handler_for("working/a.prag.i").as_deref(), Some("c-analyser"));
        assert_eq!(handler_for("src/a.h"), None);
    }

    #[test]
    fn parse_config() {
        let toml = r#"
workspace = "build"
max_identifier_length = 31

[[rules]]
pattern = '.*\.i$'
handler = "c-analyser"

[flags]
c-preprocessor = ["-DNDEBUG", "-Iinclude"]
"#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.workspace, PathBuf::from("build"));
        assert_eq!(config.database, PathBuf::from("depwalk.db"));
        assert_eq!(config.max_identifier_length, 31);
        assert_eq!(config.rules, vec![RuleConfig::new(r".*\.i$", "c-analyser")]);
        assert_eq!(
            config.command_flags().get(&CommandKind::CPreProcessor),
            Some(&vec!["-DNDEBUG".to_string(), "-Iinclude".to_string()])
        );
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let toml = r#"
[[rules]]
pattern = '.*\.(c$'
handler = "c-analyser"
"#;

        assert!(matches!(Config::parse(toml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unknown_handler_is_accepted_at_load() {
        let toml = r#"
[[rules]]
pattern = '.*\.f90$'
handler = "fortran-analyser"
"#;

        assert!(Config::parse(toml).is_ok());
    }

    #[test]
    fn zero_identifier_length_is_rejected() {
        assert!(matches!(
            Config::parse("max_identifier_length = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(Config::parse("rules = 3"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn flags_for_non_command_handlers_are_ignored() {
        let toml = r#"
[flags]
c-analyser = ["-x"]
nonsense = ["-y"]
"#;

        assert!(Config::parse(toml).unwrap().command_flags().is_empty());
    }

    #[test]
    fn load_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "database = \"symbols.db\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.database_path(Path::new("ws")), PathBuf::from("ws/symbols.db"));
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
