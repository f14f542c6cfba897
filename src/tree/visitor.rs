//! Rule-based dispatch of source files to tasks

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, warn};

use super::{TaskFailure, TreeVisitor, WalkError, WalkSummary};
use crate::storage::SharedStore;
use crate::tasks::{
    file_source, Analyser, Command, CommandKind, CommandTask, HandlerKind, Task, TaskError,
    TextModifier,
};

/// Runs (or schedules) a constructed task
pub type TaskHandler<'a> = Box<dyn FnMut(&mut Task) -> Result<(), TaskError> + 'a>;

/// A dispatch rule: files whose path matches `pattern` go to `handler`
///
/// The pattern is anchored at the start of the path.
#[derive(Debug, Clone)]
pub struct SourceRule {
    source: String,
    pattern: Regex,
    handler: String,
}

impl SourceRule {
    pub fn new(pattern: &str, handler: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            source: pattern.to_string(),
            pattern: Regex::new(&format!("^(?:{pattern})"))?,
            handler: handler.into(),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.source
    }

    pub fn handler(&self) -> &str {
        &self.handler
    }

    pub fn matches(&self, candidate: &Path) -> bool {
        self.pattern.is_match(&candidate.to_string_lossy())
    }
}

/// Dispatches each visited file to the task its last matching rule names
pub struct SourceVisitor<'a> {
    rules: Vec<SourceRule>,
    flags: HashMap<CommandKind, Vec<String>>,
    programs: HashMap<CommandKind, String>,
    store: SharedStore,
    workspace: PathBuf,
    task_handler: TaskHandler<'a>,
    /// Product path to the walked source it was derived from
    origins: HashMap<PathBuf, PathBuf>,
    summary: WalkSummary,
}

impl<'a> SourceVisitor<'a> {
    /// A visitor that runs each task as soon as it is built
    pub fn new(rules: Vec<SourceRule>, store: SharedStore, workspace: impl Into<PathBuf>) -> Self {
        Self {
            rules,
            flags: HashMap::new(),
            programs: HashMap::new(),
            store,
            workspace: workspace.into(),
            task_handler: Box::new(|task: &mut Task| task.run()),
            origins: HashMap::new(),
            summary: WalkSummary::default(),
        }
    }

    pub fn with_flags(mut self, flags: HashMap<CommandKind, Vec<String>>) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_programs(mut self, programs: HashMap<CommandKind, String>) -> Self {
        self.programs = programs;
        self
    }

    pub fn with_task_handler(
        mut self,
        handler: impl FnMut(&mut Task) -> Result<(), TaskError> + 'a,
    ) -> Self {
        self.task_handler = Box::new(handler);
        self
    }

    /// The rule that decides a candidate: the last one that matches
    pub fn rule_for(&self, candidate: &Path) -> Option<&SourceRule> {
        self.rules.iter().filter(|rule| rule.matches(candidate)).last()
    }

    pub fn summary(&self) -> &WalkSummary {
        &self.summary
    }

    pub fn into_summary(self) -> WalkSummary {
        self.summary
    }

    /// The walked source `file` was derived from, or `file` itself
    pub fn origin_of<'p>(&'p self, file: &'p Path) -> &'p Path {
        self.origins.get(file).map(PathBuf::as_path).unwrap_or(file)
    }

    fn build_task(&self, kind: HandlerKind, file: &Path) -> Task {
        match kind {
            HandlerKind::Analyser(kind) => {
                Task::Analyser(Analyser::new(kind, file_source(file), self.store.clone()))
            }
            HandlerKind::Command(kind) => {
                let mut command = Command::new(kind, file, &self.workspace)
                    .with_flags(self.flags.get(&kind).cloned().unwrap_or_default());
                if let Some(program) = self.programs.get(&kind) {
                    command = command.with_program(program.clone());
                }
                let origin = self.origin_of(file);
                if origin != file {
                    if let Some(dir) = origin.parent() {
                        command = command.with_source_dir(dir);
                    }
                }
                Task::Command(CommandTask::new(command))
            }
            HandlerKind::TextModifier(kind) => {
                Task::TextModifier(TextModifier::new(kind, &self.workspace, file_source(file)))
            }
        }
    }
}

impl SourceVisitor<'_> {
    /// Notes where `product` came from, flagging products two sources share
    fn record_origin(&mut self, product: &Path, origin: &Path) {
        let product = product
            .canonicalize()
            .unwrap_or_else(|_| product.to_path_buf());

        if let Some(previous) = self.origins.insert(product.clone(), origin.to_path_buf()) {
            if previous != origin {
                warn!(
                    product = %product.display(),
                    first = %previous.display(),
                    second = %origin.display(),
                    "Product overwritten by another source"
                );
                self.summary.shadowed.push(product);
            }
        }
    }
}

impl TreeVisitor for SourceVisitor<'_> {
    fn visit(&mut self, candidate: &Path) -> Result<Vec<PathBuf>, WalkError> {
        self.summary.visited += 1;

        let Some(rule) = self.rule_for(candidate) else {
            debug!(file = %candidate.display(), "No rule matches");
            return Ok(Vec::new());
        };

        let kind =
            HandlerKind::from_name(rule.handler()).ok_or_else(|| WalkError::UnrecognizedHandler {
                file: candidate.to_path_buf(),
                pattern: rule.pattern().to_string(),
                handler: rule.handler().to_string(),
            })?;

        let file = candidate
            .canonicalize()
            .unwrap_or_else(|_| candidate.to_path_buf());
        debug!(file = %file.display(), handler = %kind, "Dispatching");

        let mut task = self.build_task(kind, &file);
        match (self.task_handler)(&mut task) {
            Ok(()) => {
                let products = task.products();
                self.summary.tasks += 1;
                self.summary.products += products.len();
                let origin = self.origin_of(&file).to_path_buf();
                for product in &products {
                    self.record_origin(product, &origin);
                }
                Ok(products)
            }
            Err(err) => {
                warn!(file = %file.display(), handler = %kind, error = %err, "Task failed");
                self.summary.failures.push(TaskFailure {
                    file,
                    handler: kind.name().to_string(),
                    error: err.to_string(),
                });
                Ok(Vec::new())
            }
        }
    }
}
