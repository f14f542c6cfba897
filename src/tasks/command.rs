//! External command tasks

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process;

use tracing::debug;

use super::{CommandKind, TaskError};

/// One single-file command invocation: reads one input, writes one output
/// into the workspace
#[derive(Debug, Clone)]
pub struct Command {
    kind: CommandKind,
    program: String,
    input: PathBuf,
    output: PathBuf,
    flags: Vec<String>,
    source_dir: Option<PathBuf>,
}

impl Command {
    pub fn new(kind: CommandKind, input: impl Into<PathBuf>, workspace: &Path) -> Self {
        let input = input.into();
        let output = workspace.join(product_name(&input, kind.output_extension()));
        Self {
            kind,
            program: kind.default_program().to_string(),
            input,
            output,
            flags: Vec::new(),
            source_dir: None,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_flags(mut self, flags: Vec<String>) -> Self {
        self.flags = flags;
        self
    }

    /// Directory of the original source when `input` is a workspace copy
    pub fn with_source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = Some(dir.into());
        self
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Full argument vector, program first
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![self.program.clone().into()];
        args.extend(self.kind.leading_args().iter().map(OsString::from));
        args.extend(self.flags.iter().map(OsString::from));
        if let Some(dir) = &self.source_dir {
            args.extend(self.kind.source_dir_args(dir).into_iter().map(OsString::from));
        }
        args.push(self.input.clone().into_os_string());
        args.push(self.output.clone().into_os_string());
        args
    }

    pub fn inputs(&self) -> Vec<PathBuf> {
        vec![self.input.clone()]
    }

    pub fn outputs(&self) -> Vec<PathBuf> {
        vec![self.output.clone()]
    }
}

/// Runs a [`Command`] synchronously as a task
#[derive(Debug, Clone)]
pub struct CommandTask {
    command: Command,
}

impl CommandTask {
    pub fn new(command: Command) -> Self {
        Self { command }
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn prerequisites(&self) -> Vec<PathBuf> {
        self.command.inputs()
    }

    pub fn products(&self) -> Vec<PathBuf> {
        self.command.outputs()
    }

    pub fn run(&mut self) -> Result<(), TaskError> {
        let args = self.command.args();
        let rendered = args
            .iter()
            .map(|arg| arg.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        debug!(command = %rendered, "Running");

        let output = process::Command::new(&args[0])
            .args(&args[1..])
            .output()
            .map_err(|source| TaskError::CommandSpawn {
                program: self.command.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(TaskError::CommandFailed {
                command: rendered,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            });
        }

        Ok(())
    }
}

/// File name of a product: the input's name with its last extension
/// replaced by `extension`
pub(crate) fn product_name(input: &Path, extension: &str) -> PathBuf {
    let name = input.file_name().map_or_else(|| input.as_os_str().to_owned(), |n| n.to_owned());
    PathBuf::from(name).with_extension(extension)
}
