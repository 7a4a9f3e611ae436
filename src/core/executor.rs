//! External tool execution.
//!
//! Every compiler, codesign, archiver, and Unity invocation goes through the
//! [`CommandRunner`] trait so the pipeline can be driven by a scripted runner
//! in tests. Calls block until the child exits; no timeout is applied.

use std::ffi::OsStr;
use std::fmt;
use std::process::{Command as ProcessCommand, Stdio};
use std::time::{Duration, Instant};

/// An external program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
}

impl ToolCommand {
    /// Create a command for `program` with no arguments.
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self { program: program.as_ref().to_string_lossy().into_owned(), args: Vec::new() }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(args.into_iter().map(|a| a.as_ref().to_string_lossy().into_owned()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Value following `flag`, if present.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        let pos = self.args.iter().position(|a| a == flag)?;
        self.args.get(pos + 1).map(String::as_str)
    }

    /// Whether `arg` appears anywhere in the argument list.
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Result of running an external tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Exit code (`None` when terminated by a signal)
    pub code: Option<i32>,

    /// Captured standard output
    pub stdout: String,

    /// Captured standard error
    pub stderr: String,

    /// Time taken to execute
    pub duration: Duration,
}

impl ToolOutput {
    pub fn new(code: Option<i32>, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self { code, stdout: stdout.into(), stderr: stderr.into(), duration: Duration::ZERO }
    }

    /// Successful exit with the given standard output.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self::new(Some(0), stdout, "")
    }

    /// Failed exit with the given code and standard output.
    pub fn failed(code: i32, stdout: impl Into<String>) -> Self {
        Self::new(Some(code), stdout, "")
    }

    /// Check if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Standard output followed by standard error.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Runs external tools to completion.
pub trait CommandRunner {
    fn run(&self, command: &ToolCommand) -> anyhow::Result<ToolOutput>;
}

/// Runs commands as child processes of the current working directory.
#[derive(Debug, Default)]
pub struct Executor;

impl Executor {
    /// Create a new executor.
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for Executor {
    fn run(&self, command: &ToolCommand) -> anyhow::Result<ToolOutput> {
        let start = Instant::now();

        tracing::debug!(command = %command, "Running");

        let output = ProcessCommand::new(command.program())
            .args(command.arguments())
            .stdin(Stdio::null())
            .output()
            .map_err(|e| anyhow::anyhow!("Failed to launch {}: {e}", command.program()))?;

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration: start.elapsed(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let command = ToolCommand::new("xcodebuild").arg("-scheme").arg("iOS - Release").args(["clean", "build"]);

        assert_eq!(command.program(), "xcodebuild");
        assert_eq!(command.arguments().len(), 4);
        assert_eq!(command.flag_value("-scheme"), Some("iOS - Release"));
        assert!(command.has_arg("clean"));
        assert_eq!(command.to_string(), "xcodebuild -scheme \"iOS - Release\" clean build");
    }

    #[test]
    fn test_execute_simple_command() {
        let command = ToolCommand::new("sh").args(["-c", "echo hello; echo oops >&2"]);

        let result = Executor::new().run(&command).unwrap();
        assert!(result.success());
        assert!(result.stdout.contains("hello"));
        assert!(result.combined().contains("oops"));
    }

    #[test]
    fn test_execution_result() {
        let result = Executor::new().run(&ToolCommand::new("true")).unwrap();
        assert!(result.success());
        assert_eq!(result.code, Some(0));

        let result = Executor::new().run(&ToolCommand::new("false")).unwrap();
        assert!(!result.success());
        assert_eq!(result.code, Some(1));
    }

    #[test]
    fn test_missing_program_is_an_error() {
        let result = Executor::new().run(&ToolCommand::new("definitely-not-a-real-tool-upi"));
        assert!(result.is_err());
    }

    #[test]
    fn test_combined_output() {
        assert_eq!(ToolOutput::new(Some(1), "", "err").combined(), "err");
        assert_eq!(ToolOutput::new(Some(1), "out\n", "err").combined(), "out\nerr");
        assert_eq!(ToolOutput::ok("out").combined(), "out");
    }
}
