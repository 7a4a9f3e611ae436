//! Decision points that need an answer from the user.
//!
//! The pipeline never reads the terminal directly. It asks a [`Prompter`],
//! which is either the console or a fixed set of answers taken from the
//! `[prompts]` config section for unattended runs.

use std::io::{self, BufRead, Write};

use super::config::PromptConfig;

/// The questions the pipeline can ask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// A compiler invocation failed; keep building the remaining targets?
    ContinueAfterBuildFailure,
    /// Delete a folder during clean?
    DeleteFolder,
    /// Upgrade projects that have no matching Unity installation?
    UpgradeProjects,
    /// Codesign compiled libraries?
    SignLibraries,
}

/// Source of answers for interactive decision points.
pub trait Prompter {
    /// Ask a yes/no question.
    fn confirm(&mut self, decision: Decision, prompt: &str) -> anyhow::Result<bool>;

    /// Ask the user to pick one of `options`, returning its index.
    fn select(&mut self, prompt: &str, options: &[String]) -> anyhow::Result<usize>;
}

/// Prompts on a terminal.
pub struct ConsolePrompter<R, W> {
    input: R,
    output: W,
}

impl ConsolePrompter<io::StdinLock<'static>, io::Stdout> {
    /// Prompter bound to the process stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsolePrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_answer(&mut self) -> anyhow::Result<String> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            anyhow::bail!("Input closed while waiting for an answer");
        }
        Ok(line.trim().to_string())
    }
}

impl<R: BufRead, W: Write> Prompter for ConsolePrompter<R, W> {
    fn confirm(&mut self, _decision: Decision, prompt: &str) -> anyhow::Result<bool> {
        loop {
            write!(self.output, "{prompt} [Y/n] ")?;
            self.output.flush()?;

            match self.read_answer()?.as_str() {
                "Y" | "y" => return Ok(true),
                "N" | "n" => return Ok(false),
                other => writeln!(self.output, "Please answer Y or n (got '{other}')")?,
            }
        }
    }

    fn select(&mut self, prompt: &str, options: &[String]) -> anyhow::Result<usize> {
        match options.len() {
            0 => anyhow::bail!("Nothing to choose from: {prompt}"),
            1 => return Ok(0),
            _ => {}
        }

        writeln!(self.output, "{prompt}")?;
        for (index, option) in options.iter().enumerate() {
            writeln!(self.output, "  [{index}] {option}")?;
        }

        loop {
            write!(self.output, "Enter a number between 0 and {}: ", options.len() - 1)?;
            self.output.flush()?;

            let answer = self.read_answer()?;
            match answer.parse::<usize>() {
                Ok(index) if index < options.len() => return Ok(index),
                _ => writeln!(self.output, "Invalid selection '{answer}'")?,
            }
        }
    }
}

/// Answers every question from configuration without reading input.
#[derive(Debug, Clone)]
pub struct AutoPrompter {
    continue_on_build_failure: bool,
    delete_folders: bool,
    upgrade_projects: bool,
}

impl AutoPrompter {
    /// Build from the `[prompts]` section. `force` approves folder deletion.
    pub fn from_config(config: &PromptConfig, force: bool) -> Self {
        Self {
            continue_on_build_failure: config.continue_on_build_failure,
            delete_folders: config.confirm_deletion || force,
            upgrade_projects: config.upgrade_projects,
        }
    }
}

impl Default for AutoPrompter {
    fn default() -> Self {
        Self::from_config(&PromptConfig::default(), false)
    }
}

impl Prompter for AutoPrompter {
    fn confirm(&mut self, decision: Decision, prompt: &str) -> anyhow::Result<bool> {
        let answer = match decision {
            Decision::ContinueAfterBuildFailure => self.continue_on_build_failure,
            Decision::DeleteFolder => self.delete_folders,
            Decision::UpgradeProjects => self.upgrade_projects,
            Decision::SignLibraries => false,
        };
        tracing::info!(?decision, answer, "{prompt}");
        Ok(answer)
    }

    fn select(&mut self, prompt: &str, options: &[String]) -> anyhow::Result<usize> {
        if options.is_empty() {
            anyhow::bail!("Nothing to choose from: {prompt}");
        }
        tracing::info!(choice = %options[0], "{prompt}");
        Ok(0)
    }
}
