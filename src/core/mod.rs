//! Core types shared by every stage: configuration, option sets, process
//! execution, prompts, and the warning log.

mod config;
mod executor;
mod options;
mod prompt;
mod warnings;
mod workdir;

#[cfg(test)]
pub(crate) use executor::fake;

pub use config::{
    BuildConfig, BuildSettings, CodesignConfig, PathsConfig, PromptConfig, LOCAL_CONFIG_FILE,
};
pub use executor::{CommandRunner, Executor, ToolCommand, ToolOutput};
pub use options::{
    BuildAction, CleanAction, ConfigId, PlatformId, PluginSelection, RunOptions, Selectable,
    Selection,
};
pub use prompt::{AutoPrompter, ConsolePrompter, Decision, Prompter};
pub use warnings::{RunWarning, WarningLog};
pub use workdir::WorkingDirGuard;
