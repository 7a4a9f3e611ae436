//! upi-build - build orchestration for native Unity plug-ins.
//!
//! Compiles each plug-in's Xcode project, records which platforms were
//! built, refreshes the Unity projects, and packs them for distribution.

use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use upi_build::core::{AutoPrompter, ConsolePrompter, Prompter};
use upi_build::pipeline::{matching_installation, ordered_plugin_paths};
use upi_build::unity::{plugin_id_from_folder, scan_plugin};
use upi_build::{BuildConfig, BuildOrchestrator, Executor, InstallationRegistry, WarningLog, APP_NAME};

/// Build, test, and pack native Unity plug-ins
#[derive(Parser)]
#[command(name = "upi-build")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (default: .upi-build.toml, then the user config)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Answer prompts from the [prompts] config section
    #[arg(long, global = true)]
    non_interactive: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean, compile, reconcile, test, and pack plug-ins (default)
    Build(BuildArgs),

    /// Report Unity installations and plug-in projects without building
    Scan {
        /// Folder containing the plug-in folders
        #[arg(long, value_name = "DIR")]
        plugin_root: Option<PathBuf>,

        /// Folder searched for Unity.app installations
        #[arg(short = 'u', long = "unity-installation-root", value_name = "DIR")]
        unity_installation_root: Option<PathBuf>,
    },

    /// Show the effective configuration
    Config {
        /// Show config directory path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Args, Debug, Default)]
struct BuildArgs {
    /// Plug-in identifiers to process, or "all"
    #[arg(short = 'p', long = "plugin-list", num_args = 1.., value_name = "ID")]
    plugin_list: Vec<String>,

    /// Platforms: iOS, iPhoneSimulator, tvOS, AppleTVSimulator, macOS, visionOS, VisionSimulator, simulators, devices, all
    #[arg(short = 'm', long, num_args = 1.., value_name = "PLATFORM")]
    platforms: Vec<String>,

    /// Build configurations: Debug, Release, all
    #[arg(long = "build-config", num_args = 1.., value_name = "CONFIG")]
    build_config: Vec<String>,

    /// Build actions: build, pack, none, all
    #[arg(short = 'b', long = "build-action", num_args = 1.., value_name = "ACTION")]
    build_action: Vec<String>,

    /// Clean actions: native, packages, tests, none, all
    #[arg(short = 'k', long = "clean-action", num_args = 1.., value_name = "ACTION")]
    clean_action: Vec<String>,

    /// Delete folders without asking
    #[arg(short, long)]
    force: bool,

    /// Build Unity test players
    #[arg(short, long)]
    test: bool,

    /// Package output folder
    #[arg(short, long = "output-path", value_name = "DIR")]
    output_path: Option<PathBuf>,

    /// Test build output folder
    #[arg(long, value_name = "DIR")]
    test_output_path: Option<PathBuf>,

    /// Folder searched for Unity.app installations
    #[arg(short = 'u', long = "unity-installation-root", value_name = "DIR")]
    unity_installation_root: Option<PathBuf>,

    /// Codesign identity hash, or "prompt" to choose one
    #[arg(short = 'c', long, value_name = "IDENTITY")]
    codesign_identity: Option<String>,

    /// Folder containing the plug-in folders
    #[arg(long, value_name = "DIR")]
    plugin_root: Option<PathBuf>,

    /// Show full xcodebuild output
    #[arg(long)]
    no_quiet: bool,

    /// Do not open projects in Unity after building
    #[arg(long)]
    no_touch: bool,
}

impl BuildArgs {
    /// Override configuration with the flags that were given.
    fn apply(self, config: &mut BuildConfig) {
        let build = &mut config.build;
        if !self.plugin_list.is_empty() {
            build.plugins = self.plugin_list;
        }
        if !self.platforms.is_empty() {
            build.platforms = self.platforms;
        }
        if !self.build_config.is_empty() {
            build.configs = self.build_config;
        }
        if !self.build_action.is_empty() {
            build.actions = self.build_action;
        }
        if !self.clean_action.is_empty() {
            build.clean = self.clean_action;
        }
        build.force_clean |= self.force;
        build.build_tests |= self.test;
        build.quiet &= !self.no_quiet;
        build.touch_projects &= !self.no_touch;

        let paths = &mut config.paths;
        if let Some(path) = self.output_path {
            paths.output = path;
        }
        if let Some(path) = self.test_output_path {
            paths.test_output = path;
        }
        if let Some(path) = self.unity_installation_root {
            paths.unity_install_root = path;
        }
        if let Some(path) = self.plugin_root {
            paths.plugin_root = path;
        }
        if let Some(identity) = self.codesign_identity {
            config.codesign.identity = identity;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));

    tracing_subscriber::registry().with(fmt::layer().with_target(false).with_writer(io::stderr)).with(filter).init();

    if let Some(Commands::Completions { shell }) = cli.command {
        cmd_completions(shell);
        return Ok(());
    }

    let mut config = BuildConfig::load(cli.config.as_deref())?;

    match cli.command {
        None => cmd_build(BuildArgs::default(), &mut config, cli.non_interactive)?,
        Some(Commands::Build(args)) => cmd_build(args, &mut config, cli.non_interactive)?,
        Some(Commands::Scan { plugin_root, unity_installation_root }) => {
            if let Some(path) = plugin_root {
                config.paths.plugin_root = path;
            }
            if let Some(path) = unity_installation_root {
                config.paths.unity_install_root = path;
            }
            cmd_scan(&config)?;
        }
        Some(Commands::Config { path }) => cmd_config(&config, path)?,
        Some(Commands::Completions { .. }) => {}
    }

    Ok(())
}

/// Run the full pipeline.
fn cmd_build(args: BuildArgs, config: &mut BuildConfig, non_interactive: bool) -> Result<()> {
    args.apply(config);
    let options = config.resolve();
    let runner = Executor::new();

    let interactive = config.prompts.interactive && !non_interactive && io::stdin().is_terminal();
    let mut console;
    let mut auto;
    let prompter: &mut dyn Prompter = if interactive {
        console = ConsolePrompter::stdio();
        &mut console
    } else {
        auto = AutoPrompter::from_config(&config.prompts, options.force_clean);
        &mut auto
    };

    let report = BuildOrchestrator::new(&options, &runner, prompter).run()?;

    println!();
    print!("{}", report.render_summary());
    Ok(())
}

/// List installations and plug-in projects.
fn cmd_scan(config: &BuildConfig) -> Result<()> {
    let options = config.resolve();
    let runner = Executor::new();
    let mut warnings = WarningLog::new();

    let registry = InstallationRegistry::scan(&options.unity_install_root, &runner, &mut warnings);
    println!("Unity installations in {}:", options.unity_install_root.display());
    for installation in registry.installations() {
        println!("  {:<14} {}", installation.version, installation.app_path.display());
    }
    if registry.is_empty() {
        println!("  (none)");
    }

    println!();
    println!("Plug-ins in {}:", options.plugin_root.display());
    let paths = ordered_plugin_paths(&options.plugin_root)
        .with_context(|| format!("Failed to read plug-in root {}", options.plugin_root.display()))?;
    for path in paths {
        match scan_plugin(&path, &mut warnings) {
            Ok(plugin) => {
                let status = if matching_installation(&plugin, &registry).is_some() { "installed" } else { "not installed" };
                println!(
                    "  {:<20} Unity {} ({status}), {} test assemblies",
                    plugin.id,
                    plugin.unity_project.version,
                    plugin.unity_project.test_assemblies.len()
                );
            }
            Err(e) => println!("  {:<20} skipped: {e}", plugin_id_from_folder(&path)),
        }
    }

    if !warnings.is_empty() {
        println!();
        println!("Warnings ({}):", warnings.len());
        for warning in warnings.entries() {
            println!("  - {warning}");
        }
    }
    Ok(())
}

/// Show configuration.
fn cmd_config(config: &BuildConfig, show_path: bool) -> Result<()> {
    if show_path {
        if let Some(path) = BuildConfig::config_dir() {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let toml = toml::to_string_pretty(config)?;
    println!("{toml}");
    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
}
