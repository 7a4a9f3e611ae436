#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::case_sensitive_file_extension_comparisons)]

//! # upi-build
//!
//! Build orchestration for native Unity plug-ins.
//!
//! Each plug-in folder pairs an Xcode project with a Unity project. A run
//! compiles the native libraries for every selected platform and
//! configuration, works out which platforms actually produced output, opens
//! the Unity projects with a matching editor so `.meta` files are
//! regenerated, and archives each plug-in into a `.tgz` package.
//!
//! ## Stages
//!
//! - **Clean**: remove native libraries, packages, or test output
//! - **Compile**: one `xcodebuild` invocation per platform and configuration
//! - **Discover**: rebuild the supported platform map from compiler output
//! - **Reconcile**: touch projects with their own editor, offer upgrades for the rest
//! - **Test**: build Unity test players per platform
//! - **Pack**: archive each registered plug-in
//!
//! ## Quick Start
//!
//! ```bash
//! # Build and pack every plug-in for every platform
//! upi-build
//!
//! # Core and PHASE for iOS only, Debug and Release
//! upi-build build -p Core PHASE -m iOS --build-config all
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod core;
pub mod pipeline;
pub mod toolchain;
pub mod unity;

// Re-export commonly used types
pub use core::{BuildConfig, CommandRunner, Executor, Prompter, RunOptions, RunWarning, WarningLog};
pub use pipeline::{BuildOrchestrator, PluginOutcome, ResultsTable, RunReport};
pub use unity::{InstallationRegistry, NativePlugin, UnityInstallation, UnityProject};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "upi-build";
