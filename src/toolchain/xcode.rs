//! xcodebuild invocations.

use crate::core::{ConfigId, PlatformId, Selection, ToolCommand};

pub const XCODEBUILD: &str = "xcodebuild";

/// One compiler invocation for a platform and configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInvocation {
    pub platform: PlatformId,
    pub config: ConfigId,
    pub command: ToolCommand,
}

impl BuildInvocation {
    /// Scheme name, e.g. `iOS - Release`.
    pub fn scheme(&self) -> String {
        scheme_name(self.platform, self.config)
    }
}

pub fn scheme_name(platform: PlatformId, config: ConfigId) -> String {
    format!("{} - {}", platform.sdk_root(), config)
}

/// `xcodebuild -scheme "<sdk> - <config>" -destination <dest> clean build [-quiet]`
pub fn xcodebuild_command(platform: PlatformId, config: ConfigId, quiet: bool) -> ToolCommand {
    let command = ToolCommand::new(XCODEBUILD)
        .arg("-scheme")
        .arg(scheme_name(platform, config))
        .arg("-destination")
        .arg(platform.destination())
        .args(["clean", "build"]);

    if quiet {
        command.arg("-quiet")
    } else {
        command
    }
}

/// Every platform and configuration pair, platforms outermost.
pub fn build_invocations(
    platforms: &Selection<PlatformId>,
    configs: &Selection<ConfigId>,
    quiet: bool,
) -> Vec<BuildInvocation> {
    platforms
        .iter()
        .flat_map(|platform| {
            configs.iter().map(move |config| BuildInvocation {
                platform,
                config,
                command: xcodebuild_command(platform, config, quiet),
            })
        })
        .collect()
}

/// Installed Xcode as reported by `xcodebuild -version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XcodeVersion {
    pub version: String,
    pub build: Option<String>,
}

pub fn version_command() -> ToolCommand {
    ToolCommand::new(XCODEBUILD).arg("-version")
}

/// Parse `Xcode 16.0\nBuild version 16A242d`.
pub fn parse_xcode_version(output: &str) -> Option<XcodeVersion> {
    let mut version = None;
    let mut build = None;

    for line in output.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("Xcode ") {
            version = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("Build version ") {
            build = Some(rest.trim().to_string());
        }
    }

    version.map(|version| XcodeVersion { version, build })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xcodebuild_command() {
        let command = xcodebuild_command(PlatformId::IosSimulator, ConfigId::Release, true);
        assert_eq!(
            command.arguments(),
            &[
                "-scheme",
                "iOS - Release",
                "-destination",
                "generic/platform=iOS Simulator",
                "clean",
                "build",
                "-quiet"
            ]
        );

        let command = xcodebuild_command(PlatformId::Macos, ConfigId::Debug, false);
        assert_eq!(command.flag_value("-scheme"), Some("macOS - Debug"));
        assert!(!command.has_arg("-quiet"));
    }

    #[test]
    fn test_build_invocations_cover_every_pair() {
        let platforms = Selection::of(&[PlatformId::Ios, PlatformId::Macos]);
        let invocations = build_invocations(&platforms, &Selection::all(), false);

        assert_eq!(invocations.len(), 4);
        assert_eq!(invocations[0].scheme(), "iOS - Debug");
        assert_eq!(invocations[3].scheme(), "macOS - Release");
    }

    #[test]
    fn test_parse_xcode_version() {
        let parsed = parse_xcode_version("Xcode 16.0\nBuild version 16A242d\n").unwrap();
        assert_eq!(parsed.version, "16.0");
        assert_eq!(parsed.build.as_deref(), Some("16A242d"));

        assert!(parse_xcode_version("xcode-select: error: tool 'xcodebuild' requires Xcode").is_none());
    }
}
