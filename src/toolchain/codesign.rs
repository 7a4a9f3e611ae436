//! Code signing of compiled libraries.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::{CommandRunner, Decision, Prompter, ToolCommand};

/// Identity value that asks for an identity at run time.
pub const PROMPT_IDENTITY: &str = "prompt";

/// `  1) 0123ABCD... "Apple Development: Jane Doe (TEAM123456)"`
static IDENTITY_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*\d+\)\s+([0-9A-Fa-f]{40})\s+"(.+)"\s*$"#).unwrap());

/// A signing identity from the keychain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodesignIdentity {
    pub hash: String,
    pub name: String,
}

/// Sign one artifact, keeping its identifier and entitlements.
pub fn codesign_command(identity: &str, artifact: &Path) -> ToolCommand {
    ToolCommand::new("codesign")
        .args(["--force", "--sign", identity, "--timestamp=none"])
        .arg("--preserve-metadata=identifier,entitlements,flags")
        .arg("--generate-entitlement-der")
        .arg(artifact)
}

pub fn find_identities_command() -> ToolCommand {
    ToolCommand::new("security").args(["find-identity", "-v", "-p", "codesigning"])
}

/// Parse `security find-identity` output.
pub fn parse_codesign_identities(output: &str) -> Vec<CodesignIdentity> {
    output
        .lines()
        .filter_map(|line| IDENTITY_LINE.captures(line))
        .map(|caps| CodesignIdentity { hash: caps[1].to_string(), name: caps[2].to_string() })
        .collect()
}

/// Resolve the configured identity into the hash to sign with.
///
/// An empty value disables signing. [`PROMPT_IDENTITY`] asks whether to sign
/// and, if so, which keychain identity to use.
pub fn select_codesign_identity(
    configured: &str,
    runner: &dyn CommandRunner,
    prompter: &mut dyn Prompter,
) -> anyhow::Result<Option<String>> {
    let configured = configured.trim();
    if configured.is_empty() {
        return Ok(None);
    }
    if !configured.eq_ignore_ascii_case(PROMPT_IDENTITY) {
        return Ok(Some(configured.to_string()));
    }

    if !prompter.confirm(Decision::SignLibraries, "Codesign compiled libraries?")? {
        return Ok(None);
    }

    let output = runner.run(&find_identities_command())?;
    let identities = parse_codesign_identities(&output.stdout);
    if identities.is_empty() {
        tracing::warn!("No valid codesigning identities found; libraries will not be signed");
        return Ok(None);
    }

    let options: Vec<String> = identities.iter().map(|i| format!("{} ({})", i.name, i.hash)).collect();
    let index = prompter.select("Select a codesigning identity:", &options)?;
    let chosen = identities.get(index).ok_or_else(|| anyhow::anyhow!("Invalid identity selection {index}"))?;

    tracing::info!(identity = %chosen.name, "Signing libraries");
    Ok(Some(chosen.hash.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fake::FakeRunner;
    use crate::core::{AutoPrompter, ToolOutput};

    const FIND_IDENTITY_OUTPUT: &str = r#"
Policy: Code Signing
  Matching identities
  1) 0123456789ABCDEF0123456789ABCDEF01234567 "Apple Development: Jane Doe (TEAM123456)"
  2) 89ABCDEF0123456789ABCDEF0123456789ABCDEF "Developer ID Application: Example Corp (TEAM654321)"
     2 valid identities found
"#;

    struct Answers {
        sign: bool,
        choice: usize,
    }

    impl Prompter for Answers {
        fn confirm(&mut self, _: Decision, _: &str) -> anyhow::Result<bool> {
            Ok(self.sign)
        }

        fn select(&mut self, _: &str, _: &[String]) -> anyhow::Result<usize> {
            Ok(self.choice)
        }
    }

    #[test]
    fn test_parse_identities() {
        let identities = parse_codesign_identities(FIND_IDENTITY_OUTPUT);
        assert_eq!(identities.len(), 2);
        assert_eq!(identities[0].hash, "0123456789ABCDEF0123456789ABCDEF01234567");
        assert_eq!(identities[1].name, "Developer ID Application: Example Corp (TEAM654321)");
    }

    #[test]
    fn test_codesign_command() {
        let command = codesign_command("ABC", Path::new("/lib/Core.bundle"));
        assert_eq!(command.program(), "codesign");
        assert_eq!(command.flag_value("--sign"), Some("ABC"));
        assert!(command.has_arg("--generate-entitlement-der"));
        assert_eq!(command.arguments().last().map(String::as_str), Some("/lib/Core.bundle"));
    }

    #[test]
    fn test_explicit_and_empty_identity() {
        let runner = FakeRunner::succeeding();
        let mut prompter = AutoPrompter::default();

        assert_eq!(select_codesign_identity("", &runner, &mut prompter).unwrap(), None);
        assert_eq!(select_codesign_identity("ABC", &runner, &mut prompter).unwrap(), Some("ABC".into()));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_prompt_identity_selection() {
        let runner = FakeRunner::new(|_| ToolOutput::ok(FIND_IDENTITY_OUTPUT));
        let mut prompter = Answers { sign: true, choice: 1 };

        let chosen = select_codesign_identity("prompt", &runner, &mut prompter).unwrap();
        assert_eq!(chosen.as_deref(), Some("89ABCDEF0123456789ABCDEF0123456789ABCDEF"));
    }

    #[test]
    fn test_prompt_identity_declined() {
        let runner = FakeRunner::new(|_| ToolOutput::ok(FIND_IDENTITY_OUTPUT));
        let mut prompter = Answers { sign: false, choice: 0 };

        assert_eq!(select_codesign_identity("prompt", &runner, &mut prompter).unwrap(), None);
        assert!(runner.calls().is_empty());
    }
}
