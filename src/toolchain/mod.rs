//! Command builders and output parsers for the Apple toolchain.

mod codesign;
mod xcode;

pub use codesign::{
    codesign_command, find_identities_command, parse_codesign_identities, select_codesign_identity,
    CodesignIdentity, PROMPT_IDENTITY,
};
pub use xcode::{
    build_invocations, parse_xcode_version, scheme_name, version_command, xcodebuild_command,
    BuildInvocation, XcodeVersion, XCODEBUILD,
};
