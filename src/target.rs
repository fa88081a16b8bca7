//! Build flavors a module tree can be specialized for.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The platform flavor a build is being produced for.
///
/// Exactly one is active for a whole build invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetEnvironment {
    /// Server runtime with native crypto and codecs
    Server,
    /// Browser bundle relying on platform globals
    Browser,
    /// Browser bundle shipping vendored codec fallbacks
    BrowserVendored,
}

impl TargetEnvironment {
    pub const ALL: [TargetEnvironment; 3] = [
        TargetEnvironment::Server,
        TargetEnvironment::Browser,
        TargetEnvironment::BrowserVendored,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TargetEnvironment::Server => "server",
            TargetEnvironment::Browser => "browser",
            TargetEnvironment::BrowserVendored => "browser-vendored",
        }
    }
}

impl fmt::Display for TargetEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown target environment '{0}' (expected one of: server, browser, browser-vendored)")]
pub struct ParseTargetError(pub String);

impl FromStr for TargetEnvironment {
    type Err = ParseTargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        TargetEnvironment::ALL
            .into_iter()
            .find(|target| target.as_str() == normalized)
            .ok_or_else(|| ParseTargetError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_display() {
        for target in TargetEnvironment::ALL {
            assert_eq!(target.to_string().parse::<TargetEnvironment>(), Ok(target));
        }
    }

    #[test]
    fn test_parse_is_lenient_about_case_and_underscores() {
        assert_eq!(
            "Browser_Vendored".parse::<TargetEnvironment>(),
            Ok(TargetEnvironment::BrowserVendored)
        );
        assert_eq!(" SERVER ".parse::<TargetEnvironment>(), Ok(TargetEnvironment::Server));
    }

    #[test]
    fn test_parse_unknown() {
        let err = "deno".parse::<TargetEnvironment>().unwrap_err();
        assert!(err.to_string().contains("deno"));
    }
}
