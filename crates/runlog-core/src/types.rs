//! Core types for RunLog

use std::fmt;
use std::str::FromStr;

use crate::constants::MAX_RUN_ID_LEN;
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Valid run ids: alphanumeric first character, then alphanumerics, dot, underscore, hyphen.
/// A leading dot is refused so `.` and `..` can never name a log.
static RUN_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]*$").expect("Invalid run id regex")
});

/// Validate a run id to prevent path traversal out of the logs directory
pub fn validate_run_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_RUN_ID_LEN && RUN_ID_REGEX.is_match(id)
}

/// Identifier of one run's log. Safe to join onto the logs directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    /// Parse and validate a run id
    pub fn parse(s: &str) -> Result<Self> {
        if validate_run_id(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::InvalidRunId(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RunId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_run_ids() {
        for id in ["build-42", "run_1", "a", "nightly.2025-01-03", "X9"] {
            assert!(RunId::parse(id).is_ok(), "{} should be valid", id);
        }
    }

    #[test]
    fn test_rejects_traversal() {
        for id in ["", ".", "..", "../etc/passwd", "a/b", "a\\b", ".hidden", "run id", "a\0b"] {
            assert!(
                matches!(RunId::parse(id), Err(Error::InvalidRunId(_))),
                "{:?} should be rejected",
                id
            );
        }
    }

    #[test]
    fn test_rejects_overlong() {
        let id = "a".repeat(MAX_RUN_ID_LEN + 1);
        assert!(RunId::parse(&id).is_err());
        assert!(RunId::parse(&id[..MAX_RUN_ID_LEN]).is_ok());
    }

    #[test]
    fn test_display_and_from_str() {
        let id: RunId = "deploy-7".parse().unwrap();
        assert_eq!(id.to_string(), "deploy-7");
        assert_eq!(id.as_str(), "deploy-7");
    }
}
