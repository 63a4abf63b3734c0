//! Operator identity resolution.
//!
//! Every console instance runs on behalf of exactly one operator. The
//! identity gates startup (no identity, no console) and filters multi-tenant
//! record streams, so resolution failures are fatal here rather than
//! deferred to the first arrival.

use std::fmt;
use std::fs;

use tracing::debug;

use crate::config::ConsoleConfig;
use crate::errors::FlowError;

/// A validated operator identity of the form `oNNNNN`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OperatorId(String);

impl OperatorId {
    /// Resolve the identity for `config`, trying in order: the explicit
    /// override, the login-style user token, then the identity file.
    ///
    /// All three failing is a [`FlowError::Configuration`] and must abort
    /// console startup.
    pub fn resolve(config: &ConsoleConfig) -> Result<Self, FlowError> {
        if let Some(id) = &config.operator_override {
            return Self::parse(id);
        }
        if let Some(token) = &config.user_token {
            if let Some(id) = Self::from_user_token(token) {
                return Ok(id);
            }
            debug!(token, "user token does not carry an operator id");
        }
        let text = fs::read_to_string(&config.identity_file).map_err(|error| {
            FlowError::Configuration(format!(
                "could not read identity file '{}': {error}",
                config.identity_file.display()
            ))
        })?;
        Self::parse(text.trim())
    }

    /// Validate `text` as an operator id: one ASCII lowercase letter
    /// followed by exactly five digits.
    pub fn parse(text: &str) -> Result<Self, FlowError> {
        let mut chars = text.chars();
        let head_ok = matches!(chars.next(), Some(c) if c.is_ascii_lowercase());
        let digits: Vec<char> = chars.collect();
        if head_ok && digits.len() == 5 && digits.iter().all(|c| c.is_ascii_digit()) {
            Ok(Self(text.to_string()))
        } else {
            Err(FlowError::Configuration(format!(
                "operator id '{text}' does not match the expected format (oNNNNN)"
            )))
        }
    }

    /// Extract an identity from a login-style token.
    ///
    /// Both `u`- and `o`-prefixed accounts map to the same `oNNNNN`
    /// identity; anything else yields `None`.
    pub fn from_user_token(token: &str) -> Option<Self> {
        let digits = token.strip_prefix('u').or_else(|| token.strip_prefix('o'))?;
        if digits.len() == 5 && digits.chars().all(|c| c.is_ascii_digit()) {
            Some(Self(format!("o{digits}")))
        } else {
            None
        }
    }

    /// The identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_with(override_id: Option<&str>, token: Option<&str>) -> ConsoleConfig {
        ConsoleConfig {
            operator_override: override_id.map(|s| s.to_string()),
            user_token: token.map(|s| s.to_string()),
            identity_file: std::path::PathBuf::from("/nonexistent/.operator_id"),
            ..ConsoleConfig::default()
        }
    }

    #[test]
    fn parse_accepts_letter_plus_five_digits() {
        assert_eq!(OperatorId::parse("o12345").unwrap().as_str(), "o12345");
        assert!(OperatorId::parse("o1234").is_err());
        assert!(OperatorId::parse("o123456").is_err());
        assert!(OperatorId::parse("O12345").is_err());
        assert!(OperatorId::parse("12345o").is_err());
        assert!(OperatorId::parse("").is_err());
    }

    #[test]
    fn user_token_normalizes_u_accounts() {
        assert_eq!(
            OperatorId::from_user_token("u54321").unwrap().as_str(),
            "o54321"
        );
        assert_eq!(
            OperatorId::from_user_token("o54321").unwrap().as_str(),
            "o54321"
        );
        assert!(OperatorId::from_user_token("observer").is_none());
        assert!(OperatorId::from_user_token("x54321").is_none());
    }

    #[test]
    fn resolve_prefers_override_over_token() {
        let config = config_with(Some("o11111"), Some("u22222"));
        assert_eq!(OperatorId::resolve(&config).unwrap().as_str(), "o11111");
    }

    #[test]
    fn resolve_falls_back_to_identity_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".operator_id");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "o33333").unwrap();

        let mut config = config_with(None, Some("observer"));
        config.identity_file = path;
        assert_eq!(OperatorId::resolve(&config).unwrap().as_str(), "o33333");
    }

    #[test]
    fn resolve_without_any_source_is_fatal() {
        let config = config_with(None, None);
        assert!(matches!(
            OperatorId::resolve(&config),
            Err(FlowError::Configuration(_))
        ));
    }
}
