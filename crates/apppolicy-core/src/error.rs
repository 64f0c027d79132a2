//! Error taxonomy for rule loading, pack verification and evaluation.
//!
//! Every variant is a deterministic validation failure: nothing here is retried and
//! nothing is downgraded. Callers that need to alert on trust failures match on
//! [`PolicyError::BadSignature`] / [`PolicyError::TrustConfiguration`] directly.

use std::path::PathBuf;

/// Errors raised by the policy core.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// Input bytes are not valid in their declared syntax (JSON, YAML, gzip/tar, hex).
    #[error("ParseError: {origin}: {message}")]
    Parse { origin: String, message: String },

    /// Input parsed but violates a structural contract.
    #[error("SchemaError: {origin}: {message}")]
    Schema { origin: String, message: String },

    /// Cryptographic verification of a rule pack failed.
    #[error("BadSignatureError: {reason}")]
    BadSignature { reason: String },

    /// No usable trust anchor, or the pack signer is not part of it.
    #[error("TrustConfigurationError: {reason}")]
    TrustConfiguration { reason: String },

    /// A path could not be read.
    #[error("IoError: failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl PolicyError {
    pub(crate) fn parse(origin: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            origin: origin.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn schema(origin: impl Into<String>, message: impl ToString) -> Self {
        Self::Schema {
            origin: origin.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn bad_signature(reason: impl Into<String>) -> Self {
        Self::BadSignature {
            reason: reason.into(),
        }
    }

    pub(crate) fn trust(reason: impl Into<String>) -> Self {
        Self::TrustConfiguration {
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Taxonomy name, as shown to users.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "ParseError",
            Self::Schema { .. } => "SchemaError",
            Self::BadSignature { .. } => "BadSignatureError",
            Self::TrustConfiguration { .. } => "TrustConfigurationError",
            Self::Io { .. } => "IoError",
        }
    }

    /// Exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Parse { .. } | Self::Io { .. } => 2,
            Self::Schema { .. } => 3,
            Self::BadSignature { .. } => 4,
            Self::TrustConfiguration { .. } => 5,
        }
    }
}

/// Result alias for the policy core.
pub type PolicyResult<T> = Result<T, PolicyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_visible_in_message() {
        let err = PolicyError::schema("rules.yaml", "duplicate rule id 'a.b'");
        assert_eq!(err.kind(), "SchemaError");
        assert!(err.to_string().starts_with("SchemaError: rules.yaml"));

        let err = PolicyError::bad_signature("signature does not match payload");
        assert!(err.to_string().contains("BadSignatureError"));
    }

    #[test]
    fn exit_codes_are_distinct_per_kind() {
        let codes = [
            PolicyError::parse("x", "y").exit_code(),
            PolicyError::schema("x", "y").exit_code(),
            PolicyError::bad_signature("z").exit_code(),
            PolicyError::trust("z").exit_code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
        assert!(codes.iter().all(|c| *c != 0));
    }
}
