use std::{io, path::PathBuf};

use crate::format::FormatIdentifier;

/// Failure kinds surfaced by resolution and loading.
///
/// `ConfigSource::load` fails with exactly one of these; nothing is retried or
/// replaced by a fallback format.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No producer is registered for the identifier, or the identifier itself
    /// could not be normalized.
    #[error("unsupported config format `{0}`")]
    UnsupportedFormat(String),

    /// The parser rejected the text.
    #[error("malformed {format} document: {reason}")]
    MalformedDocument {
        format: FormatIdentifier,
        reason: String,
    },

    /// The document could not be read.
    #[error("config source {} is unavailable: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ConfigError {
    pub fn malformed(format: FormatIdentifier, reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            format,
            reason: reason.into(),
        }
    }

    pub fn unavailable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            source,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedFormat(_))
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedDocument { .. })
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }
}

pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_input() {
        let err = ConfigError::UnsupportedFormat("toml".into());
        assert_eq!(err.to_string(), "unsupported config format `toml`");

        let err = ConfigError::malformed(FormatIdentifier::JSON, "line 1 column 2");
        assert_eq!(err.to_string(), "malformed json document: line 1 column 2");
        assert!(err.is_malformed());

        let err = ConfigError::unavailable(
            "conf/rule.json",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(
            err.to_string(),
            "config source conf/rule.json is unavailable: gone"
        );
        assert!(err.is_unavailable());
        assert!(std::error::Error::source(&err).is_some());
    }
}
