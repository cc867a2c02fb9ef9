use std::{borrow::Cow, fmt, str::FromStr};

use serde::Deserialize;

use crate::error::ConfigError;

/// Normalized name of a configuration syntax, e.g. `json`.
///
/// Identifiers are trimmed and lowercased on construction and never empty, so
/// `" JSON "` and `"json"` name the same format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub struct FormatIdentifier(Cow<'static, str>);

impl FormatIdentifier {
    pub const JSON: Self = Self(Cow::Borrowed("json"));
    pub const XML: Self = Self(Cow::Borrowed("xml"));
    pub const YAML: Self = Self(Cow::Borrowed("yaml"));
    pub const PROPERTIES: Self = Self(Cow::Borrowed("properties"));
    pub const TOML: Self = Self(Cow::Borrowed("toml"));

    /// Normalizes `raw` into an identifier.
    ///
    /// Empty input and input with inner whitespace are rejected as
    /// `UnsupportedFormat` carrying the trimmed text.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ConfigError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(ConfigError::UnsupportedFormat(trimmed.to_string()));
        }
        Ok(Self(Cow::Owned(trimmed.to_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FormatIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FormatIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for FormatIdentifier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for FormatIdentifier {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for FormatIdentifier {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        let id = FormatIdentifier::new("  JSON\n").unwrap();
        assert_eq!(id, FormatIdentifier::JSON);
        assert_eq!(id.to_string(), "json");
        assert_eq!("Yaml".parse::<FormatIdentifier>().unwrap(), FormatIdentifier::YAML);
    }

    #[test]
    fn rejects_empty_and_spaced_identifiers() {
        match FormatIdentifier::new("   ") {
            Err(ConfigError::UnsupportedFormat(raw)) => assert_eq!(raw, ""),
            other => panic!("unexpected {other:?}"),
        }
        match FormatIdentifier::new("x ml") {
            Err(ConfigError::UnsupportedFormat(raw)) => assert_eq!(raw, "x ml"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn constants_equal_parsed_identifiers() {
        for (constant, raw) in [
            (FormatIdentifier::XML, "xml"),
            (FormatIdentifier::PROPERTIES, "Properties"),
            (FormatIdentifier::TOML, "TOML"),
        ] {
            assert_eq!(constant, FormatIdentifier::new(raw).unwrap());
        }
    }
}
