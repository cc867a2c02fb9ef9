use serde_json::{Map as JsonMap, Value};

use crate::document::ParsedConfig;
use crate::error::{ConfigError, Result};
use crate::format::FormatIdentifier;

pub mod json;
pub mod properties;
pub mod toml;
pub mod xml;
pub mod yaml;

pub use json::JsonParser;
pub use properties::PropertiesParser;
pub use toml::TomlParser;
pub use xml::XmlParser;
pub use yaml::YamlParser;

/// Converts raw text of one configuration syntax into a [`ParsedConfig`].
///
/// Implementations are shared across threads by the registry, so `parse` must
/// be reentrant. Only unparsable input is an error; recoverable issues go into
/// the document's warnings.
pub trait FormatParser: Send + Sync {
    /// Format this parser understands, e.g. `json`.
    fn format(&self) -> FormatIdentifier;

    /// Parse input text into a document.
    fn parse(&self, text: &str) -> Result<ParsedConfig>;
}

/// Requires a mapping at the document root.
pub(crate) fn root_mapping(format: &FormatIdentifier, value: Value) -> Result<JsonMap<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(JsonMap::new()),
        other => Err(ConfigError::malformed(
            format.clone(),
            format!("document root must be a mapping, got {}", describe_value(&other)),
        )),
    }
}

fn describe_value(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn root_must_be_a_mapping() {
        let err = root_mapping(&FormatIdentifier::JSON, json!([1, 2])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "malformed json document: document root must be a mapping, got list"
        );
        assert!(root_mapping(&FormatIdentifier::YAML, Value::Null).unwrap().is_empty());
    }
}
