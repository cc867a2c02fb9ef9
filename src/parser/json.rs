use serde_json::Value;

use super::{FormatParser, root_mapping};
use crate::document::ParsedConfig;
use crate::error::{ConfigError, Result};
use crate::format::FormatIdentifier;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl FormatParser for JsonParser {
    fn format(&self) -> FormatIdentifier {
        FormatIdentifier::JSON
    }

    fn parse(&self, text: &str) -> Result<ParsedConfig> {
        // serde_json messages already end in "at line L column C".
        let value = serde_json::from_str::<Value>(text)
            .map_err(|err| ConfigError::malformed(self.format(), err.to_string()))?;
        // `null` is valid JSON but not a configuration document.
        if value.is_null() {
            return Err(ConfigError::malformed(
                self.format(),
                "document root must be a mapping, got null",
            ));
        }
        let root = root_mapping(&self.format(), value)?;
        Ok(ParsedConfig::new(self.format(), root, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{Map as JsonMap, json};

    #[test]
    fn parses_nested_document() {
        let config = JsonParser
            .parse(r#"{"a": 1, "b": {"c": [true, "x"]}}"#)
            .unwrap();
        assert_eq!(config.format(), &FormatIdentifier::JSON);
        assert_eq!(config.get_i64("a"), Some(1));
        assert_eq!(config.get("b.c.1"), Some(&json!("x")));
        assert!(config.warnings().is_empty());
    }

    #[test]
    fn keeps_source_key_order() {
        let config = JsonParser.parse(r#"{"z": 1, "a": 2, "m": 3}"#).unwrap();
        let keys: Vec<_> = config.keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn reports_position_of_syntax_errors() {
        let err = JsonParser.parse("{not json").unwrap_err();
        match err {
            ConfigError::MalformedDocument { format, reason } => {
                assert_eq!(format, FormatIdentifier::JSON);
                assert!(reason.contains("line 1"), "{reason}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_non_mapping_roots() {
        assert!(JsonParser.parse("[1, 2]").unwrap_err().is_malformed());
        assert!(JsonParser.parse("null").unwrap_err().is_malformed());
        assert!(JsonParser.parse("").unwrap_err().is_malformed());
    }

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            "[a-zA-Z0-9 _.-]{0,12}".prop_map(Value::String),
        ]
    }

    fn tree() -> impl Strategy<Value = Value> {
        leaf().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z][a-z0-9_]{0,6}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn serialized_documents_parse_back(
            entries in prop::collection::btree_map("[a-z][a-z0-9_]{0,6}", tree(), 0..6)
        ) {
            let expected: JsonMap<String, Value> = entries.into_iter().collect();
            let text = serde_json::to_string(&expected).unwrap();
            let config = JsonParser.parse(&text).unwrap();
            prop_assert_eq!(config.root(), &expected);
        }
    }
}
