use serde_json::{Map as JsonMap, Value};
use serde_saphyr as serde_yaml;

use super::{FormatParser, root_mapping};
use crate::document::ParsedConfig;
use crate::error::{ConfigError, Result};
use crate::format::FormatIdentifier;

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlParser;

impl FormatParser for YamlParser {
    fn format(&self) -> FormatIdentifier {
        FormatIdentifier::YAML
    }

    fn parse(&self, text: &str) -> Result<ParsedConfig> {
        if is_blank(text) {
            return Ok(ParsedConfig::new(self.format(), JsonMap::new(), text));
        }
        // YAML documents deserialize straight into serde_json::Value.
        let value = serde_yaml::from_str::<Value>(text)
            .map_err(|err| ConfigError::malformed(self.format(), err.to_string()))?;
        // An explicit `~` or `null` is a value, not an empty document.
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

fn is_blank(text: &str) -> bool {
    text.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#') || line == "---"
    })
}
