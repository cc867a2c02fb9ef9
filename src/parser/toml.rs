use serde_json::{Map as JsonMap, Number, Value};

use super::FormatParser;
use crate::document::ParsedConfig;
use crate::error::{ConfigError, Result};
use crate::format::FormatIdentifier;

#[derive(Debug, Clone, Copy, Default)]
pub struct TomlParser;

impl FormatParser for TomlParser {
    fn format(&self) -> FormatIdentifier {
        FormatIdentifier::TOML
    }

    fn parse(&self, text: &str) -> Result<ParsedConfig> {
        let table: ::toml::Table = ::toml::from_str(text)
            .map_err(|err| ConfigError::malformed(self.format(), err.to_string().trim_end()))?;

        let mut warnings = Vec::new();
        let root = convert_table(&table, "", &mut warnings);
        Ok(ParsedConfig::new(self.format(), root, text).with_warnings(warnings))
    }
}

fn convert_table(
    table: &::toml::Table,
    prefix: &str,
    warnings: &mut Vec<String>,
) -> JsonMap<String, Value> {
    table
        .iter()
        .map(|(key, value)| {
            let path = join(prefix, key);
            let converted = convert(value, &path, warnings);
            (key.clone(), converted)
        })
        .collect()
}

fn convert(value: &::toml::Value, path: &str, warnings: &mut Vec<String>) -> Value {
    match value {
        ::toml::Value::String(s) => Value::String(s.clone()),
        ::toml::Value::Integer(i) => Value::from(*i),
        ::toml::Value::Float(f) => match Number::from_f64(*f) {
            Some(n) => Value::Number(n),
            None => {
                warnings.push(format!("`{path}`: non-finite float {f} kept as text"));
                Value::String(f.to_string())
            }
        },
        ::toml::Value::Boolean(b) => Value::Bool(*b),
        ::toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        ::toml::Value::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(idx, item)| convert(item, &join(path, &idx.to_string()), warnings))
                .collect(),
        ),
        ::toml::Value::Table(table) => Value::Object(convert_table(table, path, warnings)),
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}
