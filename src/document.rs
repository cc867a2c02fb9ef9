use std::{collections::BTreeMap, fmt};

use serde_json::{Map as JsonMap, Value};
use sha2::{Digest, Sha256};

use crate::format::FormatIdentifier;

/// Which kind of configuration a document was parsed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConfigRole {
    #[default]
    Generic,
    Rule,
    System,
}

impl fmt::Display for ConfigRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigRole::Generic => "generic",
            ConfigRole::Rule => "rule",
            ConfigRole::System => "system",
        })
    }
}

/// Structured result of parsing exactly one configuration document.
///
/// The content is a format-independent mapping; there are no `&mut` accessors,
/// so a returned value never changes.
#[derive(Debug, Clone)]
pub struct ParsedConfig {
    format: FormatIdentifier,
    role: ConfigRole,
    root: JsonMap<String, Value>,
    warnings: Vec<String>,
    digest: String,
}

impl ParsedConfig {
    /// Builds a document from its parsed root and the text it came from.
    pub fn new(format: FormatIdentifier, root: JsonMap<String, Value>, source: &str) -> Self {
        Self {
            format,
            role: ConfigRole::Generic,
            root,
            warnings: Vec::new(),
            digest: sha256_hex(source.as_bytes()),
        }
    }

    pub fn with_role(mut self, role: ConfigRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn format(&self) -> &FormatIdentifier {
        &self.format
    }

    pub fn role(&self) -> ConfigRole {
        self.role
    }

    pub fn root(&self) -> &JsonMap<String, Value> {
        &self.root
    }

    /// Recoverable issues noticed while parsing (unknown keys, duplicates, ...).
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Hex SHA-256 of the source text.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.root.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Looks up a dot-separated key path such as `server.ports.0`.
    ///
    /// Numeric segments index into arrays. Keys that themselves contain dots
    /// (as `.properties` files produce) are matched before descending.
    pub fn get(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.root.get(path) {
            return Some(value);
        }
        let segments: Vec<&str> = path.split('.').collect();
        lookup_in_map(&self.root, &segments)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Integer at `path`; numeric strings are accepted since XML and
    /// properties carry no types.
    pub fn get_i64(&self, path: &str) -> Option<i64> {
        match self.get(path)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_f64(&self, path: &str) -> Option<f64> {
        match self.get(path)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        match self.get(path)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" => Some(true),
                "false" | "no" | "off" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Every leaf value keyed by its full path.
    pub fn flatten(&self) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        for (key, value) in &self.root {
            flatten_into(key.clone(), value, &mut out);
        }
        out
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.root)
    }
}

impl PartialEq for ParsedConfig {
    fn eq(&self, other: &Self) -> bool {
        self.format == other.format && self.role == other.role && self.root == other.root
    }
}

fn lookup_in_map<'a>(map: &'a JsonMap<String, Value>, segments: &[&str]) -> Option<&'a Value> {
    // Commits to the longest literal key present at this level, so `a.b`
    // shadows `a` -> `b` and a miss below it is final.
    let (child, rest) = (1..=segments.len()).rev().find_map(|split| {
        map.get(&segments[..split].join("."))
            .map(|child| (child, &segments[split..]))
    })?;
    lookup(child, rest)
}

fn lookup<'a>(value: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    if segments.is_empty() {
        return Some(value);
    }
    match value {
        Value::Object(map) => lookup_in_map(map, segments),
        Value::Array(items) => {
            let index: usize = segments[0].parse().ok()?;
            lookup(items.get(index)?, &segments[1..])
        }
        _ => None,
    }
}

fn flatten_into(prefix: String, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(format!("{prefix}.{key}"), child, out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (idx, child) in items.iter().enumerate() {
                flatten_into(format!("{prefix}.{idx}"), child, out);
            }
        }
        _ => {
            out.insert(prefix, value.clone());
        }
    }
}

fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    format!("{digest:x}")
}
