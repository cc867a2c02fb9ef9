use std::{collections::BTreeMap, fs, path::Path, sync::Arc};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::family::{FamilyRegistry, RoleSchema};
use crate::format::FormatIdentifier;
use crate::registry::{ConstructionPolicy, ParserRegistry};
use crate::source::{ConfigSource, ExtensionDetector, FsReader};

#[derive(Debug, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub policy: ConstructionPolicy,
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default)]
    pub roles: RoleSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize)]
pub struct SourceSettings {
    #[serde(default = "default_base_dir")]
    pub base_dir: String,
    #[serde(default)]
    pub search_dirs: Vec<String>,
    #[serde(default = "default_aliases")]
    pub aliases: BTreeMap<String, FormatIdentifier>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            search_dirs: Vec::new(),
            aliases: default_aliases(),
        }
    }
}

fn default_base_dir() -> String {
    ".".to_string()
}

fn default_aliases() -> BTreeMap<String, FormatIdentifier> {
    BTreeMap::from([("yml".to_string(), FormatIdentifier::YAML)])
}

#[derive(Debug, Deserialize, Default)]
pub struct RoleSettings {
    #[serde(default)]
    pub rule: RoleSchema,
    #[serde(default)]
    pub system: RoleSchema,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    pub fn build_registry(&self) -> ParserRegistry {
        ParserRegistry::with_builtin(self.policy)
    }

    pub fn build_families(&self) -> FamilyRegistry {
        FamilyRegistry::with_builtin(&self.roles.rule, &self.roles.system)
    }

    /// Wires a ready source: built-in parsers and families, file reader and
    /// extension aliases from these settings.
    pub fn build_source(&self) -> ConfigSource {
        let reader = self
            .source
            .search_dirs
            .iter()
            .fold(FsReader::new(&self.source.base_dir), |reader, dir| {
                reader.with_search_dir(dir)
            });
        let detector = self
            .source
            .aliases
            .iter()
            .fold(ExtensionDetector::plain(), |detector, (ext, format)| {
                detector.with_alias(ext, format.clone())
            });

        ConfigSource::new(Arc::new(self.build_registry()))
            .with_families(Arc::new(self.build_families()))
            .with_reader(reader)
            .with_detector(detector)
    }
}

pub fn load_settings(path: impl AsRef<Path>) -> Result<Settings> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let settings: Settings = toml::from_str(&text)
        .with_context(|| format!("failed to parse settings file {}", path.display()))?;
    Ok(settings)
}
