use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    sync::Arc,
};

use parking_lot::RwLock;
use serde::Deserialize;
use tracing::debug;

use crate::document::{ConfigRole, ParsedConfig};
use crate::error::{ConfigError, Result};
use crate::format::FormatIdentifier;
use crate::parser::{
    FormatParser, JsonParser, PropertiesParser, TomlParser, XmlParser, YamlParser,
};

/// Produces the rule and system parsers for one format, so the two kinds can
/// never disagree on syntax.
pub trait ParserFamily: Send + Sync {
    fn format(&self) -> FormatIdentifier;

    fn create_rule_parser(&self) -> Arc<dyn FormatParser>;

    fn create_system_parser(&self) -> Arc<dyn FormatParser>;

    fn create_parser(&self, role: ConfigRole) -> Option<Arc<dyn FormatParser>> {
        match role {
            ConfigRole::Rule => Some(self.create_rule_parser()),
            ConfigRole::System => Some(self.create_system_parser()),
            ConfigRole::Generic => None,
        }
    }
}

/// Top-level keys a role expects. Empty means anything goes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RoleSchema {
    #[serde(default)]
    pub known_keys: BTreeSet<String>,
}

impl RoleSchema {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known_keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    fn unknown_keys<'a>(&self, config: &'a ParsedConfig) -> Vec<&'a str> {
        if self.known_keys.is_empty() {
            return Vec::new();
        }
        config
            .keys()
            .filter(|key| !self.known_keys.contains(*key))
            .collect()
    }
}

/// Wraps a syntax parser, stamps the role on its output and flags keys the
/// role does not know about.
#[derive(Debug, Clone)]
pub struct RoleParser<P> {
    inner: P,
    role: ConfigRole,
    schema: RoleSchema,
}

impl<P> RoleParser<P> {
    pub fn new(inner: P, role: ConfigRole, schema: RoleSchema) -> Self {
        Self {
            inner,
            role,
            schema,
        }
    }

    pub fn role(&self) -> ConfigRole {
        self.role
    }
}

impl<P: FormatParser> FormatParser for RoleParser<P> {
    fn format(&self) -> FormatIdentifier {
        self.inner.format()
    }

    fn parse(&self, text: &str) -> Result<ParsedConfig> {
        let config = self.inner.parse(text)?;
        let warnings: Vec<String> = self
            .schema
            .unknown_keys(&config)
            .into_iter()
            .map(|key| format!("unknown {} config key `{key}`", self.role))
            .collect();
        Ok(config.with_role(self.role).with_warnings(warnings))
    }
}

/// Family built from a single syntax parser type.
#[derive(Debug, Clone)]
pub struct SyntaxFamily<P> {
    parser: P,
    rule: RoleSchema,
    system: RoleSchema,
}

impl<P> SyntaxFamily<P> {
    pub fn new(parser: P, rule: RoleSchema, system: RoleSchema) -> Self {
        Self {
            parser,
            rule,
            system,
        }
    }
}

impl<P: Default> Default for SyntaxFamily<P> {
    fn default() -> Self {
        Self::new(P::default(), RoleSchema::default(), RoleSchema::default())
    }
}

impl<P> ParserFamily for SyntaxFamily<P>
where
    P: FormatParser + Clone + 'static,
{
    fn format(&self) -> FormatIdentifier {
        self.parser.format()
    }

    fn create_rule_parser(&self) -> Arc<dyn FormatParser> {
        Arc::new(RoleParser::new(
            self.parser.clone(),
            ConfigRole::Rule,
            self.rule.clone(),
        ))
    }

    fn create_system_parser(&self) -> Arc<dyn FormatParser> {
        Arc::new(RoleParser::new(
            self.parser.clone(),
            ConfigRole::System,
            self.system.clone(),
        ))
    }
}

/// Maps format identifiers to parser families. Same overwrite and
/// unknown-format semantics as [`crate::ParserRegistry`].
#[derive(Default)]
pub struct FamilyRegistry {
    families: RwLock<HashMap<FormatIdentifier, Arc<dyn ParserFamily>>>,
}

impl FamilyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Families for every built-in syntax, sharing the given role schemas.
    pub fn with_builtin(rule: &RoleSchema, system: &RoleSchema) -> Self {
        let registry = Self::new();
        registry.register_family(SyntaxFamily::new(JsonParser, rule.clone(), system.clone()));
        registry.register_family(SyntaxFamily::new(XmlParser, rule.clone(), system.clone()));
        registry.register_family(SyntaxFamily::new(YamlParser, rule.clone(), system.clone()));
        registry.register_family(SyntaxFamily::new(
            PropertiesParser,
            rule.clone(),
            system.clone(),
        ));
        registry.register_family(SyntaxFamily::new(TomlParser, rule.clone(), system.clone()));
        registry
    }

    /// Registers a family under the format it reports, so a lookup key and
    /// the parsers it yields always agree.
    pub fn register(&self, family: Arc<dyn ParserFamily>) {
        let format = family.format();
        let replaced = self.families.write().insert(format.clone(), family);
        if replaced.is_some() {
            debug!(%format, "parser family replaced");
        } else {
            debug!(%format, "parser family registered");
        }
    }

    pub fn register_family<F: ParserFamily + 'static>(&self, family: F) {
        self.register(Arc::new(family));
    }

    pub fn resolve(&self, format: &FormatIdentifier) -> Result<Arc<dyn ParserFamily>> {
        self.families
            .read()
            .get(format)
            .cloned()
            .ok_or_else(|| ConfigError::UnsupportedFormat(format.to_string()))
    }

    pub fn contains(&self, format: &FormatIdentifier) -> bool {
        self.families.read().contains_key(format)
    }

    pub fn formats(&self) -> Vec<FormatIdentifier> {
        let mut formats: Vec<_> = self.families.read().keys().cloned().collect();
        formats.sort();
        formats
    }
}

impl fmt::Debug for FamilyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FamilyRegistry")
            .field("formats", &self.formats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin() -> FamilyRegistry {
        FamilyRegistry::with_builtin(&RoleSchema::default(), &RoleSchema::default())
    }

    #[test]
    fn family_parsers_share_the_family_format() {
        let families = builtin();
        for format in families.formats() {
            let family = families.resolve(&format).unwrap();
            assert_eq!(family.format(), format);
            assert_eq!(family.create_rule_parser().format(), format);
            assert_eq!(family.create_system_parser().format(), format);
        }

        let xml = families.resolve(&FormatIdentifier::new("XML").unwrap()).unwrap();
        assert_eq!(xml.create_rule_parser().format(), FormatIdentifier::XML);
        assert_eq!(xml.create_system_parser().format(), FormatIdentifier::XML);
    }

    #[test]
    fn parsers_stamp_their_role() {
        let family = builtin().resolve(&FormatIdentifier::JSON).unwrap();
        let rule = family.create_rule_parser().parse(r#"{"a": 1}"#).unwrap();
        let system = family.create_system_parser().parse(r#"{"a": 1}"#).unwrap();
        assert_eq!(rule.role(), ConfigRole::Rule);
        assert_eq!(system.role(), ConfigRole::System);
        assert_ne!(rule, system);
        assert!(family.create_parser(ConfigRole::Generic).is_none());
    }

    #[test]
    fn unknown_keys_become_warnings() {
        let family = SyntaxFamily::new(
            YamlParser,
            RoleSchema::new(["version", "rules"]),
            RoleSchema::new(["version", "system"]),
        );
        let text = "version: 1\nrules: []\nextra: true\n";
        let rule = family.create_rule_parser().parse(text).unwrap();
        assert_eq!(rule.warnings(), ["unknown rule config key `extra`"]);

        let system = family.create_system_parser().parse(text).unwrap();
        assert_eq!(system.warnings().len(), 2);
        assert_eq!(system.get_i64("version"), Some(1));
    }

    #[test]
    fn malformed_text_still_fails() {
        let family = builtin().resolve(&FormatIdentifier::XML).unwrap();
        let err = family.create_rule_parser().parse("<a>").unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn unknown_family_is_unsupported_and_registration_overwrites() {
        let families = FamilyRegistry::new();
        assert!(families.resolve(&FormatIdentifier::JSON).err().unwrap().is_unsupported());

        families.register_family(SyntaxFamily::<JsonParser>::default());
        families.register(Arc::new(SyntaxFamily::new(
            JsonParser,
            RoleSchema::new(["only"]),
            RoleSchema::default(),
        )));
        let rule = families
            .resolve(&FormatIdentifier::JSON)
            .unwrap()
            .create_rule_parser()
            .parse(r#"{"other": 1}"#)
            .unwrap();
        assert_eq!(rule.warnings().len(), 1);
        assert_eq!(families.formats(), vec![FormatIdentifier::JSON]);
    }

    #[test]
    fn families_are_only_reachable_under_their_own_format() {
        let families = FamilyRegistry::new();
        families.register(Arc::new(SyntaxFamily::<JsonParser>::default()));

        assert!(families.resolve(&FormatIdentifier::XML).err().unwrap().is_unsupported());
        assert_eq!(families.formats(), vec![FormatIdentifier::JSON]);

        let family = families.resolve(&FormatIdentifier::JSON).unwrap();
        assert_eq!(family.create_rule_parser().format(), FormatIdentifier::JSON);
        assert_eq!(family.create_system_parser().format(), FormatIdentifier::JSON);
    }
}
