use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, OnceLock},
};

use parking_lot::RwLock;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::format::FormatIdentifier;
use crate::parser::{
    FormatParser, JsonParser, PropertiesParser, TomlParser, XmlParser, YamlParser,
};

type Build = Arc<dyn Fn() -> Arc<dyn FormatParser> + Send + Sync>;

/// How a registry turns producers into parsers. Fixed for the registry's
/// lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstructionPolicy {
    /// Every `resolve` builds a new parser; instances act as prototypes.
    Fresh,
    /// Producers are materialized at registration and shared.
    Eager,
    /// The first `resolve` builds the parser, later calls share it.
    #[default]
    Lazy,
}

impl fmt::Display for ConstructionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConstructionPolicy::Fresh => "fresh",
            ConstructionPolicy::Eager => "eager",
            ConstructionPolicy::Lazy => "lazy",
        })
    }
}

/// Whatever a registry stores to eventually yield a parser.
#[derive(Clone)]
pub struct Producer {
    kind: ProducerKind,
    shared: Option<Arc<dyn FormatParser>>,
    build: Build,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerKind {
    Instance,
    Factory,
    Type(&'static str),
}

impl Producer {
    /// A ready parser. Shared as-is under caching policies and cloned per
    /// call under [`ConstructionPolicy::Fresh`].
    pub fn instance<P>(parser: P) -> Self
    where
        P: FormatParser + Clone + 'static,
    {
        let prototype = parser.clone();
        Self {
            kind: ProducerKind::Instance,
            shared: Some(Arc::new(parser)),
            build: Arc::new(move || -> Arc<dyn FormatParser> { Arc::new(prototype.clone()) }),
        }
    }

    /// A closure building a parser on demand.
    pub fn factory<F, P>(factory: F) -> Self
    where
        F: Fn() -> P + Send + Sync + 'static,
        P: FormatParser + 'static,
    {
        Self {
            kind: ProducerKind::Factory,
            shared: None,
            build: Arc::new(move || -> Arc<dyn FormatParser> { Arc::new(factory()) }),
        }
    }

    /// A parser type instantiated through `Default`.
    pub fn of<P>() -> Self
    where
        P: FormatParser + Default + 'static,
    {
        Self {
            kind: ProducerKind::Type(std::any::type_name::<P>()),
            shared: None,
            build: Arc::new(|| -> Arc<dyn FormatParser> { Arc::new(P::default()) }),
        }
    }

    pub fn kind(&self) -> ProducerKind {
        self.kind
    }

    fn build_shared(&self) -> Arc<dyn FormatParser> {
        match &self.shared {
            Some(parser) => Arc::clone(parser),
            None => (self.build)(),
        }
    }

    fn build_fresh(&self) -> Arc<dyn FormatParser> {
        (self.build)()
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer").field("kind", &self.kind).finish()
    }
}

struct Entry {
    producer: Producer,
    memo: OnceLock<Arc<dyn FormatParser>>,
}

/// Maps format identifiers to parser producers.
///
/// Registration replaces any earlier producer for the same identifier. The
/// swap happens under a write lock, so `resolve` sees either the old entry or
/// the new one. Under [`ConstructionPolicy::Lazy`] each entry builds its
/// parser at most once, even when first resolved from several threads.
pub struct ParserRegistry {
    policy: ConstructionPolicy,
    entries: RwLock<HashMap<FormatIdentifier, Arc<Entry>>>,
}

impl ParserRegistry {
    pub fn new(policy: ConstructionPolicy) -> Self {
        Self {
            policy,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Registry preloaded with the json, xml, yaml, properties and toml parsers.
    pub fn with_builtin(policy: ConstructionPolicy) -> Self {
        let registry = Self::new(policy);
        registry.register_builtin_parsers();
        registry
    }

    fn register_builtin_parsers(&self) {
        self.register(FormatIdentifier::JSON, Producer::of::<JsonParser>());
        self.register(FormatIdentifier::XML, Producer::of::<XmlParser>());
        self.register(FormatIdentifier::YAML, Producer::of::<YamlParser>());
        self.register(FormatIdentifier::PROPERTIES, Producer::of::<PropertiesParser>());
        self.register(FormatIdentifier::TOML, Producer::of::<TomlParser>());
    }

    pub fn policy(&self) -> ConstructionPolicy {
        self.policy
    }

    pub fn register(&self, format: FormatIdentifier, producer: Producer) {
        let memo = OnceLock::new();
        if self.policy == ConstructionPolicy::Eager {
            let _ = memo.set(producer.build_shared());
        }
        let kind = producer.kind();
        let entry = Arc::new(Entry { producer, memo });

        let replaced = self.entries.write().insert(format.clone(), entry);
        if replaced.is_some() {
            debug!(%format, ?kind, "parser producer replaced");
        } else {
            debug!(%format, ?kind, "parser producer registered");
        }
    }

    /// Registers a parser instance under the format it reports.
    pub fn register_parser<P>(&self, parser: P)
    where
        P: FormatParser + Clone + 'static,
    {
        let format = parser.format();
        self.register(format, Producer::instance(parser));
    }

    pub fn resolve(&self, format: &FormatIdentifier) -> Result<Arc<dyn FormatParser>> {
        let entry = self
            .entries
            .read()
            .get(format)
            .cloned()
            .ok_or_else(|| ConfigError::UnsupportedFormat(format.to_string()))?;

        // The lock is released before building so slow factories never block
        // registration or other lookups.
        let parser = match self.policy {
            ConstructionPolicy::Fresh => entry.producer.build_fresh(),
            ConstructionPolicy::Eager | ConstructionPolicy::Lazy => Arc::clone(
                entry
                    .memo
                    .get_or_init(|| entry.producer.build_shared()),
            ),
        };
        debug!(%format, policy = %self.policy, "parser resolved");
        Ok(parser)
    }

    pub fn contains(&self, format: &FormatIdentifier) -> bool {
        self.entries.read().contains_key(format)
    }

    /// Registered identifiers in sorted order.
    pub fn formats(&self) -> Vec<FormatIdentifier> {
        let mut formats: Vec<_> = self.entries.read().keys().cloned().collect();
        formats.sort();
        formats
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_builtin(ConstructionPolicy::default())
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("policy", &self.policy)
            .field("formats", &self.formats())
            .finish()
    }
}
