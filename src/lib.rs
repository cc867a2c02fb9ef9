//! Format-driven configuration parsing.
//!
//! A [`ConfigSource`] turns a path into a [`ParsedConfig`]: the path's format
//! picks a parser out of a [`ParserRegistry`], and new formats are added by
//! registering a [`Producer`] rather than editing dispatch code.

pub mod config;
pub mod document;
pub mod error;
pub mod family;
pub mod format;
pub mod logging;
pub mod parser;
pub mod paths;
pub mod registry;
pub mod source;

pub use document::{ConfigRole, ParsedConfig};
pub use error::{ConfigError, Result};
pub use family::{FamilyRegistry, ParserFamily, RoleParser, RoleSchema, SyntaxFamily};
pub use format::FormatIdentifier;
pub use parser::FormatParser;
pub use registry::{ConstructionPolicy, ParserRegistry, Producer, ProducerKind};
pub use source::{
    ConfigSource, ExtensionDetector, FormatDetector, FsReader, SourceReader, detector_fn,
    reader_fn,
};
