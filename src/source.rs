use std::{
    collections::HashMap,
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{debug, warn};

use crate::document::{ConfigRole, ParsedConfig};
use crate::error::{ConfigError, Result};
use crate::family::FamilyRegistry;
use crate::format::FormatIdentifier;
use crate::paths::resolve_path;
use crate::registry::ParserRegistry;

/// Reads the raw text behind a path.
pub trait SourceReader: Send + Sync {
    fn read_all(&self, path: &Path) -> io::Result<String>;
}

/// Names the format of a path, usually from its extension.
pub trait FormatDetector: Send + Sync {
    fn extension_of(&self, path: &Path) -> Option<String>;
}

/// Adapts a closure into a [`SourceReader`].
pub fn reader_fn<F>(f: F) -> FnReader<F>
where
    F: Fn(&Path) -> io::Result<String> + Send + Sync,
{
    FnReader(f)
}

/// Adapts a closure into a [`FormatDetector`].
pub fn detector_fn<F>(f: F) -> FnDetector<F>
where
    F: Fn(&Path) -> Option<String> + Send + Sync,
{
    FnDetector(f)
}

pub struct FnReader<F>(F);

impl<F> SourceReader for FnReader<F>
where
    F: Fn(&Path) -> io::Result<String> + Send + Sync,
{
    fn read_all(&self, path: &Path) -> io::Result<String> {
        (self.0)(path)
    }
}

pub struct FnDetector<F>(F);

impl<F> FormatDetector for FnDetector<F>
where
    F: Fn(&Path) -> Option<String> + Send + Sync,
{
    fn extension_of(&self, path: &Path) -> Option<String> {
        (self.0)(path)
    }
}

/// Reads UTF-8 files, resolving relative paths against a base directory and
/// then a list of search directories.
#[derive(Debug, Clone)]
pub struct FsReader {
    base_dir: PathBuf,
    search_dirs: Vec<PathBuf>,
}

impl FsReader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            search_dirs: Vec::new(),
        }
    }

    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }
}

impl Default for FsReader {
    fn default() -> Self {
        Self::new(".")
    }
}

impl SourceReader for FsReader {
    fn read_all(&self, path: &Path) -> io::Result<String> {
        let resolved = resolve_path(&self.base_dir, &self.search_dirs, path);
        fs::read_to_string(resolved)
    }
}

/// Lowercased file extension, translated through an alias table
/// (`yml` -> `yaml` by default).
#[derive(Debug, Clone)]
pub struct ExtensionDetector {
    aliases: HashMap<String, FormatIdentifier>,
}

impl ExtensionDetector {
    /// Detector without any aliases.
    pub fn plain() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }

    pub fn with_alias(mut self, extension: &str, format: FormatIdentifier) -> Self {
        self.aliases
            .insert(extension.trim().to_lowercase(), format);
        self
    }
}

impl Default for ExtensionDetector {
    fn default() -> Self {
        Self::plain().with_alias("yml", FormatIdentifier::YAML)
    }
}

impl FormatDetector for ExtensionDetector {
    fn extension_of(&self, path: &Path) -> Option<String> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match self.aliases.get(&ext) {
            Some(format) => Some(format.to_string()),
            None => Some(ext),
        }
    }
}

/// Single entry point for loading configuration files.
///
/// `load` derives the format from the path, resolves a parser, reads the text
/// and parses it. The parser is resolved before any I/O, so an unsupported
/// format never touches the file system.
pub struct ConfigSource {
    registry: Arc<ParserRegistry>,
    families: Option<Arc<FamilyRegistry>>,
    reader: Box<dyn SourceReader>,
    detector: Box<dyn FormatDetector>,
}

impl ConfigSource {
    pub fn new(registry: Arc<ParserRegistry>) -> Self {
        Self {
            registry,
            families: None,
            reader: Box::new(FsReader::default()),
            detector: Box::new(ExtensionDetector::default()),
        }
    }

    pub fn with_reader(mut self, reader: impl SourceReader + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    pub fn with_detector(mut self, detector: impl FormatDetector + 'static) -> Self {
        self.detector = Box::new(detector);
        self
    }

    pub fn with_families(mut self, families: Arc<FamilyRegistry>) -> Self {
        self.families = Some(families);
        self
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    pub fn families(&self) -> Option<&FamilyRegistry> {
        self.families.as_deref()
    }

    /// Format identifier for `path`; a path without an extension is
    /// `UnsupportedFormat("")`.
    pub fn format_of(&self, path: impl AsRef<Path>) -> Result<FormatIdentifier> {
        let ext = self.detector.extension_of(path.as_ref()).unwrap_or_default();
        FormatIdentifier::new(ext)
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<ParsedConfig> {
        let path = path.as_ref();
        let format = self.format_of(path)?;
        let parser = self.registry.resolve(&format)?;
        debug!(path = %path.display(), %format, "loading config");

        let text = self.read(path)?;
        let config = parser.parse(&text)?;
        report(path, &config);
        Ok(config)
    }

    /// Loads `path` with the rule or system parser of its format's family.
    /// [`ConfigRole::Generic`] is the same as [`ConfigSource::load`]; other
    /// roles need a family registry with an entry for the format.
    pub fn load_as(&self, path: impl AsRef<Path>, role: ConfigRole) -> Result<ParsedConfig> {
        let path = path.as_ref();
        if role == ConfigRole::Generic {
            return self.load(path);
        }

        let format = self.format_of(path)?;
        let parser = self
            .families
            .as_deref()
            .ok_or_else(|| ConfigError::UnsupportedFormat(format.to_string()))?
            .resolve(&format)?
            .create_parser(role)
            .ok_or_else(|| ConfigError::UnsupportedFormat(format.to_string()))?;
        debug!(path = %path.display(), %format, %role, "loading config");

        let text = self.read(path)?;
        let config = parser.parse(&text)?;
        report(path, &config);
        Ok(config)
    }

    /// Loads every path in order, stopping at the first failure.
    pub fn load_all<I, P>(&self, paths: I) -> Result<Vec<ParsedConfig>>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        paths.into_iter().map(|path| self.load(path)).collect()
    }

    fn read(&self, path: &Path) -> Result<String> {
        self.reader
            .read_all(path)
            .map_err(|err| ConfigError::unavailable(path, err))
    }
}

impl fmt::Debug for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigSource")
            .field("registry", &self.registry)
            .field("families", &self.families)
            .finish_non_exhaustive()
    }
}

fn report(path: &Path, config: &ParsedConfig) {
    for warning in config.warnings() {
        warn!(path = %path.display(), format = %config.format(), "{warning}");
    }
    debug!(
        path = %path.display(),
        keys = config.root().len(),
        digest = config.digest(),
        "config loaded"
    );
}
