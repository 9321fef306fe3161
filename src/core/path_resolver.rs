//! Destination path lookup with a per-stream cache
//!
//! Looking up a stream's default filter is assumed to be expensive, and a
//! stream's path never changes while the process runs, so each stream is
//! looked up at most once.

use super::error::{Result, ShipperError};
use super::record::StreamId;
use std::collections::HashMap;
use std::sync::Arc;

/// The producer's description of a stream's default filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub name: String,
    /// Destination path without any file suffix, e.g. `conn`
    pub path: String,
}

impl Filter {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Source of default filters, owned by the producer
pub trait FilterRegistry {
    /// Look up the default filter for a stream
    ///
    /// # Errors
    ///
    /// Returns `ShipperError::FilterLookup` if the stream or its default
    /// filter does not exist.
    fn default_filter(&self, stream: &StreamId) -> Result<Filter>;
}

impl<F> FilterRegistry for F
where
    F: Fn(&StreamId) -> Result<Filter>,
{
    fn default_filter(&self, stream: &StreamId) -> Result<Filter> {
        self(stream)
    }
}

/// Registry deriving paths from stream ids the way the producer's default
/// path function does
///
/// - `Conn::LOG` becomes `conn`
/// - `Known::HOSTS_LOG` becomes `known_hosts`
/// - `Foo::Bar` becomes `foo_bar`
///
/// Ids without a `Module::` prefix are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct DerivedPathRegistry;

impl DerivedPathRegistry {
    pub fn new() -> Self {
        Self
    }

    fn derive(stream: &str) -> Option<String> {
        let (module, name) = stream.split_once("::")?;
        if module.is_empty() || name.is_empty() {
            return None;
        }

        let module = module.to_lowercase();
        let name = name.strip_suffix("_LOG").unwrap_or(name);
        if name == "LOG" {
            Some(module)
        } else {
            Some(format!("{}_{}", module, name.replace("::", "_").to_lowercase()))
        }
    }
}

impl FilterRegistry for DerivedPathRegistry {
    fn default_filter(&self, stream: &StreamId) -> Result<Filter> {
        Self::derive(stream.as_str())
            .map(|path| Filter::new("default", path))
            .ok_or_else(|| ShipperError::filter_lookup(stream.as_str(), "unknown stream id"))
    }
}

/// Resolves and caches destination paths per stream
pub struct PathResolver {
    registry: Box<dyn FilterRegistry>,
    suffix: Option<&'static str>,
    cache: HashMap<StreamId, Arc<str>>,
    lookups: u64,
}

impl PathResolver {
    /// Create a resolver appending `suffix` (e.g. `.log`) to every path
    pub fn new(registry: Box<dyn FilterRegistry>, suffix: Option<&'static str>) -> Self {
        Self {
            registry,
            suffix,
            cache: HashMap::new(),
            lookups: 0,
        }
    }

    /// Resolve the destination path of a stream
    ///
    /// A cached path is returned as the same `Arc`. Failed lookups are not
    /// cached.
    pub fn resolve(&mut self, stream: &StreamId) -> Result<Arc<str>> {
        if let Some(path) = self.cache.get(stream) {
            return Ok(Arc::clone(path));
        }

        self.lookups += 1;
        let filter = self.registry.default_filter(stream)?;
        let path: Arc<str> = match self.suffix {
            Some(suffix) => format!("{}{}", filter.path, suffix).into(),
            None => filter.path.into(),
        };
        self.cache.insert(stream.clone(), Arc::clone(&path));
        Ok(path)
    }

    /// Number of registry lookups performed so far
    pub fn lookups(&self) -> u64 {
        self.lookups
    }

    /// Number of cached streams
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}
