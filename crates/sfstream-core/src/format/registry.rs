use super::{HeaderFormat, WaveFormat};
use crate::error::{Error, Result};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Header formats available to streams, in lookup order.
#[derive(Clone)]
pub struct FormatRegistry {
    formats: Vec<Arc<dyn HeaderFormat>>,
}

impl FormatRegistry {
    /// Registry with no formats.
    pub fn empty() -> Self {
        Self {
            formats: Vec::new(),
        }
    }

    /// Registry with the built-in WAVE format.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(WaveFormat));
        registry
    }

    pub fn register(&mut self, format: Arc<dyn HeaderFormat>) {
        tracing::debug!(format = format.name(), "registered header format");
        self.formats.push(format);
    }

    pub fn by_name(&self, name: &str) -> Result<Arc<dyn HeaderFormat>> {
        self.formats
            .iter()
            .find(|format| format.name().eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| Error::UnknownFormat(name.to_string()))
    }

    /// First format whose header signature matches `bytes`.
    pub fn detect(&self, bytes: &[u8]) -> Option<Arc<dyn HeaderFormat>> {
        self.formats
            .iter()
            .find(|format| bytes.len() >= format.min_header_size() && format.is_header(bytes))
            .cloned()
    }

    /// First format claiming the extension of `path`.
    pub fn for_path(&self, path: &Path) -> Option<Arc<dyn HeaderFormat>> {
        self.formats
            .iter()
            .find(|format| format.has_extension(path))
            .cloned()
    }

    /// Format used when nothing else selects one.
    pub fn default_format(&self) -> Option<Arc<dyn HeaderFormat>> {
        self.formats.first().cloned()
    }

    /// Bytes to read before [`detect`](Self::detect) can decide.
    pub fn min_header_size(&self) -> usize {
        self.formats
            .iter()
            .map(|format| format.min_header_size())
            .max()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.formats.iter().map(|format| format.name()))
            .finish()
    }
}
