//! Encode parameter selection.
//!
//! An immutable table from output extension to [`EncodeOptions`]. Lookups are
//! best-effort: an extension without an entry gets an empty option set and
//! the encoder falls back to its own defaults.

use super::format::normalize_extension;
use super::params::{EncodeKey, EncodeOptions};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOptionsTable {
    entries: BTreeMap<String, EncodeOptions>,
}

impl EncodeOptionsTable {
    /// Build a table; keys are normalized like lookups (`.JPG` → `jpeg`).
    pub fn new<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, EncodeOptions)>,
        K: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(ext, opts)| (normalize_extension(ext.as_ref()), opts))
                .collect(),
        }
    }

    /// Options for an output extension, or an empty set if none are configured.
    pub fn select(&self, extension: &str) -> EncodeOptions {
        let key = normalize_extension(extension);
        match self.entries.get(&key) {
            Some(opts) => opts.clone(),
            None => {
                log::debug!("no encode options for '{key}', using codec defaults");
                EncodeOptions::new()
            }
        }
    }
}

impl Default for EncodeOptionsTable {
    fn default() -> Self {
        Self::new(default_entries())
    }
}

/// Stock encoder settings per output extension.
pub fn default_entries() -> [(&'static str, EncodeOptions); 3] {
    [
        ("jpeg", EncodeOptions::new().with(EncodeKey::JpegQuality, 85)),
        ("png", EncodeOptions::new().with(EncodeKey::PngCompression, 7)),
        ("webp", EncodeOptions::new().with(EncodeKey::WebpQuality, 85)),
    ]
}
