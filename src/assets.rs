//! Stores of bundled template assets
//!
//! Template identifiers ending in [`TEMPLATE_SUFFIX`] name an asset; anything
//! else is treated as literal template text by the provider.

use std::borrow::Cow;
use std::collections::BTreeMap;

use include_dir::{include_dir, Dir};

/// Identifiers with this suffix are looked up in an asset store
pub const TEMPLATE_SUFFIX: &str = ".tmpl";

static BUNDLED_TEMPLATES: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/templates");

/// Read-only lookup of named template assets
pub trait AssetStore {
    /// Raw bytes of the asset, or `None` when it does not exist
    fn get(&self, name: &str) -> Option<Cow<'_, [u8]>>;

    /// Names of every asset in the store, sorted
    fn names(&self) -> Vec<String>;
}

/// Templates compiled into the binary from the `templates/` directory
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedAssets;

impl AssetStore for EmbeddedAssets {
    fn get(&self, name: &str) -> Option<Cow<'_, [u8]>> {
        BUNDLED_TEMPLATES
            .get_file(name)
            .map(|file| Cow::Borrowed(file.contents()))
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = BUNDLED_TEMPLATES
            .files()
            .map(|file| file.path().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// In-memory asset store, mostly for tests and embedding applications
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    assets: BTreeMap<String, Vec<u8>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an asset
    pub fn with_asset(mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(name, contents);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.assets.insert(name.into(), contents.into());
    }
}

impl AssetStore for MemoryAssets {
    fn get(&self, name: &str) -> Option<Cow<'_, [u8]>> {
        self.assets
            .get(name)
            .map(|contents| Cow::Borrowed(contents.as_slice()))
    }

    fn names(&self) -> Vec<String> {
        self.assets.keys().cloned().collect()
    }
}
