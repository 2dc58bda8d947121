//! Drawing lookup
//!
//! Resolves a detector class name to one of the pre-rendered sketches for
//! that class. Names the dataset doesn't know are mapped through an alias
//! table, and anything still unresolved falls back to a configured default
//! category.

mod store;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub use store::{AssetStore, CATEGORY_EXTENSION, Drawing, Stroke};

use crate::{Error, Result};

/// Number of addressable drawings per category
pub const DRAWINGS_PER_CATEGORY: usize = 100;

/// Category used when a class name can't be resolved
pub const DEFAULT_CATEGORY: &str = "scorpion";

/// Class name → drawing resolver
#[derive(Debug)]
pub struct DrawingLookup {
    store: AssetStore,
    label_map_path: PathBuf,
    default_category: String,
    aliases: HashMap<String, String>,
    categories: Vec<String>,
}

impl DrawingLookup {
    /// Create a lookup over `dataset_dir`
    ///
    /// Nothing is read until [`DrawingLookup::setup`] is called.
    pub fn new(
        dataset_dir: impl Into<PathBuf>,
        label_map_path: impl Into<PathBuf>,
        default_category: impl Into<String>,
    ) -> Self {
        Self {
            store: AssetStore::new(dataset_dir),
            label_map_path: label_map_path.into(),
            default_category: default_category.into(),
            aliases: HashMap::new(),
            categories: Vec::new(),
        }
    }

    /// Load the alias table and discover categories
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the label map is missing or is not a
    /// JSON object of strings, or if the dataset directory can't be listed
    pub fn setup(&mut self) -> Result<()> {
        self.aliases = load_label_map(&self.label_map_path)?;
        self.categories = self.store.discover_categories().map_err(|e| {
            Error::Config(format!(
                "failed to read drawing dataset {}: {e}",
                self.store.root().display()
            ))
        })?;

        if self.categories.binary_search(&self.default_category).is_err() {
            tracing::warn!(
                default = %self.default_category,
                "default category has no drawings in the dataset"
            );
        }

        tracing::info!(
            categories = self.categories.len(),
            aliases = self.aliases.len(),
            dataset = %self.store.root().display(),
            "drawing dataset ready"
        );
        Ok(())
    }

    /// Map a class name onto a dataset category
    ///
    /// Deterministic: the same name always resolves to the same category.
    #[must_use]
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        if self.is_category(name) {
            return name;
        }

        self.aliases
            .get(name)
            .map_or(self.default_category.as_str(), String::as_str)
    }

    /// Fetch drawing `index` for `name`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `index` is not below
    /// [`DRAWINGS_PER_CATEGORY`], and `NotFound` if the resolved category has
    /// no such drawing on disk
    pub fn get(&self, name: &str, index: usize) -> Result<Drawing> {
        if index >= DRAWINGS_PER_CATEGORY {
            return Err(Error::InvalidArgument(format!(
                "drawing index {index} out of range 0..{DRAWINGS_PER_CATEGORY}"
            )));
        }

        let category = self.resolve(name);
        if category != name {
            tracing::debug!(name, category, "resolved class name");
        }

        self.store.load(category, index)
    }

    /// Discovered category names, sorted
    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Check whether `name` is a dataset category
    #[must_use]
    pub fn is_category(&self, name: &str) -> bool {
        self.categories
            .binary_search_by(|c| c.as_str().cmp(name))
            .is_ok()
    }

    /// Category used for unresolved names
    #[must_use]
    pub fn default_category(&self) -> &str {
        &self.default_category
    }
}

fn load_label_map(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("failed to read label map {}: {e}", path.display()))
    })?;

    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("malformed label map {}: {e}", path.display()))
    })
}
