//! Attribute weight table
//!
//! Maps usage tags to the signed weight that shifts a participant's ratio.
//! The predefined table is fixed for the life of a table. Custom tags coined
//! during a session are kept in a separate list for the catalog; every tag
//! outside the predefined table weighs the single custom weight.

use serde::Serialize;

use crate::config::{SplitConfig, TagWeight};

/// Compiled-in catalog, in display order
pub const PREDEFINED_TAGS: &[(&str, f64)] = &[
    ("Gaming PC", 0.3),
    ("Office Job", -0.1),
    ("Work from Home", 0.2),
    ("Night Owl", 0.1),
    ("Dual Monitors", 0.1),
    ("Electric Heater", 0.5),
    ("Always Home", 0.2),
    ("Frequently Out", -0.3),
];

/// One row of the catalog as shown to users
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub weight: f64,
    pub predefined: bool,
}

/// Predefined weights plus the session's registered custom tag names
#[derive(Debug, Clone)]
pub struct WeightTable {
    base: Vec<TagWeight>,
    custom: Vec<String>,
    custom_weight: f64,
}

impl WeightTable {
    pub fn new(base: Vec<TagWeight>, custom_weight: f64) -> Self {
        Self {
            base,
            custom: Vec::new(),
            custom_weight,
        }
    }

    pub fn from_config(config: &SplitConfig) -> Self {
        Self::new(config.tags.clone(), config.params.custom_tag_weight)
    }

    /// Weight for a tag. Exact, case-sensitive match against the predefined
    /// table; anything else (registered or not) gets the custom weight.
    pub fn weight_of(&self, tag: &str) -> f64 {
        self.base
            .iter()
            .find(|t| t.name == tag)
            .map(|t| t.weight)
            .unwrap_or(self.custom_weight)
    }

    pub fn is_predefined(&self, tag: &str) -> bool {
        self.base.iter().any(|t| t.name == tag)
    }

    pub fn is_custom(&self, tag: &str) -> bool {
        self.custom.iter().any(|t| t == tag)
    }

    /// Add a user-coined tag to the session catalog.
    ///
    /// Returns false for blank input or a tag already known (predefined or
    /// previously registered). The tag is stored trimmed.
    pub fn register_custom_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.is_predefined(tag) || self.is_custom(tag) {
            return false;
        }
        self.custom.push(tag.to_string());
        true
    }

    /// Predefined tags followed by custom tags in registration order
    pub fn catalog(&self) -> Vec<String> {
        self.base
            .iter()
            .map(|t| t.name.clone())
            .chain(self.custom.iter().cloned())
            .collect()
    }

    pub fn catalog_entries(&self) -> Vec<CatalogEntry> {
        let predefined = self.base.iter().map(|t| CatalogEntry {
            name: t.name.clone(),
            weight: t.weight,
            predefined: true,
        });
        let custom = self.custom.iter().map(|name| CatalogEntry {
            name: name.clone(),
            weight: self.custom_weight,
            predefined: false,
        });
        predefined.chain(custom).collect()
    }

    pub fn custom_tags(&self) -> &[String] {
        &self.custom
    }

    pub fn custom_weight(&self) -> f64 {
        self.custom_weight
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        Self::from_config(&SplitConfig::default())
    }
}
