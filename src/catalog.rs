//! In-memory entity catalog behind the development host's search endpoint.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::ConfigError;
use crate::models::{EntityKind, SearchItem};

/// Maximum number of results returned by one search.
pub const SEARCH_LIMIT: usize = 20;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub samples: Vec<SearchItem>,
    #[serde(default)]
    pub datasets: Vec<SearchItem>,
}

impl Catalog {
    /// Loads `{samples: [...], datasets: [...]}`. Entries may use either
    /// `id`/`name` or the cache field names (`unique_id`, `sample_name`,
    /// `dataset_name`).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let catalog: Catalog = serde_json::from_str(&text)?;
        info!(
            path = %path.display(),
            samples = catalog.samples.len(),
            datasets = catalog.datasets.len(),
            "loaded catalog"
        );
        Ok(catalog)
    }

    pub fn entries(&self, kind: EntityKind) -> &[SearchItem] {
        match kind {
            EntityKind::Sample => &self.samples,
            EntityKind::Dataset => &self.datasets,
        }
    }

    /// Entries whose name contains `query` or whose id starts with it, both
    /// case-insensitive, in catalog order and capped at `SEARCH_LIMIT`. An
    /// empty query matches everything.
    pub fn search(&self, kind: EntityKind, query: &str) -> Vec<SearchItem> {
        let needle = query.trim().to_lowercase();
        self.entries(kind)
            .iter()
            .filter(|item| {
                needle.is_empty()
                    || item.name.to_lowercase().contains(&needle)
                    || item.id.to_lowercase().starts_with(&needle)
            })
            .take(SEARCH_LIMIT)
            .cloned()
            .collect()
    }
}
