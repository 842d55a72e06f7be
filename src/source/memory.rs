use async_trait::async_trait;
use dashmap::DashMap;

use super::traits::{DatasetSource, SourceError};
use crate::dataset::Dataset;

/// Datasets held in memory, keyed by name.
pub struct InMemorySource {
    data: DashMap<String, Dataset>,
}

impl InMemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Add or replace a dataset
    pub fn insert(&self, name: impl Into<String>, dataset: Dataset) {
        self.data.insert(name.into(), dataset);
    }

    /// Parse and add a dataset from raw JSON
    pub fn insert_json(&self, name: impl Into<String>, bytes: &[u8]) -> Result<(), SourceError> {
        let dataset = Dataset::from_json(bytes)?;
        self.insert(name, dataset);
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Option<Dataset> {
        self.data.remove(name).map(|(_, d)| d)
    }

    /// Get current dataset count
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatasetSource for InMemorySource {
    async fn fetch(&self, name: &str) -> Result<Dataset, SourceError> {
        self.data
            .get(name)
            .map(|r| r.value().clone())
            .ok_or_else(|| SourceError::NotFound(name.to_string()))
    }

    async fn list(&self) -> Result<Vec<String>, SourceError> {
        let mut names: Vec<String> = self.data.iter().map(|r| r.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn exists(&self, name: &str) -> Result<bool, SourceError> {
        Ok(self.data.contains_key(name))
    }
}
