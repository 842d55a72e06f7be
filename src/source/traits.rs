use async_trait::async_trait;
use thiserror::Error;

use crate::dataset::{Dataset, DatasetError};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Dataset '{0}' not found")]
    NotFound(String),
    #[error("Dataset source backend error: {0}")]
    Backend(String),
    #[error(transparent)]
    Invalid(#[from] DatasetError),
}

#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Fetch a dataset by name.
    async fn fetch(&self, name: &str) -> Result<Dataset, SourceError>;

    /// Names of the datasets this source can serve.
    async fn list(&self) -> Result<Vec<String>, SourceError>;

    /// Whether `name` can be fetched.
    /// Default implementation falls back to a full [`fetch`](Self::fetch).
    async fn exists(&self, name: &str) -> Result<bool, SourceError> {
        match self.fetch(name).await {
            Ok(_) => Ok(true),
            Err(SourceError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
