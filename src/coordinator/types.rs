//! Public types for the grouping engine coordinator.

use thiserror::Error;

use crate::comparison::DiffError;
use crate::dataset::DatasetError;
use crate::rules::RuleError;
use crate::source::traits::SourceError;

/// Engine lifecycle state.
///
/// Use [`super::GroupingEngine::state()`] to check current state or
/// [`super::GroupingEngine::state_receiver()`] to watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Just created, no inputs yet
    Created,
    /// Inputs changed or incomplete, no current primary tree
    Waiting,
    /// Building the primary tree
    Aggregating,
    /// Primary tree is current
    Ready,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Waiting => write!(f, "Waiting"),
            Self::Aggregating => write!(f, "Aggregating"),
            Self::Ready => write!(f, "Ready"),
        }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine is missing inputs: {}", .0.join(", "))]
    NotReady(Vec<&'static str>),
    #[error("Previous aggregation has not finished rendering")]
    Processing,
    #[error("Result for '{0}' was superseded before it could be applied")]
    Superseded(String),
    #[error(transparent)]
    Diff(#[from] DiffError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Rules(#[from] RuleError),
}

impl EngineError {
    /// Short category for error metrics
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::NotReady(_) => "not_ready",
            Self::Processing => "processing",
            Self::Superseded(_) => "superseded",
            Self::Diff(_) => "diff",
            Self::Source(_) => "source",
            Self::Dataset(_) => "dataset",
            Self::Rules(_) => "rules",
        }
    }
}
