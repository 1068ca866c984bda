//! Error taxonomy of the persistence engine.

use phdiag::PhdiagError;
use thiserror::Error;

pub type Result<T, E = PersistenceError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Malformed, ragged, non-numeric or inconsistent input, detected before any simplices are built.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Invalid combination of configuration values, detected when the configuration is built.
    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },

    /// The requested dimension cannot be enumerated, either by configuration or because the
    /// simplex index space for the input does not fit in 64 bits.
    #[error("dimension {dimension} is not supported: {reason}")]
    DimensionExceeded { dimension: usize, reason: String },

    /// The filtered complex grew past the configured simplex budget.
    #[error("filtered complex exceeds the budget of {budget} simplices (reached {simplices})")]
    OutOfMemory { simplices: usize, budget: usize },

    #[error("boundary matrix reduction failed")]
    Reduction(#[source] PhdiagError),

    #[error("computation was cancelled")]
    Cancelled,

    /// A single input of a batch failed.
    #[error("input {index} failed: {source}")]
    Input {
        index: usize,
        #[source]
        source: Box<PersistenceError>,
    },

    /// Several inputs of a batch failed, sorted by index.
    #[error("{} batch inputs failed", .failures.len())]
    Batch {
        failures: Vec<(usize, PersistenceError)>,
    },
}

impl PersistenceError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Attach the position of the failing input within its batch.
    pub fn at_index(self, index: usize) -> Self {
        Self::Input {
            index,
            source: Box::new(self),
        }
    }

    /// Index of the failing input, if this error came from a batch.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Input { index, .. } => Some(*index),
            Self::Batch { failures } => failures.first().map(|(index, _)| *index),
            _ => None,
        }
    }

    /// The error with any batch context removed.
    pub fn root(&self) -> &PersistenceError {
        match self {
            Self::Input { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<PhdiagError> for PersistenceError {
    fn from(value: PhdiagError) -> Self {
        match value {
            PhdiagError::Interrupted => Self::Cancelled,
            other => Self::Reduction(other),
        }
    }
}
