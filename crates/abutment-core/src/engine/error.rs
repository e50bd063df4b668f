use super::config::ConfigError;
use super::ports::BackendError;
use crate::core::models::frame::Orientation;
use crate::core::registry::NamespaceError;
use std::fmt;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing registration, missing prerequisite region or invalid prescription.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Geometric constraint violated in frame {frame}: {reason}")]
    GeometricConstraint { frame: Orientation, reason: String },

    #[error("Region '{name}' in frame {frame} is locked and cannot be replaced")]
    IdempotencyConflict { frame: Orientation, name: String },

    #[error("No computed dose available: {0}")]
    DoseUnavailable(String),

    #[error("Collaborator call failed: {source}")]
    Backend {
        #[from]
        source: BackendError,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    pub(crate) fn from_namespace(frame: Orientation, err: NamespaceError) -> Self {
        match err {
            NamespaceError::Locked { name } => EngineError::IdempotencyConflict { frame, name },
        }
    }
}

/// Recoverable conditions recorded while a stage keeps going.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// A shell, band or mapped region ended up without contours.
    EmptyResult { frame: Orientation, name: String },
    /// A job ran without the background dose it was chained to.
    SequencingDegradation {
        rank: u32,
        background: u32,
        reason: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::EmptyResult { frame, name } => {
                write!(f, "Region '{name}' in frame {frame} has no contours")
            }
            Warning::SequencingDegradation {
                rank,
                background,
                reason,
            } => write!(
                f,
                "Job {rank} proceeds without background from job {background}: {reason}"
            ),
        }
    }
}

/// Collects the warnings raised during a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: Warning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn empty_results(&self) -> impl Iterator<Item = &str> {
        self.warnings.iter().filter_map(|w| match w {
            Warning::EmptyResult { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }
}
