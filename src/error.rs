//! Error taxonomy shared by every stage of the tracker.
//!
//! Only two situations surface as errors: invalid configuration, detected
//! before any per-frame processing, and internal-consistency violations that
//! indicate a bug (for instance an unclassifiable clipped geometry). Per-site
//! edge rejection is recorded as site state and optimiser non-convergence is
//! reported as a status; neither goes through this type.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    /// Invalid parameter detected while configuring a component.
    #[error("configuration error: {0}")]
    Config(String),

    /// Geometry or bookkeeping state that must never occur for valid input.
    #[error("internal consistency violation: {context}")]
    Internal { context: String },

    /// A linear system that should be solvable turned out singular.
    #[error("numeric failure: {0}")]
    Numeric(String),
}

impl TrackerError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        TrackerError::Config(msg.into())
    }

    pub(crate) fn internal(context: impl Into<String>) -> Self {
        TrackerError::Internal {
            context: context.into(),
        }
    }

    /// True for errors raised while validating parameters.
    pub fn is_config(&self) -> bool {
        matches!(self, TrackerError::Config(_))
    }

    /// True for errors that indicate a bug rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, TrackerError::Internal { .. })
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;

/// Fail with a configuration error unless `cond` holds.
#[inline]
pub(crate) fn ensure_config(cond: bool, msg: impl FnOnce() -> String) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(TrackerError::Config(msg()))
    }
}
