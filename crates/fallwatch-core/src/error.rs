//! Error types for the Fallwatch engine.
//!
//! A single [`CoreError`] covers everything the engine itself can fail at;
//! the service and client crates wrap it in their own error types at the
//! API boundary.
//!
//! # Example
//!
//! ```rust
//! use fallwatch_core::error::{CoreError, CoreResult};
//!
//! fn check_threshold(value: f32) -> CoreResult<()> {
//!     if !(0.0..=1.0).contains(&value) {
//!         return Err(CoreError::validation("threshold outside [0, 1]"));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// A specialized `Result` type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Top-level error type for the Fallwatch engine.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    /// Validation error for input data
    #[error("Validation error: {message}")]
    Validation {
        /// Description of what validation failed
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error
        message: String,
    },

    /// Pose oracle failed to produce an observation
    #[error("Pose oracle error: {message}")]
    Oracle {
        /// Description of the oracle failure
        message: String,
    },

    /// Image decode or encode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl CoreError {
    /// Creates a new validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new oracle error.
    #[must_use]
    pub fn oracle(message: impl Into<String>) -> Self {
        Self::Oracle {
            message: message.into(),
        }
    }
}
