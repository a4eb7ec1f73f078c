//! Custom error types for the crate.
//!
//! This module defines the primary error type, `ToroError`, shared by program synthesis
//! and the controller session. Using the `thiserror` crate, it gives every failure a
//! single, matchable home and lets `?` lift I/O and configuration errors automatically.
//!
//! ## Error Hierarchy
//!
//! Variants fall into the classes returned by [`ToroError::kind`]:
//!
//! - **Validation**: malformed input caught before any remote interaction (empty target
//!   list, empty catalog, missing local file, non-finite or non-unit pose, unreadable
//!   target literal). These never
//!   have side effects.
//! - **Session**: logon failures, an unreachable controller, a controller that is not in
//!   automatic mode, or an operation attempted in the wrong session state. Never retried
//!   automatically.
//! - **Protocol**: the controller answered but refused (unknown symbol, wrong data type,
//!   rejected module). The session still releases mastership before these surface.
//! - **Io**: local file read/write failures.
//! - **Config**: configuration loading and validation.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::controller::transport::OperatingMode;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, ToroError>;

/// Coarse classification of a [`ToroError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad local input, detected before any side effect.
    Validation,
    /// Connection, credential, or operating-mode problem.
    Session,
    /// The controller refused the request.
    Protocol,
    /// Local file system failure.
    Io,
    /// Configuration could not be loaded or is invalid.
    Config,
}

#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum ToroError {
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("Target list is empty")]
    EmptyTargetList,

    #[error("Parameter list '{0}' is empty")]
    ParameterListEmpty(&'static str),

    #[error("Target lists differ in length: {0} through-points vs {1} destinations")]
    MismatchedTargets(usize, usize),

    #[error("Invalid level {0}: catalog levels must be finite")]
    InvalidLevel(f64),

    #[error("Invalid pose: {0}")]
    InvalidPose(String),

    #[error("Invalid literal '{literal}': {reason}")]
    InvalidLiteral { literal: String, reason: String },

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Automatic mode is required to start execution from a remote client (controller is in {0} mode)")]
    ModeError(OperatingMode),

    #[error("Operation '{operation}' requires {required}, session is {actual}")]
    InvalidSessionState {
        operation: &'static str,
        required: &'static str,
        actual: String,
    },

    #[error("Symbol '{name}' not found in module '{module}'")]
    SymbolNotFound { module: String, name: String },

    #[error("Type mismatch writing '{name}': controller holds {expected}, value is {found}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("Controller rejected '{file}': {reason}")]
    LoadRejected { file: String, reason: String },

    #[error("Controller error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Configuration validation error: {0}")]
    Configuration(String),
}

impl ToroError {
    /// Classifies the error into the validation/session/protocol/io taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToroError::InvalidCatalog(_)
            | ToroError::EmptyTargetList
            | ToroError::ParameterListEmpty(_)
            | ToroError::MismatchedTargets(..)
            | ToroError::InvalidLevel(_)
            | ToroError::InvalidPose(_)
            | ToroError::InvalidLiteral { .. }
            | ToroError::FileNotFound(_) => ErrorKind::Validation,
            ToroError::Session(_)
            | ToroError::ModeError(_)
            | ToroError::InvalidSessionState { .. } => ErrorKind::Session,
            ToroError::SymbolNotFound { .. }
            | ToroError::TypeMismatch { .. }
            | ToroError::LoadRejected { .. }
            | ToroError::Protocol(_) => ErrorKind::Protocol,
            ToroError::Io(_) => ErrorKind::Io,
            ToroError::Config(_) | ToroError::Configuration(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn invalid_literal(literal: &str, reason: impl Into<String>) -> Self {
        ToroError::InvalidLiteral {
            literal: literal.to_string(),
            reason: reason.into(),
        }
    }
}
