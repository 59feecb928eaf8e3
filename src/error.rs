//! Error types for the wizard engine.
//!
//! Validation failures are not errors here: they are data (`ErrorMap`)
//! returned from validation runs and stored on the engine.

use serde::{Deserialize, Serialize};

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Wizard definition error: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed wizard definitions. Always fatal, raised at construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("Wizard has no steps")]
    NoSteps,

    #[error("Duplicate step id: {0}")]
    DuplicateStep(String),

    #[error("Field {field} is owned by both step {first} and step {second}")]
    DuplicateField {
        field: String,
        first: String,
        second: String,
    },

    #[error("Rule in step {step} references field {field}, which no step owns")]
    UnownedField { step: String, field: String },

    #[error("Rule {rule} cannot apply to field {field} of kind {kind}")]
    RuleKindMismatch {
        field: String,
        rule: String,
        kind: String,
    },

    #[error("Default value for field {field} does not match kind {kind}")]
    DefaultKindMismatch { field: String, kind: String },

    #[error("Discriminator {field} has no choices")]
    EmptyChoices { field: String },
}

/// Misuse of the engine's state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Cannot {action} while {state}")]
    InvalidTransition { action: String, state: String },

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Step index {index} out of range (wizard has {count} steps)")]
    StepOutOfRange { index: usize, count: usize },

    #[error("Field {field} expects a {expected} value")]
    KindMismatch { field: String, expected: String },

    #[error("Partial submissions require an existing record")]
    PartialSubmitInCreateMode,

    #[error("Field {0} is not a document slot")]
    NotADocumentSlot(String),

    #[error("Field {0} is never persisted")]
    NotPersisted(String),
}

/// Category tag for persistence failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionErrorKind {
    Network,
    Permission,
    Conflict,
    Unknown,
}

impl std::fmt::Display for SubmissionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Network => "network",
            Self::Permission => "permission",
            Self::Conflict => "conflict",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// A persistence failure. Never maps to a field; always retryable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind} failure: {message}")]
pub struct SubmissionError {
    pub kind: SubmissionErrorKind,
    pub message: String,
}

impl SubmissionError {
    pub fn new(kind: SubmissionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SubmissionErrorKind::Network, message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(SubmissionErrorKind::Permission, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(SubmissionErrorKind::Conflict, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(SubmissionErrorKind::Unknown, message)
    }

    /// Fallback text suitable for a single dismissible notice.
    pub fn user_message(&self) -> &'static str {
        match self.kind {
            SubmissionErrorKind::Network => {
                "We couldn't reach the server. Check your connection and try again."
            }
            SubmissionErrorKind::Permission => "You don't have permission to save this profile.",
            SubmissionErrorKind::Conflict => "A profile with these details already exists.",
            SubmissionErrorKind::Unknown => "Something went wrong while saving. Please try again.",
        }
    }
}

/// Document-upload failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("Upload of {slot} failed: {reason}")]
    Failed { slot: String, reason: String },

    #[error("Upload of {slot} rejected: file is empty")]
    EmptyFile { slot: String },
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
