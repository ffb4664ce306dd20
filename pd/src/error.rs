//! Error types for the interactive session engine

use planstore::StoreError;
use thiserror::Error;

use crate::llm::LlmError;

/// Errors raised while routing and running a typed line
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Could not parse input: {0}")]
    Quote(String),

    /// Argument-parser error, already enriched with hints
    #[error("{0}")]
    Usage(String),

    /// Corrective message for the user; nothing was changed
    #[error("{0}")]
    User(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Nl(#[from] NlError),
}

/// Errors from turning references and intents into concrete records
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No {kind} matches '{reference}'")]
    NotFound { kind: &'static str, reference: String },

    #[error("'{reference}' matches {count} {kind}s; be more specific")]
    Ambiguous {
        kind: &'static str,
        reference: String,
        count: usize,
    },

    #[error("No active project. Run `use <project>` or pass --project <code>")]
    NoActiveProject,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Nl(#[from] NlError),
}

/// Errors from the natural-language collaborator
#[derive(Debug, Error)]
pub enum NlError {
    #[error("Natural-language features are not configured")]
    Unavailable,

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Could not understand the model reply: {0}")]
    Parse(String),

    #[error("Unknown draft conversation: {0}")]
    UnknownConversation(String),
}

impl NlError {
    /// True when the underlying HTTP request timed out
    pub fn is_timeout(&self) -> bool {
        matches!(self, NlError::Llm(e) if e.is_timeout())
    }
}
