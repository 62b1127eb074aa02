//! Core error taxonomy. Every variant maps to one recovery policy at the
//! turn boundary; none of these ever surface raw to the end user.

use crate::profile::Stage;

/// Boxed error used at the tool-execution boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Persistence backend failure (sled). Retried with back-off, then the
    /// turn degrades to cache-only.
    #[error("memory store error: {0}")]
    Memory(#[from] sled::Error),

    /// Profile (de)serialization failure.
    #[error("profile codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Catalog query failure. Tool-local fallback to safe copy.
    #[error("catalog error: {0}")]
    Catalog(#[from] rusqlite::Error),

    /// LLM provider failure. Swallowed at the validator boundary.
    #[error("llm error: {0}")]
    Llm(String),

    /// Email gateway failure. Surfaced to the user inside the advisor flow.
    #[error("email gateway error: {0}")]
    Email(String),

    /// Illegal state-machine transition request. Logged and ignored; the
    /// user is re-prompted for the current state.
    #[error("illegal stage transition {from:?} -> {to:?}")]
    InvalidTransition { from: Stage, to: Stage },

    /// A step exceeded its timeout budget.
    #[error("step timed out: {0}")]
    Timeout(&'static str),

    /// Malformed user input inside a structured flow (email, phone).
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}

pub type CoreResult<T> = Result<T, CoreError>;
