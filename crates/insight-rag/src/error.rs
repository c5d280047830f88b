//! Error taxonomy for the retrieval chain.
//!
//! Confidentiality refusals are not errors. They come back as normal
//! results carrying a `Disclosure`, so callers never have to match on
//! answer text to tell a refusal from a failure.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    /// The input mapping lacks a key the chain cannot run without.
    #[error("missing required input `{0}`")]
    MissingRequiredInput(&'static str),

    /// A dialogue turn was neither a role/content message nor a legacy
    /// (human, ai) pair.
    #[error("unsupported dialogue turn format: {0}")]
    UnsupportedTurnFormat(String),

    /// The filter nests deeper than one AND-of-OR level or uses a
    /// non-equality leaf. Simplification refuses rather than mis-report.
    #[error("unsupported filter shape: {0}")]
    FilterShapeUnsupported(String),

    /// The chain configuration cannot be written to disk as requested.
    #[error("chain configuration is not serializable: {0}")]
    NotSerializable(String),

    #[error("failed to persist chain configuration")]
    Persist(#[source] std::io::Error),

    /// A collaborator (model, store) failed. Passed through unchanged,
    /// no retry or masking here.
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

pub type ChainResult<T> = Result<T, ChainError>;
