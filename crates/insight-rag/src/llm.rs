//! Language-Model Collaborator
//!
//! The chain never talks to a model directly; it goes through this
//! contract. No retry or caching here, failures propagate to the caller.

use anyhow::Result;
use async_trait::async_trait;

/// External language model used for question condensation.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Rewrite a follow-up question into a standalone one using the
    /// formatted chat history. The output is used verbatim as the search
    /// query.
    async fn condense(&self, question: &str, history: &str) -> Result<String>;
}
