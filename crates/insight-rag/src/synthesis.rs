//! Answer Synthesis Collaborator

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::Document;

/// How the synthesizer consumes its documents. Only `Concatenate` stuffs
/// every document verbatim into one prompt, so only it is subject to
/// token-budget trimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisStrategy {
    Concatenate,
    /// Documents summarized independently and merged afterwards.
    MapReduce,
}

/// Combines the accepted documents into the final answer text.
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    fn strategy(&self) -> SynthesisStrategy {
        SynthesisStrategy::Concatenate
    }

    /// Produce the final answer. The chain embeds the returned text
    /// unmodified.
    async fn synthesize(
        &self,
        documents: &[Arc<Document>],
        question: &str,
        history: &str,
    ) -> Result<String>;
}
