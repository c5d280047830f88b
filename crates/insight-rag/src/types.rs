use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::filter::{RetrievalFilter, SimplifiedFilter};
use crate::gate::Disclosure;

/// Unit of retrieved content. Owned by the document store; the pipeline
/// shares it and never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub text: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// What one retrieval produced: the documents handed back for context plus
/// the number of items that matched the filter overall. `match_count` is
/// the authoritative input to the confidentiality gate and may exceed
/// `documents.len()` when the store returns fewer items than it matched.
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub documents: Vec<Arc<Document>>,
    pub match_count: usize,
}

/// Final record of one invocation. Built once, never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    /// Synthesized answer, or the refusal text for gated groups.
    pub answer: String,
    /// How the confidentiality gate ruled. Refusals are distinguished from
    /// answers by this variant, not by parsing `answer`.
    pub disclosure: Disclosure,
    pub filter: Option<RetrievalFilter>,
    pub simplified_filter: SimplifiedFilter,
    /// Post-filter match count reported by the store.
    pub match_count: usize,
}

#[derive(Debug, Clone)]
pub struct ChainOutcome {
    pub result: AnswerResult,
    /// Present only when the chain is configured to return sources.
    pub source_documents: Option<Vec<Arc<Document>>>,
}
