//! Token-Budget Trimming
//!
//! Keeps the combined token cost of the documents stuffed verbatim into one
//! synthesis prompt under the configured ceiling.

use std::sync::Arc;

use crate::types::Document;

/// Token counting for the target model. Pure: same text, same count.
pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}

/// Drop documents from the tail until the combined token cost fits the
/// budget. The result is always a prefix of the input, possibly empty when
/// even the leading documents overflow. `None` disables trimming.
pub fn reduce_to_token_budget(
    mut documents: Vec<Arc<Document>>,
    max_tokens: Option<usize>,
    tokenizer: &dyn Tokenizer,
) -> Vec<Arc<Document>> {
    let budget = match max_tokens {
        Some(budget) => budget,
        None => return documents,
    };

    let costs: Vec<usize> = documents
        .iter()
        .map(|doc| tokenizer.count_tokens(&doc.text))
        .collect();
    let mut keep = documents.len();
    let mut total: usize = costs.iter().sum();
    while keep > 0 && total > budget {
        keep -= 1;
        total -= costs[keep];
    }

    if keep < documents.len() {
        tracing::debug!(
            kept = keep,
            dropped = documents.len() - keep,
            budget,
            "Trimmed documents to fit the token budget"
        );
    }
    documents.truncate(keep);
    documents
}
