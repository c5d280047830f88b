//! Document Retrieval Collaborators
//!
//! Two ways to get documents, selected at construction: a plain retriever,
//! or a vector store that applies metadata filters itself and reports how
//! many items matched.

use std::sync::{Arc, Once};

use anyhow::Result;
use async_trait::async_trait;

use crate::config::ChainConfig;
use crate::filter::RetrievalFilter;
use crate::types::{Document, RetrievalOutcome};

/// Plain retriever: documents for a query, no match accounting and no
/// filter support. The adapter reports the returned length as the match
/// count.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<Arc<Document>>>;
}

/// Similarity search with metadata filtering. `pre_filter_limit` bounds the
/// candidates considered before filtering; `post_filter_limit` bounds what
/// comes back for context. The outcome's match count is how many items
/// satisfied the filter overall and may exceed the returned documents.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn search(
        &self,
        query: &str,
        pre_filter_limit: usize,
        post_filter_limit: usize,
        filter: Option<&RetrievalFilter>,
    ) -> Result<RetrievalOutcome>;
}

static VECTOR_STORE_NOTICE: Once = Once::new();

/// Where the chain gets its documents.
pub enum DocumentSource {
    Retriever(Arc<dyn Retriever>),
    VectorStore(Arc<dyn VectorStore>),
}

impl DocumentSource {
    pub fn retriever(retriever: Arc<dyn Retriever>) -> Self {
        Self::Retriever(retriever)
    }

    /// Vector-store-backed source. Deprecated in favor of wrapping the
    /// store in a [`Retriever`]; kept for stores whose filtered search is
    /// the only way to obtain a post-filter match count.
    pub fn vector_store(store: Arc<dyn VectorStore>) -> Self {
        VECTOR_STORE_NOTICE.call_once(|| {
            tracing::warn!(
                "Vector-store-backed retrieval is deprecated; prefer a Retriever-backed source"
            );
        });
        Self::VectorStore(store)
    }

    pub(crate) async fn fetch(
        &self,
        question: &str,
        filter: Option<&RetrievalFilter>,
        config: &ChainConfig,
    ) -> Result<RetrievalOutcome> {
        match self {
            Self::Retriever(retriever) => {
                let documents = retriever.retrieve(question).await?;
                let match_count = documents.len();
                Ok(RetrievalOutcome {
                    documents,
                    match_count,
                })
            }
            Self::VectorStore(store) => {
                store
                    .search(
                        question,
                        config.pre_filter_limit,
                        config.post_filter_limit,
                        filter,
                    )
                    .await
            }
        }
    }
}
