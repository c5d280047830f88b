pub mod chain;
pub mod config;
pub mod error;
pub mod filter;
pub mod gate;
pub mod history;
pub mod llm;
pub mod reduce;
pub mod store;
pub mod synthesis;
pub mod templates;
pub mod types;

// Re-export primary types for convenience
pub use chain::{ChainRequest, RetrievalChain};
pub use config::ChainConfig;
pub use error::{ChainError, ChainResult};
pub use filter::{simplify, RetrievalFilter, SimplifiedFilter, NO_FILTERS_APPLIED};
pub use gate::Disclosure;
pub use history::{DialogueTurn, HistoryFormatter, RoleLabelFormatter};
pub use llm::LanguageModel;
pub use reduce::Tokenizer;
pub use store::{DocumentSource, Retriever, VectorStore};
pub use synthesis::{AnswerSynthesizer, SynthesisStrategy};
pub use types::{AnswerResult, ChainOutcome, Document, RetrievalOutcome};
