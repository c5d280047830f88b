//! Conversation-Aware Retrieval Chain
//!
//! Orchestrates one invocation end to end: condense the question against
//! the chat history, retrieve candidates, trim them to the token budget,
//! gate on the post-filter match count, and synthesize an answer only when
//! the group is large enough to disclose.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::config::ChainConfig;
use crate::error::{ChainError, ChainResult};
use crate::filter::{simplify, RetrievalFilter, SimplifiedFilter};
use crate::gate::{below_threshold_message, Disclosure, NO_RESULTS_MESSAGE};
use crate::history::{DialogueTurn, HistoryFormatter, RoleLabelFormatter};
use crate::llm::LanguageModel;
use crate::reduce::{reduce_to_token_budget, Tokenizer};
use crate::store::DocumentSource;
use crate::synthesis::{AnswerSynthesizer, SynthesisStrategy};
use crate::types::{AnswerResult, ChainOutcome};

/// One invocation's inputs. History is oldest-first; the filter is
/// optional and reaches the store untouched.
#[derive(Debug, Clone)]
pub struct ChainRequest {
    pub question: String,
    pub chat_history: Vec<DialogueTurn>,
    pub filter: Option<RetrievalFilter>,
}

impl ChainRequest {
    pub fn new(question: impl Into<String>, chat_history: Vec<DialogueTurn>) -> Self {
        Self {
            question: question.into(),
            chat_history,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: RetrievalFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Build a request from a loose JSON input mapping with `question`,
    /// `chat_history`, and an optional `filter` key, as assembled by
    /// callers that construct inputs dynamically.
    pub fn from_value(inputs: &Value) -> ChainResult<Self> {
        let question = inputs
            .get("question")
            .and_then(Value::as_str)
            .ok_or(ChainError::MissingRequiredInput("question"))?;
        let turns = inputs
            .get("chat_history")
            .and_then(Value::as_array)
            .ok_or(ChainError::MissingRequiredInput("chat_history"))?;
        let chat_history = turns
            .iter()
            .map(DialogueTurn::from_value)
            .collect::<ChainResult<Vec<_>>>()?;
        let filter = match inputs.get("filter") {
            None | Some(Value::Null) => None,
            Some(value) => Some(RetrievalFilter::from_value(value)?),
        };
        Ok(Self {
            question: question.to_string(),
            chat_history,
            filter,
        })
    }
}

pub struct RetrievalChain {
    model: Arc<dyn LanguageModel>,
    source: DocumentSource,
    synthesizer: Arc<dyn AnswerSynthesizer>,
    tokenizer: Arc<dyn Tokenizer>,
    formatter: Arc<dyn HistoryFormatter>,
    custom_formatter: bool,
    config: ChainConfig,
}

impl RetrievalChain {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        source: DocumentSource,
        synthesizer: Arc<dyn AnswerSynthesizer>,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Self {
        Self {
            model,
            source,
            synthesizer,
            tokenizer,
            formatter: Arc::new(RoleLabelFormatter),
            custom_formatter: false,
            config: ChainConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ChainConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default history formatter. A chain carrying a custom
    /// formatter can no longer be persisted with [`RetrievalChain::save`].
    pub fn with_history_formatter(mut self, formatter: Arc<dyn HistoryFormatter>) -> Self {
        self.formatter = formatter;
        self.custom_formatter = true;
        self
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Run one invocation. Collaborator failures abort the call; no
    /// partial outcome is ever returned.
    pub async fn run(&self, request: &ChainRequest) -> ChainResult<ChainOutcome> {
        // 1. Render prior dialogue for the condensation prompt
        let history = self.formatter.format(&request.chat_history)?;

        // 2. Summarize the filter for reporting, independent of retrieval.
        //    An unsupported shape degrades only this summary.
        let simplified = match simplify(request.filter.as_ref()) {
            Ok(simplified) => simplified,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Filter too complex to summarize, retrieval proceeds with the raw filter"
                );
                SimplifiedFilter::Unsupported {
                    reason: e.to_string(),
                }
            }
        };

        // 3. Condense the question; an empty history skips the model call
        let question = if history.is_empty() {
            tracing::debug!("Empty chat history, condensation skipped");
            request.question.clone()
        } else {
            self.model.condense(&request.question, &history).await?
        };

        // 4. Retrieve candidates and the authoritative match count
        let outcome = self
            .source
            .fetch(&question, request.filter.as_ref(), &self.config)
            .await?;
        let match_count = outcome.match_count;

        // 5. Trim to the token budget when documents are stuffed verbatim
        let documents = if self.synthesizer.strategy() == SynthesisStrategy::Concatenate {
            reduce_to_token_budget(
                outcome.documents,
                self.config.max_context_tokens,
                self.tokenizer.as_ref(),
            )
        } else {
            outcome.documents
        };

        // 6. Gate on the match count, synthesizing only when allowed
        let disclosure = Disclosure::evaluate(match_count, self.config.confidentiality_threshold);
        let answer = match disclosure {
            Disclosure::NoResults => {
                tracing::info!(match_count, "No matching items, answer withheld");
                NO_RESULTS_MESSAGE.to_string()
            }
            Disclosure::BelowThreshold => {
                tracing::info!(
                    match_count,
                    threshold = self.config.confidentiality_threshold,
                    "Group below confidentiality threshold, answer withheld"
                );
                below_threshold_message(self.config.confidentiality_threshold)
            }
            Disclosure::Answerable => {
                self.synthesizer
                    .synthesize(&documents, &question, &history)
                    .await?
            }
        };

        let result = AnswerResult {
            answer,
            disclosure,
            filter: request.filter.clone(),
            simplified_filter: simplified,
            match_count,
        };
        let source_documents = self.config.return_sources.then_some(documents);
        Ok(ChainOutcome {
            result,
            source_documents,
        })
    }

    /// Blocking wrapper over [`RetrievalChain::run`] for callers without an
    /// async runtime. Same code path, identical decisions for identical
    /// inputs.
    pub fn run_blocking(&self, request: &ChainRequest) -> ChainResult<ChainOutcome> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ChainError::Collaborator(e.into()))?;
        runtime.block_on(self.run(request))
    }

    /// Persist the chain configuration as JSON. Refuses when a custom
    /// history formatter is attached: function values cannot be written to
    /// disk, and dropping the formatter silently would change behavior on
    /// reload.
    pub fn save(&self, path: &Path) -> ChainResult<()> {
        if self.custom_formatter {
            return Err(ChainError::NotSerializable(
                "chain carries a custom history formatter".into(),
            ));
        }
        let json = serde_json::to_string_pretty(&self.config)
            .map_err(|e| ChainError::NotSerializable(e.to_string()))?;
        std::fs::write(path, json).map_err(ChainError::Persist)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::VectorStore;
    use crate::templates::CONDENSE_QUESTION_TEMPLATE;
    use crate::types::{Document, RetrievalOutcome};
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct TemplateModel {
        calls: AtomicUsize,
    }

    impl TemplateModel {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for TemplateModel {
        async fn condense(&self, question: &str, history: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Render the prompt the way a real provider would, then return
            // a canned standalone question.
            let _prompt = CONDENSE_QUESTION_TEMPLATE
                .replace("{chat_history}", history)
                .replace("{question}", question);
            Ok(format!("standalone: {}", question))
        }
    }

    struct ScriptedStore {
        documents: usize,
        match_count: usize,
        last_query: Mutex<Option<String>>,
    }

    impl ScriptedStore {
        fn new(documents: usize, match_count: usize) -> Arc<Self> {
            Arc::new(Self {
                documents,
                match_count,
                last_query: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl VectorStore for ScriptedStore {
        async fn search(
            &self,
            query: &str,
            _pre_filter_limit: usize,
            _post_filter_limit: usize,
            _filter: Option<&RetrievalFilter>,
        ) -> Result<RetrievalOutcome> {
            *self.last_query.lock().unwrap() = Some(query.to_string());
            Ok(RetrievalOutcome {
                documents: (0..self.documents)
                    .map(|i| Arc::new(Document::new(format!("comment {}", i))))
                    .collect(),
                match_count: self.match_count,
            })
        }
    }

    struct CannedSynthesizer {
        answer: &'static str,
        calls: AtomicUsize,
        last_doc_count: AtomicUsize,
    }

    impl CannedSynthesizer {
        fn new(answer: &'static str) -> Arc<Self> {
            Arc::new(Self {
                answer,
                calls: AtomicUsize::new(0),
                last_doc_count: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AnswerSynthesizer for CannedSynthesizer {
        async fn synthesize(
            &self,
            documents: &[Arc<Document>],
            _question: &str,
            _history: &str,
        ) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.last_doc_count.store(documents.len(), Ordering::SeqCst);
            Ok(self.answer.to_string())
        }
    }

    struct FixedCostTokenizer(usize);

    impl Tokenizer for FixedCostTokenizer {
        fn count_tokens(&self, _text: &str) -> usize {
            self.0
        }
    }

    fn chain_with(
        store: Arc<ScriptedStore>,
        model: Arc<TemplateModel>,
        synthesizer: Arc<CannedSynthesizer>,
    ) -> RetrievalChain {
        RetrievalChain::new(
            model,
            DocumentSource::vector_store(store),
            synthesizer,
            Arc::new(FixedCostTokenizer(10)),
        )
    }

    #[tokio::test]
    async fn test_small_group_gets_threshold_refusal() {
        let store = ScriptedStore::new(3, 3);
        let synthesizer = CannedSynthesizer::new("should not appear");
        let chain = chain_with(store, TemplateModel::new(), synthesizer.clone());

        let request = ChainRequest::new("what did people say?", Vec::new());
        let outcome = chain.run(&request).await.unwrap();

        assert_eq!(outcome.result.disclosure, Disclosure::BelowThreshold);
        assert_eq!(outcome.result.answer, below_threshold_message(10));
        assert_eq!(outcome.result.match_count, 3);
        assert!(outcome.source_documents.is_none());
        assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_matches_get_no_results_refusal() {
        let store = ScriptedStore::new(0, 0);
        let synthesizer = CannedSynthesizer::new("should not appear");
        let chain = chain_with(store, TemplateModel::new(), synthesizer.clone());

        let outcome = chain
            .run(&ChainRequest::new("anything?", Vec::new()))
            .await
            .unwrap();

        assert_eq!(outcome.result.disclosure, Disclosure::NoResults);
        assert_eq!(outcome.result.answer, NO_RESULTS_MESSAGE);
        assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_large_group_answer_passes_through_verbatim() {
        let store = ScriptedStore::new(15, 15);
        let synthesizer = CannedSynthesizer::new("X");
        let chain = chain_with(store, TemplateModel::new(), synthesizer.clone());

        let outcome = chain
            .run(&ChainRequest::new("summarize the feedback", Vec::new()))
            .await
            .unwrap();

        assert_eq!(outcome.result.disclosure, Disclosure::Answerable);
        assert_eq!(outcome.result.answer, "X");
        assert_eq!(outcome.result.match_count, 15);
        assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_history_skips_condensation() {
        let store = ScriptedStore::new(15, 15);
        let model = TemplateModel::new();
        let chain = chain_with(store.clone(), model.clone(), CannedSynthesizer::new("X"));

        chain
            .run(&ChainRequest::new("raw question", Vec::new()))
            .await
            .unwrap();

        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            store.last_query.lock().unwrap().as_deref(),
            Some("raw question")
        );
    }

    #[tokio::test]
    async fn test_history_routes_condensed_question_to_store() {
        let store = ScriptedStore::new(15, 15);
        let model = TemplateModel::new();
        let chain = chain_with(store.clone(), model.clone(), CannedSynthesizer::new("X"));

        let history = vec![DialogueTurn::exchange("earlier question", "earlier answer")];
        chain
            .run(&ChainRequest::new("and after that?", history))
            .await
            .unwrap();

        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            store.last_query.lock().unwrap().as_deref(),
            Some("standalone: and after that?")
        );
    }

    #[tokio::test]
    async fn test_sources_attached_only_when_configured() {
        let store = ScriptedStore::new(15, 15);
        let chain = chain_with(store, TemplateModel::new(), CannedSynthesizer::new("X"))
            .with_config(ChainConfig {
                return_sources: true,
                ..Default::default()
            });

        let outcome = chain
            .run(&ChainRequest::new("summarize", Vec::new()))
            .await
            .unwrap();

        let sources = outcome.source_documents.expect("sources requested");
        assert_eq!(sources.len(), 15);
    }

    #[tokio::test]
    async fn test_token_budget_trims_before_synthesis() {
        let store = ScriptedStore::new(5, 15);
        let synthesizer = CannedSynthesizer::new("X");
        let chain = chain_with(store, TemplateModel::new(), synthesizer.clone()).with_config(
            ChainConfig {
                max_context_tokens: Some(25),
                ..Default::default()
            },
        );

        let outcome = chain
            .run(&ChainRequest::new("summarize", Vec::new()))
            .await
            .unwrap();

        // 5 docs at 10 tokens each against a 25-token budget: 2 survive,
        // while the gate still sees the full match count.
        assert_eq!(synthesizer.last_doc_count.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.result.match_count, 15);
    }

    #[tokio::test]
    async fn test_unsupported_filter_degrades_reporting_only() {
        let store = ScriptedStore::new(15, 15);
        let chain = chain_with(store.clone(), TemplateModel::new(), CannedSynthesizer::new("X"));

        let nested = RetrievalFilter::And(vec![RetrievalFilter::And(vec![
            RetrievalFilter::eq("region", "EU"),
        ])]);
        let outcome = chain
            .run(&ChainRequest::new("summarize", Vec::new()).with_filter(nested.clone()))
            .await
            .unwrap();

        assert!(matches!(
            outcome.result.simplified_filter,
            SimplifiedFilter::Unsupported { .. }
        ));
        assert_eq!(outcome.result.answer, "X");
        assert_eq!(outcome.result.filter, Some(nested));
        assert!(store.last_query.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_filter_summary_reported_with_refusal() {
        let store = ScriptedStore::new(3, 3);
        let chain = chain_with(store, TemplateModel::new(), CannedSynthesizer::new("X"));

        let filter = RetrievalFilter::And(vec![
            RetrievalFilter::eq("region", "EU"),
            RetrievalFilter::Or(vec![
                RetrievalFilter::eq("tier", "gold"),
                RetrievalFilter::eq("tier", "silver"),
            ]),
        ]);
        let outcome = chain
            .run(&ChainRequest::new("summarize", Vec::new()).with_filter(filter))
            .await
            .unwrap();

        match &outcome.result.simplified_filter {
            SimplifiedFilter::ByField(fields) => {
                assert_eq!(fields["tier"], vec![json!("gold"), json!("silver")]);
            }
            other => panic!("expected ByField, got {:?}", other),
        }
    }

    #[test]
    fn test_blocking_path_makes_the_same_decision() {
        let store = ScriptedStore::new(3, 3);
        let chain = chain_with(store, TemplateModel::new(), CannedSynthesizer::new("X"));

        let outcome = chain
            .run_blocking(&ChainRequest::new("summarize", Vec::new()))
            .unwrap();
        assert_eq!(outcome.result.disclosure, Disclosure::BelowThreshold);
    }

    #[test]
    fn test_request_from_value_requires_question_and_history() {
        let err = ChainRequest::from_value(&json!({"chat_history": []})).unwrap_err();
        assert!(matches!(err, ChainError::MissingRequiredInput("question")));

        let err = ChainRequest::from_value(&json!({"question": "q"})).unwrap_err();
        assert!(matches!(
            err,
            ChainError::MissingRequiredInput("chat_history")
        ));

        let request = ChainRequest::from_value(&json!({
            "question": "q",
            "chat_history": [["a", "b"], {"role": "human", "content": "c"}],
            "filter": {"region": {"$eq": "EU"}},
        }))
        .unwrap();
        assert_eq!(request.chat_history.len(), 2);
        assert_eq!(request.filter, Some(RetrievalFilter::eq("region", "EU")));
    }

    #[test]
    fn test_save_rejects_custom_formatter() {
        struct UpperFormatter;
        impl HistoryFormatter for UpperFormatter {
            fn format(&self, turns: &[DialogueTurn]) -> ChainResult<String> {
                RoleLabelFormatter
                    .format(turns)
                    .map(|text| text.to_uppercase())
            }
        }

        let store = ScriptedStore::new(0, 0);
        let chain = chain_with(store, TemplateModel::new(), CannedSynthesizer::new("X"))
            .with_history_formatter(Arc::new(UpperFormatter));

        let path = std::env::temp_dir().join("insight-rag-chain-config.json");
        let err = chain.save(&path).unwrap_err();
        assert!(matches!(err, ChainError::NotSerializable(_)));
    }

    #[test]
    fn test_save_writes_default_configuration() {
        let store = ScriptedStore::new(0, 0);
        let chain = chain_with(store, TemplateModel::new(), CannedSynthesizer::new("X"));

        let path = std::env::temp_dir().join("insight-rag-default-config.json");
        chain.save(&path).unwrap();
        let reloaded = ChainConfig::from_file(&path).unwrap();
        assert_eq!(reloaded.confidentiality_threshold, 10);
        std::fs::remove_file(&path).ok();
    }
}
