use serde::{Deserialize, Serialize};
use std::path::Path;

/// Static knobs for the chain. Read-only after construction; concurrent
/// invocations share it without locking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Minimum post-filter match count before an aggregate answer may be
    /// disclosed.
    pub confidentiality_threshold: usize,
    /// Candidates the store considers before applying metadata filters.
    pub pre_filter_limit: usize,
    /// Results kept for context after filtering.
    pub post_filter_limit: usize,
    /// Combined token ceiling for documents stuffed verbatim into one
    /// synthesis prompt. `None` disables trimming.
    pub max_context_tokens: Option<usize>,
    /// Attach the retrieved documents to the outcome.
    pub return_sources: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            confidentiality_threshold: 10,
            pre_filter_limit: 3490,
            post_filter_limit: 50,
            max_context_tokens: None,
            return_sources: false,
        }
    }
}

impl ChainConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.pre_filter_limit == 0 {
            return Err("pre_filter_limit must be > 0".into());
        }
        if self.post_filter_limit == 0 {
            return Err("post_filter_limit must be > 0".into());
        }
        if self.post_filter_limit > self.pre_filter_limit {
            return Err("post_filter_limit must be <= pre_filter_limit".into());
        }
        if self.max_context_tokens == Some(0) {
            return Err("max_context_tokens must be > 0 when set".into());
        }
        Ok(())
    }

    /// Load config from a JSON file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}
