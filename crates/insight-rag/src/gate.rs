//! Confidentiality Gate
//!
//! Decides from the post-filter match count whether an aggregate answer may
//! be disclosed. Groups below the configured threshold get a refusal text
//! instead of a synthesized answer, so small cohorts cannot be singled out.

use serde::{Deserialize, Serialize};

/// Outcome of the gate for one invocation. Recomputed fresh on every call;
/// nothing persists between invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disclosure {
    NoResults,
    BelowThreshold,
    Answerable,
}

impl Disclosure {
    /// `0` matches refuse outright, `1..threshold` refuse with advice to
    /// broaden the group, anything else may be answered.
    pub fn evaluate(match_count: usize, threshold: usize) -> Self {
        if match_count == 0 {
            Self::NoResults
        } else if match_count < threshold {
            Self::BelowThreshold
        } else {
            Self::Answerable
        }
    }
}

pub const NO_RESULTS_MESSAGE: &str = "No items found for these attributes";

/// Refusal text for groups smaller than the confidentiality threshold.
pub fn below_threshold_message(threshold: usize) -> String {
    format!(
        "The number of items in this group is below the confidentiality threshold ({}). \
         Please try broadening the group.",
        threshold
    )
}
