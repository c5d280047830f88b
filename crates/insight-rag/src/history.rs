//! Chat History Formatting
//!
//! Renders prior dialogue turns into the text blob fed to the
//! question-condensation prompt. An empty history renders to an empty
//! string, which downstream reads as "no prior context".

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChainError, ChainResult};

const HUMAN_LABEL: &str = "Human: ";
const AI_LABEL: &str = "Assistant: ";

/// One entry of prior dialogue, oldest first. Either a role-tagged message
/// or the legacy paired form carrying one human/assistant exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DialogueTurn {
    Message { role: String, content: String },
    Exchange { human: String, ai: String },
}

impl DialogueTurn {
    pub fn message(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Message {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn exchange(human: impl Into<String>, ai: impl Into<String>) -> Self {
        Self::Exchange {
            human: human.into(),
            ai: ai.into(),
        }
    }

    /// Parse a turn from a loose JSON input mapping: either a
    /// `{"role": ..., "content": ...}` object or a legacy two-element
    /// `[human, ai]` array. Anything else is an unsupported turn format.
    pub fn from_value(value: &Value) -> ChainResult<Self> {
        match value {
            Value::Object(map) => {
                let role = map.get("role").and_then(Value::as_str);
                let content = map.get("content").and_then(Value::as_str);
                match (role, content) {
                    (Some(role), Some(content)) => Ok(Self::message(role, content)),
                    _ => Err(ChainError::UnsupportedTurnFormat(value.to_string())),
                }
            }
            Value::Array(items) if items.len() == 2 => {
                match (items[0].as_str(), items[1].as_str()) {
                    (Some(human), Some(ai)) => Ok(Self::exchange(human, ai)),
                    _ => Err(ChainError::UnsupportedTurnFormat(value.to_string())),
                }
            }
            other => Err(ChainError::UnsupportedTurnFormat(other.to_string())),
        }
    }
}

/// Strategy for rendering prior turns into the condensation prompt.
/// Injectable so callers can match whatever format their condensation
/// prompt was tuned on.
pub trait HistoryFormatter: Send + Sync {
    fn format(&self, turns: &[DialogueTurn]) -> ChainResult<String>;
}

/// Default formatter: fixed labels for the "human" and "ai" roles, the
/// literal role name for anything else, one line per message and two lines
/// per legacy exchange. Turn order is preserved.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoleLabelFormatter;

impl HistoryFormatter for RoleLabelFormatter {
    fn format(&self, turns: &[DialogueTurn]) -> ChainResult<String> {
        let mut lines = Vec::with_capacity(turns.len() * 2);
        for turn in turns {
            match turn {
                DialogueTurn::Message { role, content } => {
                    let line = match role.as_str() {
                        "human" => format!("{}{}", HUMAN_LABEL, content),
                        "ai" => format!("{}{}", AI_LABEL, content),
                        other => format!("{}: {}", other, content),
                    };
                    lines.push(line);
                }
                DialogueTurn::Exchange { human, ai } => {
                    lines.push(format!("{}{}", HUMAN_LABEL, human));
                    lines.push(format!("{}{}", AI_LABEL, ai));
                }
            }
        }
        Ok(lines.join("\n"))
    }
}
