//! Prompt text for the question-condensation step. Rendering is owned by
//! the language-model collaborator; the chain only supplies the inputs.

/// Rewrites a follow-up question into a standalone question. Placeholders:
/// `{chat_history}`, `{question}`.
pub const CONDENSE_QUESTION_TEMPLATE: &str = "\
Given the following conversation and a follow up question, rephrase the \
follow up question to be a standalone question.

Chat History:
{chat_history}
Follow Up Input: {question}
Standalone question:";
