//! Prompt templates for the two model calls.

use std::collections::HashMap;

/// Rewrites a follow-up into a standalone question.
pub const CONDENSE_QUESTION_TEMPLATE: &str = "Given the following conversation and a follow up question, rephrase the follow up question to be a standalone question, in its original language.

Chat History:
{chat_history}
Follow Up Input: {question}
Standalone question:";

/// Answers from retrieved context.
pub const ANSWER_TEMPLATE: &str = "Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.

{context}

Chat History:
{chat_history}

Question: {question}
Helpful Answer:";

/// Substitutes `{name}` placeholders in one pass.
///
/// Substituted text is never rescanned, so braces inside user input or
/// retrieved chunks come through untouched. Unknown placeholders are left as is.
pub fn render(template: &str, values: &HashMap<&str, &str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if values.contains_key(&after[..close]) => {
                out.push_str(values[&after[..close]]);
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn condense_prompt(chat_history: &str, question: &str) -> String {
    render(
        CONDENSE_QUESTION_TEMPLATE,
        &HashMap::from([("chat_history", chat_history), ("question", question)]),
    )
}

pub fn answer_prompt(context: &str, chat_history: &str, question: &str) -> String {
    render(
        ANSWER_TEMPLATE,
        &HashMap::from([
            ("context", context),
            ("chat_history", chat_history),
            ("question", question),
        ]),
    )
}
