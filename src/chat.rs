//! Conversational retrieval chain.
//!
//! One chat call condenses the follow-up question against history,
//! retrieves the nearest chunks, and streams an answer grounded in
//! them. When the combined prompt blows the model's context budget the
//! call is retried with a document count scaled down from the token
//! numbers in the provider's error, up to a bounded number of attempts.

use thiserror::Error;
use tracing::{debug, info};

use crate::embedding::EmbeddingClient;
use crate::error::ProviderError;
use crate::index::VectorIndex;
use crate::llm::{ChatMessage, LlmClient};
use crate::models::{ChatAnswer, QuestionRequest, SourceRef};

const CONDENSE_PROMPT: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question.\n\n\
Chat History:\n{chat_history}\n\
Follow Up Input: {question}\n\
Standalone question:";

const QA_PROMPT: &str = "You are a helpful AI assistant. Use the following pieces of context \
to answer the question at the end.\n\
If you don't know the answer, just say you don't know. DO NOT try to make up an answer.\n\
If the question is not related to the context, politely respond that you are tuned to only \
answer questions that are related to the context.\n\n\
{context}\n\n\
Question: {question}\n\
Helpful answer:";

/// Tokens assumed to be consumed by the prompt template itself.
const ASSUMED_PROMPT_TOKENS: i64 = 250;
/// Tokens reserved for the model's reply.
const BASE_TOKEN_USAGE: i64 = 115;

const MODEL_ALLOW_LIST: &[&str] = &[
    "gpt-3.5-turbo",
    "gpt-3.5-turbo-0301",
    "gpt-4",
    "gpt-4-0314",
    "anthropic",
];

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Algorithm not recognized")]
    AlgorithmNotRecognized,

    #[error("'{model}' model not allowed with '{algo_name}'")]
    ModelNotAllowed { model: String, algo_name: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Events surfaced to the transport while a chat call runs.
#[derive(Debug)]
pub enum StreamEvent {
    Token(String),
    /// Emitted when a context overflow forces a retry with fewer
    /// documents, so clients can discard partial output.
    Retry,
    SourceDocs(Vec<SourceRef>),
}

/// Check the model against the algorithm's allow list. Unknown
/// algorithms and disallowed models are terminal request errors.
pub fn validate_model_and_algo(model: &str, algo: &str) -> Result<(), ChatError> {
    let algo_name = match algo {
        "ConversationalRetrievalChain-lc" => "ConversationalRetrievalChain",
        "ConversationalRetrievalQAChain-lc" => "ConversationalRetrievalQAChain",
        _ => return Err(ChatError::AlgorithmNotRecognized),
    };
    if MODEL_ALLOW_LIST.contains(&model) {
        return Ok(());
    }
    Err(ChatError::ModelNotAllowed {
        model: model.to_string(),
        algo_name: algo_name.to_string(),
    })
}

/// Embedding models do better without hard line breaks in the query.
pub fn sanitize_question(question: &str) -> String {
    question.trim().replace('\n', " ")
}

/// Scale the document count down after a context overflow.
///
/// `limit` and `used` come from the provider's error. The usable budget
/// discounts the prompt template and the reply reservation; the ratio
/// of budget to actual usage scales the count, truncating toward zero.
/// A no-op reduction steps down by one instead. Returns `None` when no
/// smaller count can help, which callers treat as fatal.
pub fn reduced_document_count(current: i64, limit: i64, used: i64) -> Option<i64> {
    if current <= 0 {
        return None;
    }
    let available = limit - ASSUMED_PROMPT_TOKENS - BASE_TOKEN_USAGE;
    let overflowed = used - ASSUMED_PROMPT_TOKENS;
    if available <= 0 || overflowed <= 0 {
        return None;
    }

    let ratio = available as f64 / overflowed as f64;
    let mut target = (current as f64 * ratio).trunc() as i64;
    if target == current {
        target -= 1;
    }
    debug!(current, limit, used, target, "document count reduction");
    if target <= 0 {
        return None;
    }
    Some(target)
}

fn format_history(history: &[(String, String)]) -> String {
    history
        .iter()
        .map(|(question, answer)| format!("Human: {}\nAssistant: {}", question, answer))
        .collect::<Vec<_>>()
        .join("\n")
}

fn fill(template: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in pairs {
        out = out.replace(&format!("{{{}}}", key), value);
    }
    out
}

pub struct ChatChain<'a> {
    pub llm: &'a LlmClient,
    pub embeddings: &'a EmbeddingClient,
    pub index: &'a VectorIndex,
    pub max_attempts: u32,
}

impl ChatChain<'_> {
    /// Run the full chain, forwarding stream events as they happen.
    /// Returns the complete answer with its cited sources.
    pub async fn answer(
        &self,
        request: &QuestionRequest,
        on_event: &mut (dyn FnMut(StreamEvent) + Send),
    ) -> Result<ChatAnswer, ChatError> {
        validate_model_and_algo(&request.model, &request.algo)?;

        let question = sanitize_question(&request.question);
        let standalone = if request.history.is_empty() {
            question.clone()
        } else {
            let prompt = fill(
                CONDENSE_PROMPT,
                &[
                    ("chat_history", &format_history(&request.history)),
                    ("question", &question),
                ],
            );
            self.llm
                .complete(&request.model, &[ChatMessage::user(prompt)])
                .await?
        };

        let query_vector = self
            .embeddings
            .embed(std::slice::from_ref(&standalone))
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut document_count = request.document_count;
        for attempt in 1..=self.max_attempts {
            info!(attempt, document_count, "calling chain");
            let sources = self.index.query(&query_vector, document_count).await?;
            let context = sources
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");

            let prompt = fill(QA_PROMPT, &[("context", &context), ("question", &question)]);
            let result = self
                .llm
                .stream_complete(&request.model, &[ChatMessage::user(prompt)], |token| {
                    on_event(StreamEvent::Token(token.to_string()))
                })
                .await;

            match result {
                Ok(answer) => {
                    on_event(StreamEvent::SourceDocs(sources.clone()));
                    return Ok(ChatAnswer { answer, sources });
                }
                Err(ProviderError::ContextLengthExceeded { limit, used })
                    if attempt < self.max_attempts =>
                {
                    match reduced_document_count(document_count, limit, used) {
                        Some(reduced) => {
                            document_count = reduced;
                            on_event(StreamEvent::Retry);
                        }
                        None => {
                            return Err(
                                ProviderError::ContextLengthExceeded { limit, used }.into()
                            )
                        }
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
        unreachable!("loop always returns on the final attempt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_algorithms_accept_the_allow_list() {
        for algo in [
            "ConversationalRetrievalChain-lc",
            "ConversationalRetrievalQAChain-lc",
        ] {
            for model in MODEL_ALLOW_LIST {
                validate_model_and_algo(model, algo).unwrap();
            }
        }
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let err = validate_model_and_algo("gpt-4", "MapReduceChain-lc").unwrap_err();
        assert_eq!(err.to_string(), "Algorithm not recognized");
    }

    #[test]
    fn disallowed_model_names_the_algorithm() {
        let err =
            validate_model_and_algo("gpt-5", "ConversationalRetrievalQAChain-lc").unwrap_err();
        assert_eq!(
            err.to_string(),
            "'gpt-5' model not allowed with 'ConversationalRetrievalQAChain'"
        );
    }

    #[test]
    fn question_newlines_become_spaces() {
        assert_eq!(sanitize_question("  what\nis\nthis  "), "what is this");
    }

    #[test]
    fn overflow_scales_twenty_docs_to_six() {
        // limit 4097, used 12617: budget 3732 over 12367 overflowed.
        assert_eq!(reduced_document_count(20, 4097, 12617), Some(6));
    }

    #[test]
    fn no_op_reduction_steps_down_by_one() {
        // A ratio just under 1.0 truncates back to the same count.
        assert_eq!(reduced_document_count(4, 4462, 4100), Some(3));
    }

    #[test]
    fn reduction_to_zero_is_fatal() {
        assert_eq!(reduced_document_count(1, 4097, 12617), None);
    }

    #[test]
    fn nonpositive_count_is_fatal() {
        assert_eq!(reduced_document_count(0, 4097, 12617), None);
        assert_eq!(reduced_document_count(-1, 4097, 12617), None);
    }

    #[test]
    fn tiny_budget_is_fatal() {
        assert_eq!(reduced_document_count(10, 300, 5000), None);
        assert_eq!(reduced_document_count(10, 5000, 200), None);
    }

    #[test]
    fn history_formats_as_human_assistant_turns() {
        let history = vec![
            ("hi".to_string(), "hello".to_string()),
            ("more?".to_string(), "sure".to_string()),
        ];
        assert_eq!(
            format_history(&history),
            "Human: hi\nAssistant: hello\nHuman: more?\nAssistant: sure"
        );
    }

    #[test]
    fn templates_fill_every_placeholder() {
        let filled = fill(QA_PROMPT, &[("context", "CTX"), ("question", "Q")]);
        assert!(filled.contains("CTX"));
        assert!(filled.contains("Question: Q"));
        assert!(!filled.contains('{'));
    }
}
