//! Entailment judgements from the chat model.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use chaingraph_verify::{Entailment, EntailmentOracle};

use crate::chat::ChatClient;
use crate::json::parse_json;
use crate::prompts;

/// [`EntailmentOracle`] backed by a chat completion. Any failure yields the
/// configured neutral score.
pub struct LlmEntailmentOracle {
    chat: ChatClient,
    neutral_score: f64,
}

impl LlmEntailmentOracle {
    pub fn new(chat: ChatClient, neutral_score: f64) -> Self {
        Self {
            chat,
            neutral_score,
        }
    }
}

/// Accepts `{"score": .., "evidence": ..}`, a bare number, or a numeric string.
pub(crate) fn interpret(raw: &str) -> Option<Entailment> {
    let value = match parse_json(raw) {
        Some(value) => value,
        None => Value::from(raw.trim().parse::<f64>().ok().filter(|s| s.is_finite())?),
    };
    match value {
        Value::Number(n) => n
            .as_f64()
            .filter(|s| s.is_finite())
            .map(|s| Entailment::new(s, None)),
        Value::Object(map) => {
            let score = match map.get("score")? {
                Value::Number(n) => n.as_f64()?,
                Value::String(s) => s.trim().parse::<f64>().ok()?,
                _ => return None,
            };
            if !score.is_finite() {
                return None;
            }
            let evidence = map
                .get("evidence")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            Some(Entailment::new(score, evidence))
        }
        _ => None,
    }
}

#[async_trait]
impl EntailmentOracle for LlmEntailmentOracle {
    async fn score(&self, premise: &str, hypothesis: &str) -> Entailment {
        let prompt = prompts::entailment(premise, hypothesis);
        let raw = match self.chat.complete(prompts::ENTAILMENT_SYSTEM, &prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "entailment request failed, using neutral score");
                return Entailment::neutral(self.neutral_score);
            }
        };

        match interpret(&raw) {
            Some(entailment) => {
                debug!(score = entailment.score, "entailment scored");
                entailment
            }
            None => {
                warn!("unparseable entailment output, using neutral score");
                Entailment::neutral(self.neutral_score)
            }
        }
    }
}
