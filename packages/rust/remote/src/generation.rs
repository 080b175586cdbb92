//! Candidate-fact generation through the chat model.

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use chaingraph_core::{Generation, Generator};
use chaingraph_shared::{CandidateBundle, EvidenceDoc, Result};

use crate::chat::ChatClient;
use crate::json::parse_object;
use crate::prompts;

pub struct LlmGenerator {
    chat: ChatClient,
}

impl LlmGenerator {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }
}

/// Turn raw model output into a [`Generation`]. Never fails.
pub(crate) fn interpret(raw: String) -> Generation {
    let Some(value) = parse_object(&raw) else {
        return Generation::Malformed {
            raw,
            error: "no JSON object in model output".into(),
        };
    };
    match serde_json::from_value::<CandidateBundle>(value) {
        Ok(candidate) => Generation::Candidate(candidate),
        Err(e) => Generation::Malformed {
            raw,
            error: e.to_string(),
        },
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    #[instrument(skip_all, fields(%entity, docs = context.len()))]
    async fn generate(&self, entity: &str, context: &[EvidenceDoc]) -> Result<Generation> {
        let prompt = prompts::extractor(entity, context);
        let raw = self.chat.complete(prompts::EXTRACTOR_SYSTEM, &prompt).await?;

        let generation = interpret(raw);
        match &generation {
            Generation::Candidate(c) => debug!(
                inputs = c.input_elements.len(),
                outputs = c.output_products.len(),
                "candidate parsed"
            ),
            Generation::Malformed { error, .. } => warn!(%error, "candidate output malformed"),
        }
        Ok(generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::tests::{answer, config_for};
    use wiremock::MockServer;

    #[test]
    fn fenced_candidate_is_parsed() {
        let raw = "```json\n{\"entity_name\": \"电池片\", \"input_elements\": [\"硅片\", \"\"], \"output_products\": \"组件\", \"key_technologies\": null}\n```";
        let Generation::Candidate(c) = interpret(raw.into()) else {
            panic!("expected a candidate");
        };
        assert_eq!(c.entity_name.as_deref(), Some("电池片"));
        assert_eq!(c.input_elements, vec!["硅片"]);
        assert_eq!(c.output_products, vec!["组件"]);
        assert!(c.key_technologies.is_empty());
    }

    #[test]
    fn prose_is_malformed_and_keeps_raw_output() {
        let Generation::Malformed { raw, .. } = interpret("抱歉，我无法回答。".into()) else {
            panic!("expected malformed output");
        };
        assert_eq!(raw, "抱歉，我无法回答。");
    }

    #[tokio::test]
    async fn generates_through_chat_endpoint() {
        let server = MockServer::start().await;
        answer(&server, r#"{"description": "把硅片加工成电池", "input_elements": ["硅片"]}"#).await;

        let generator = LlmGenerator::new(ChatClient::new(&config_for(&server)).unwrap());
        let generation = generator.generate("电池片", &[]).await.unwrap();
        let Generation::Candidate(c) = generation else {
            panic!("expected a candidate");
        };
        assert_eq!(c.description.as_deref(), Some("把硅片加工成电池"));
        assert!(c.has_content());
    }
}
