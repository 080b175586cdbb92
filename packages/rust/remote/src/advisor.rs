//! Synonym and noise advice through the chat model.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use chaingraph_core::{Advice, MergeSuggestion, SynonymAdvisor};
use chaingraph_shared::Result;

use crate::chat::ChatClient;
use crate::json::parse_object;
use crate::prompts;

#[derive(Debug, Default, Deserialize)]
struct RawAdvice {
    #[serde(default)]
    merge_suggestions: Vec<RawSuggestion>,
    #[serde(default)]
    merge_pairs: Vec<RawPair>,
    #[serde(default)]
    invalid_nodes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    target_node: String,
    #[serde(default)]
    source_nodes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawPair {
    keep: String,
    drop: String,
}

pub struct LlmSynonymAdvisor {
    chat: ChatClient,
}

impl LlmSynonymAdvisor {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }
}

/// Normalize either advice shape; anything unparseable is empty advice.
pub(crate) fn interpret(raw: &str) -> Advice {
    let Some(parsed) = parse_object(raw).and_then(|v| serde_json::from_value::<RawAdvice>(v).ok())
    else {
        warn!("unparseable synonym advice, ignoring");
        return Advice::default();
    };

    let mut merges: Vec<MergeSuggestion> = parsed
        .merge_suggestions
        .into_iter()
        .filter(|s| !s.target_node.trim().is_empty() && !s.source_nodes.is_empty())
        .map(|s| MergeSuggestion {
            target: s.target_node.trim().to_string(),
            sources: s.source_nodes.iter().map(|n| n.trim().to_string()).collect(),
        })
        .collect();

    merges.extend(
        parsed
            .merge_pairs
            .into_iter()
            .map(|p| (p.keep.trim().to_string(), p.drop.trim().to_string()))
            .filter(|(keep, drop)| !keep.is_empty() && !drop.is_empty() && keep != drop)
            .map(|(keep, drop)| MergeSuggestion {
                target: keep,
                sources: vec![drop],
            }),
    );

    let invalid = parsed
        .invalid_nodes
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();

    Advice { merges, invalid }
}

#[async_trait]
impl SynonymAdvisor for LlmSynonymAdvisor {
    #[instrument(skip_all, fields(%topic, names = names.len()))]
    async fn suggest(&self, topic: &str, names: &[String]) -> Result<Advice> {
        let prompt = prompts::synonym_advice(topic, names);
        let raw = self.chat.complete(prompts::ADVISOR_SYSTEM, &prompt).await?;
        let advice = interpret(&raw);
        info!(
            merges = advice.merges.len(),
            invalid = advice.invalid.len(),
            "synonym advice received"
        );
        Ok(advice)
    }
}
