//! Three-tier structure planning through the chat model.

use async_trait::async_trait;
use tracing::{info, instrument};

use chaingraph_core::StructurePlanner;
use chaingraph_shared::{EvidenceDoc, GraphError, Result, StructurePlan};

use crate::chat::ChatClient;
use crate::json::parse_object;
use crate::prompts;

pub struct LlmStructurePlanner {
    chat: ChatClient,
}

impl LlmStructurePlanner {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }
}

pub(crate) fn interpret(raw: &str) -> Result<StructurePlan> {
    let value = parse_object(raw)
        .ok_or_else(|| GraphError::parse("structure plan is not a JSON object"))?;
    serde_json::from_value(value).map_err(|e| GraphError::parse(format!("invalid structure plan: {e}")))
}

#[async_trait]
impl StructurePlanner for LlmStructurePlanner {
    #[instrument(skip_all, fields(%topic, docs = context.len()))]
    async fn plan(&self, topic: &str, context: &[EvidenceDoc]) -> Result<StructurePlan> {
        let prompt = prompts::planner(topic, context);
        let raw = self.chat.complete(prompts::PLANNER_SYSTEM, &prompt).await?;
        let plan = interpret(&raw)?;
        info!(
            upstream = plan.upstream.len(),
            midstream = plan.midstream.len(),
            downstream = plan.downstream.len(),
            "structure plan received"
        );
        Ok(plan)
    }
}
