//! HTTP-backed collaborators for the chaingraph workflow engine.
//!
//! Model-backed roles (planning, generation, entailment, query building,
//! synonym advice) share one OpenAI-compatible [`ChatClient`]. Evidence comes
//! from a search service via [`HttpRetriever`].

pub mod advisor;
pub mod chat;
pub mod entailment;
pub mod generation;
pub mod json;
pub mod planner;
pub mod prompts;
pub mod queries;
pub mod rerank;
pub mod retrieval;

use std::sync::Arc;

use tracing::info;

use chaingraph_core::Collaborators;
use chaingraph_shared::{AppConfig, Result, VerificationStrategy};
use chaingraph_verify::{Reranker, engine_from_config};

pub use advisor::LlmSynonymAdvisor;
pub use chat::ChatClient;
pub use entailment::LlmEntailmentOracle;
pub use generation::LlmGenerator;
pub use planner::LlmStructurePlanner;
pub use queries::{LlmQueryBuilder, fallback_queries};
pub use rerank::HttpReranker;
pub use retrieval::HttpRetriever;

/// Wire every collaborator from `config`.
pub fn collaborators(config: &AppConfig) -> Result<Collaborators> {
    let chat = ChatClient::new(&config.llm)?;
    let retriever = HttpRetriever::new(&config.retrieval)?;

    let reranker: Option<Arc<dyn Reranker>> = match config.verification.strategy {
        VerificationStrategy::Ranking => Some(Arc::new(HttpReranker::new(
            chat.clone(),
            config.llm.reranker_model.clone(),
        ))),
        VerificationStrategy::Composite => None,
    };
    let oracle = Arc::new(LlmEntailmentOracle::new(
        chat.clone(),
        config.verification.neutral_score,
    ));
    let verifier = engine_from_config(&config.verification, oracle, reranker);

    info!(
        model = chat.model(),
        retrieval = %config.retrieval.endpoint,
        verifier = verifier.name(),
        "collaborators ready"
    );

    Ok(Collaborators {
        queries: Arc::new(LlmQueryBuilder::new(chat.clone())),
        retriever: Arc::new(retriever),
        planner: Arc::new(LlmStructurePlanner::new(chat.clone())),
        generator: Arc::new(LlmGenerator::new(chat.clone())),
        verifier,
        advisor: Arc::new(LlmSynonymAdvisor::new(chat)),
    })
}
