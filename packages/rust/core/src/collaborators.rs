//! Interfaces to the external services the workflow depends on.
//!
//! Implementations live elsewhere (HTTP clients, test doubles); the engine only
//! sees these traits, held as `Arc<dyn Trait>`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use chaingraph_shared::{CandidateBundle, EvidenceDoc, Result, StructurePlan};

/// What the generation collaborator produced for one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Generation {
    Candidate(CandidateBundle),
    /// Output that could not be parsed into a candidate.
    Malformed { raw: String, error: String },
}

/// Proposes unverified facts about an entity from retrieved context.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, entity: &str, context: &[EvidenceDoc]) -> Result<Generation>;
}

/// Queries handed to the retrieval collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalQueries {
    #[serde(default)]
    pub semantic: Vec<String>,
    #[serde(default)]
    pub keyword: Vec<String>,
}

impl RetrievalQueries {
    pub fn is_empty(&self) -> bool {
        self.semantic.is_empty() && self.keyword.is_empty()
    }
}

/// Fetches evidence documents, most relevant first.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, queries: &RetrievalQueries) -> Result<Vec<EvidenceDoc>>;
}

/// Chooses retrieval queries for a topic or a node.
#[async_trait]
pub trait QueryBuilder: Send + Sync {
    async fn topic_queries(&self, topic: &str) -> RetrievalQueries;
    async fn node_queries(&self, name: &str, topic: &str) -> RetrievalQueries;
}

/// Proposes the three-tier structure for a topic.
#[async_trait]
pub trait StructurePlanner: Send + Sync {
    async fn plan(&self, topic: &str, context: &[EvidenceDoc]) -> Result<StructurePlan>;
}

/// One synonym merge: every source folds into `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSuggestion {
    pub target: String,
    pub sources: Vec<String>,
}

/// Synonym and noise advice over the final set of names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advice {
    #[serde(default)]
    pub merges: Vec<MergeSuggestion>,
    #[serde(default)]
    pub invalid: Vec<String>,
}

#[async_trait]
pub trait SynonymAdvisor: Send + Sync {
    /// Unparseable advice degrades to `Advice::default()`; errors are transport failures.
    async fn suggest(&self, topic: &str, names: &[String]) -> Result<Advice>;
}
