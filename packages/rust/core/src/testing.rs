//! In-crate test doubles for the collaborator traits.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use chaingraph_shared::{CandidateBundle, EvidenceDoc, EvidenceRef, GraphError, Result, StructurePlan};
use chaingraph_verify::{ScoreBreakdown, Verdict, VerificationEngine};

use crate::collaborators::{
    Advice, Generation, Generator, QueryBuilder, RetrievalQueries, Retriever, StructurePlanner,
    SynonymAdvisor,
};

pub fn doc(text: &str) -> EvidenceDoc {
    EvidenceDoc {
        text: text.into(),
        source_id: "doc.pdf".into(),
        chunk_id: "doc-0".into(),
    }
}

pub fn candidate(description: Option<&str>, inputs: &[&str], outputs: &[&str]) -> CandidateBundle {
    CandidateBundle {
        description: description.map(String::from),
        input_elements: inputs.iter().map(|s| s.to_string()).collect(),
        output_products: outputs.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

pub fn plan(up: &[&str], mid: &[&str], down: &[&str]) -> StructurePlan {
    let v = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect();
    StructurePlan {
        upstream: v(up),
        midstream: v(mid),
        downstream: v(down),
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Verifies items by focus name: listed names pass, `fail` names error, and the
/// focus `"panic"` panics. Descriptions (no focus) pass when `descriptions` is set.
#[derive(Default)]
pub struct KeywordEngine {
    pub accept: HashSet<String>,
    pub fail: HashSet<String>,
    pub descriptions: bool,
    pub calls: AtomicUsize,
}

impl KeywordEngine {
    pub fn accepting(items: &[&str]) -> Self {
        Self {
            accept: items.iter().map(|s| s.to_string()).collect(),
            descriptions: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl VerificationEngine for KeywordEngine {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn verify_claim(
        &self,
        claim: &str,
        evidence: &[EvidenceDoc],
        focus: Option<&str>,
    ) -> Result<Verdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if focus == Some("panic") {
            panic!("engine exploded on {claim}");
        }
        if let Some(f) = focus.filter(|f| self.fail.contains(*f)) {
            return Err(GraphError::Verification(format!("oracle unavailable for {f}")));
        }

        let verified = match focus {
            Some(f) => self.accept.contains(f),
            None => self.descriptions,
        };
        if !verified {
            return Ok(Verdict {
                score: 0.2,
                ..Verdict::rejected("not supported")
            });
        }

        let first = evidence.first();
        Ok(Verdict {
            verified: true,
            score: 0.9,
            evidence: first.map(|d| EvidenceRef {
                source_id: d.source_id.clone(),
                chunk_id: d.chunk_id.clone(),
                excerpt: d.text.clone(),
                score: 0.9,
            }),
            reason: "supported".into(),
            breakdown: ScoreBreakdown::default(),
        })
    }
}

// ---------------------------------------------------------------------------
// Retrieval and queries
// ---------------------------------------------------------------------------

pub struct StaticRetriever {
    pub docs: Vec<EvidenceDoc>,
    /// Queries containing this text fail.
    pub fail_on: Option<String>,
}

impl StaticRetriever {
    pub fn new(texts: &[&str]) -> Self {
        Self {
            docs: texts.iter().map(|t| doc(t)).collect(),
            fail_on: None,
        }
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, queries: &RetrievalQueries) -> Result<Vec<EvidenceDoc>> {
        if let Some(bad) = &self.fail_on {
            if queries.semantic.iter().any(|q| q.contains(bad.as_str())) {
                return Err(GraphError::Retrieval(format!("index offline for {bad}")));
            }
        }
        Ok(self.docs.clone())
    }
}

pub struct EchoQueries;

#[async_trait]
impl QueryBuilder for EchoQueries {
    async fn topic_queries(&self, topic: &str) -> RetrievalQueries {
        RetrievalQueries {
            semantic: vec![topic.to_string()],
            keyword: vec![topic.to_string()],
        }
    }

    async fn node_queries(&self, name: &str, topic: &str) -> RetrievalQueries {
        RetrievalQueries {
            semantic: vec![format!("{topic} {name}")],
            keyword: vec![name.to_string()],
        }
    }
}

// ---------------------------------------------------------------------------
// Generation and planning
// ---------------------------------------------------------------------------

/// Returns scripted generations per entity; unknown entities get an empty candidate.
#[derive(Default)]
pub struct ScriptedGenerator {
    pub outputs: HashMap<String, Generation>,
    pub seen: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn with(mut self, entity: &str, generation: Generation) -> Self {
        self.outputs.insert(entity.to_string(), generation);
        self
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, entity: &str, _context: &[EvidenceDoc]) -> Result<Generation> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(entity.to_string());
        }
        Ok(self
            .outputs
            .get(entity)
            .cloned()
            .unwrap_or_else(|| Generation::Candidate(CandidateBundle::default())))
    }
}

pub struct FixedPlanner(pub Option<StructurePlan>);

#[async_trait]
impl StructurePlanner for FixedPlanner {
    async fn plan(&self, _topic: &str, _context: &[EvidenceDoc]) -> Result<StructurePlan> {
        self.0
            .clone()
            .ok_or_else(|| GraphError::parse("planner returned no usable structure"))
    }
}

#[derive(Default)]
pub struct FixedAdvisor {
    pub advice: Advice,
    pub asked: Mutex<Vec<String>>,
}

#[async_trait]
impl SynonymAdvisor for FixedAdvisor {
    async fn suggest(&self, _topic: &str, names: &[String]) -> Result<Advice> {
        if let Ok(mut asked) = self.asked.lock() {
            *asked = names.to_vec();
        }
        Ok(self.advice.clone())
    }
}
