//! Semantic scorers consumed by the verification strategies.

use async_trait::async_trait;

use chaingraph_shared::Result;

/// Output of an entailment judgement.
#[derive(Debug, Clone, PartialEq)]
pub struct Entailment {
    /// Probability-like support score in `[0, 1]`.
    pub score: f64,
    /// Sentence from the premise that best supports the hypothesis, if the
    /// oracle extracted one. Not trusted until checked against the premise.
    pub evidence: Option<String>,
}

impl Entailment {
    /// Non-finite scores carry no support and become 0.0.
    pub fn new(score: f64, evidence: Option<String>) -> Self {
        let score = if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 };
        Self {
            score,
            evidence,
        }
    }

    /// Score used when the oracle could not produce a judgement.
    pub fn neutral(score: f64) -> Self {
        Self::new(score, None)
    }
}

/// Judges whether a premise (document text) supports a hypothesis (claim).
///
/// Implementations never fail: transport or parse errors degrade to a neutral score.
#[async_trait]
pub trait EntailmentOracle: Send + Sync {
    async fn score(&self, premise: &str, hypothesis: &str) -> Entailment;
}

/// A document's position in the input slice and its relevance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedDoc {
    pub index: usize,
    pub score: f64,
}

/// Orders documents by relevance to a query, most relevant first.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, documents: &[&str], top_n: usize)
    -> Result<Vec<RankedDoc>>;
}
