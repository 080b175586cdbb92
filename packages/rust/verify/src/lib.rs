//! Evidence verification for candidate facts.
//!
//! This crate provides:
//! - [`VerificationEngine`] - the contract every strategy implements
//! - [`CompositeVerifier`] - lexical coverage + entailment composite score (default)
//! - [`RankingVerifier`] - reranker relevance + verbatim span location (fallback)
//! - [`lexical`] - character coverage and sentence splitting helpers

pub mod composite;
pub mod lexical;
pub mod oracle;
pub mod ranking;

use std::sync::Arc;

use async_trait::async_trait;

use chaingraph_shared::{EvidenceDoc, EvidenceRef, Result, VerificationConfig, VerificationStrategy};

pub use composite::CompositeVerifier;
pub use oracle::{Entailment, EntailmentOracle, RankedDoc, Reranker};
pub use ranking::RankingVerifier;

/// How a verdict's score was put together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreBreakdown {
    /// Lexical coverage used in the final combination.
    pub lexical: f64,
    /// Entailment (or reranker) score of the chosen document.
    pub semantic: f64,
    /// Bonus applied for verbatim focus-entity presence (0.0 when none).
    pub entity_boost: f64,
    /// Index of the chosen document within the evidence slice.
    pub doc_index: Option<usize>,
    /// Documents that reached the semantic scorer.
    pub scanned: usize,
    /// Documents dropped by the lexical pre-filter.
    pub skipped: usize,
    /// Every candidate was pre-filtered and the first document was scored anyway.
    pub fallback: bool,
}

/// Outcome of verifying one claim.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub verified: bool,
    pub score: f64,
    pub evidence: Option<EvidenceRef>,
    pub reason: String,
    pub breakdown: ScoreBreakdown,
}

impl Verdict {
    /// A zero-score rejection that consulted no scorer.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            verified: false,
            score: 0.0,
            evidence: None,
            reason: reason.into(),
            breakdown: ScoreBreakdown::default(),
        }
    }
}

/// Scores a single claim against a bounded, relevance-ordered set of documents.
#[async_trait]
pub trait VerificationEngine: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &'static str;

    /// Verify `claim` against `evidence`. `focus` is the specific item the
    /// claim is about; its verbatim presence counts as strong evidence.
    async fn verify_claim(
        &self,
        claim: &str,
        evidence: &[EvidenceDoc],
        focus: Option<&str>,
    ) -> Result<Verdict>;
}

/// Build the engine selected by `config.strategy`.
///
/// The ranking strategy needs a reranker; without one the composite strategy is used.
pub fn engine_from_config(
    config: &VerificationConfig,
    oracle: Arc<dyn EntailmentOracle>,
    reranker: Option<Arc<dyn Reranker>>,
) -> Arc<dyn VerificationEngine> {
    match (config.strategy, reranker) {
        (VerificationStrategy::Ranking, Some(reranker)) => {
            Arc::new(RankingVerifier::new(reranker, config.ranking_threshold))
        }
        (VerificationStrategy::Ranking, None) => {
            tracing::warn!("ranking verification requested without a reranker, using composite");
            Arc::new(CompositeVerifier::new(oracle, config.clone()))
        }
        (VerificationStrategy::Composite, _) => Arc::new(CompositeVerifier::new(oracle, config.clone())),
    }
}
