//! Fallback strategy: reranker relevance plus verbatim span location.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use chaingraph_shared::{EvidenceDoc, EvidenceRef, Result};

use crate::lexical::split_sentences;
use crate::oracle::Reranker;
use crate::{ScoreBreakdown, Verdict, VerificationEngine};

/// Documents kept after reranking.
const TOP_DOCS: usize = 3;

/// Verifies a claim when a relevant document contains a locatable supporting span.
pub struct RankingVerifier {
    reranker: Arc<dyn Reranker>,
    threshold: f64,
}

impl RankingVerifier {
    pub fn new(reranker: Arc<dyn Reranker>, threshold: f64) -> Self {
        Self {
            reranker,
            threshold,
        }
    }

    /// A sentence containing `query` scores 1.0; otherwise the best reranked sentence.
    async fn locate_span(&self, query: &str, text: &str) -> Option<(String, f64)> {
        let sentences = split_sentences(text);
        if let Some(hit) = sentences.iter().find(|s| s.contains(query)) {
            return Some((hit.to_string(), 1.0));
        }
        if sentences.is_empty() {
            return None;
        }

        match self.reranker.rerank(query, &sentences, 1).await {
            Ok(ranked) => ranked
                .first()
                .and_then(|r| sentences.get(r.index).map(|s| (s.to_string(), r.score))),
            Err(e) => {
                warn!(error = %e, "sentence rerank failed");
                None
            }
        }
    }
}

#[async_trait]
impl VerificationEngine for RankingVerifier {
    fn name(&self) -> &'static str {
        "ranking"
    }

    async fn verify_claim(
        &self,
        claim: &str,
        evidence: &[EvidenceDoc],
        focus: Option<&str>,
    ) -> Result<Verdict> {
        let claim = claim.trim();
        if claim.is_empty() {
            return Ok(Verdict::rejected("empty claim"));
        }
        if evidence.is_empty() {
            return Ok(Verdict::rejected("no evidence documents"));
        }

        let query = focus.map(str::trim).filter(|f| !f.is_empty()).unwrap_or(claim);
        let texts: Vec<&str> = evidence.iter().map(|d| d.text.as_str()).collect();
        let ranked = self.reranker.rerank(query, &texts, TOP_DOCS).await?;

        let relevant: Vec<_> = ranked
            .into_iter()
            .filter(|r| r.index < evidence.len() && r.score >= self.threshold)
            .take(TOP_DOCS)
            .collect();
        let skipped = evidence.len().min(TOP_DOCS).saturating_sub(relevant.len());

        let mut scanned = 0;
        for r in &relevant {
            scanned += 1;
            let doc = &evidence[r.index];
            let Some((excerpt, span_score)) = self.locate_span(query, &doc.text).await else {
                debug!(doc = r.index, "no supporting span in relevant document");
                continue;
            };

            return Ok(Verdict {
                verified: true,
                score: r.score,
                evidence: Some(EvidenceRef {
                    source_id: doc.source_id.clone(),
                    chunk_id: doc.chunk_id.clone(),
                    excerpt,
                    score: r.score,
                }),
                reason: format!("relevance {:.3} with located span", r.score),
                breakdown: ScoreBreakdown {
                    lexical: span_score,
                    semantic: r.score,
                    doc_index: Some(r.index),
                    scanned,
                    skipped,
                    ..ScoreBreakdown::default()
                },
            });
        }

        let reason = if relevant.is_empty() {
            format!("no document reached relevance {:.2}", self.threshold)
        } else {
            "no supporting span located".to_string()
        };
        let mut verdict = Verdict::rejected(reason);
        verdict.breakdown.scanned = scanned;
        verdict.breakdown.skipped = skipped;
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::RankedDoc;
    use chaingraph_shared::GraphError;

    /// Scores 0.9 for texts containing the query, 0.1 otherwise.
    struct ContainsReranker;

    #[async_trait]
    impl Reranker for ContainsReranker {
        async fn rerank(
            &self,
            query: &str,
            documents: &[&str],
            top_n: usize,
        ) -> Result<Vec<RankedDoc>> {
            let mut ranked: Vec<RankedDoc> = documents
                .iter()
                .enumerate()
                .map(|(index, d)| RankedDoc {
                    index,
                    score: if d.contains(query) { 0.9 } else { 0.1 },
                })
                .collect();
            ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
            ranked.truncate(top_n);
            Ok(ranked)
        }
    }

    /// Ranks every document highly regardless of content.
    struct GenerousReranker;

    #[async_trait]
    impl Reranker for GenerousReranker {
        async fn rerank(&self, _query: &str, documents: &[&str], top_n: usize) -> Result<Vec<RankedDoc>> {
            Ok((0..documents.len().min(top_n))
                .map(|index| RankedDoc { index, score: 0.8 })
                .collect())
        }
    }

    struct FailingReranker;

    #[async_trait]
    impl Reranker for FailingReranker {
        async fn rerank(&self, _: &str, _: &[&str], _: usize) -> Result<Vec<RankedDoc>> {
            Err(GraphError::Network("connection refused".into()))
        }
    }

    fn doc(id: &str, text: &str) -> EvidenceDoc {
        EvidenceDoc {
            text: text.into(),
            source_id: id.into(),
            chunk_id: format!("{id}#1"),
        }
    }

    #[tokio::test]
    async fn verbatim_sentence_verifies() {
        let v = RankingVerifier::new(Arc::new(ContainsReranker), 0.5);
        let docs = [
            doc("noise", "无关内容。"),
            doc("hit", "概述。主要企业包括隆基绿能。"),
        ];
        let verdict = v
            .verify_claim("隆基绿能是硅片环节的代表性企业。", &docs, Some("隆基绿能"))
            .await
            .unwrap();

        assert!(verdict.verified);
        let evidence = verdict.evidence.unwrap();
        assert_eq!(evidence.source_id, "hit");
        assert_eq!(evidence.excerpt, "主要企业包括隆基绿能。");
        assert_eq!(verdict.breakdown.lexical, 1.0);
    }

    #[tokio::test]
    async fn irrelevant_documents_are_rejected() {
        let v = RankingVerifier::new(Arc::new(ContainsReranker), 0.5);
        let verdict = v
            .verify_claim("隆基绿能是硅片环节的代表性企业。", &[doc("a", "无关内容。")], Some("隆基绿能"))
            .await
            .unwrap();

        assert!(!verdict.verified);
        assert!(verdict.evidence.is_none());
        assert!(verdict.reason.contains("relevance"));
    }

    #[tokio::test]
    async fn best_reranked_sentence_is_used_without_literal_match() {
        let v = RankingVerifier::new(Arc::new(GenerousReranker), 0.5);
        let verdict = v
            .verify_claim("硅片的投入要素包括多晶硅。", &[doc("a", "第一句。第二句。")], Some("多晶硅"))
            .await
            .unwrap();

        assert!(verdict.verified);
        assert_eq!(verdict.evidence.unwrap().excerpt, "第一句。");
        assert_eq!(verdict.breakdown.lexical, 0.8);
    }

    #[tokio::test]
    async fn reranker_errors_propagate() {
        let v = RankingVerifier::new(Arc::new(FailingReranker), 0.5);
        let result = v.verify_claim("claim", &[doc("a", "text")], None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn empty_inputs_are_rejected_without_reranking() {
        let v = RankingVerifier::new(Arc::new(FailingReranker), 0.5);
        assert!(!v.verify_claim("", &[doc("a", "text")], None).await.unwrap().verified);
        assert!(!v.verify_claim("claim", &[], None).await.unwrap().verified);
    }
}
