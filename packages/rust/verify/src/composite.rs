//! Composite support scoring: lexical coverage blended with an entailment oracle.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use chaingraph_shared::{EvidenceDoc, EvidenceRef, Result, VerificationConfig};

use crate::lexical;
use crate::oracle::EntailmentOracle;
use crate::{ScoreBreakdown, Verdict, VerificationEngine};

/// Default verification strategy.
///
/// `score = alpha * lexical + beta * entailment`, plus a bonus when the focus
/// entity occurs verbatim in the chosen document, capped at 1.0.
pub struct CompositeVerifier {
    oracle: Arc<dyn EntailmentOracle>,
    config: VerificationConfig,
}

/// One document's contribution.
struct Scored {
    doc_index: usize,
    score: f64,
    lexical: f64,
    semantic: f64,
    boost: f64,
    excerpt: String,
}

impl CompositeVerifier {
    pub fn new(oracle: Arc<dyn EntailmentOracle>, config: VerificationConfig) -> Self {
        Self { oracle, config }
    }

    async fn score_document(
        &self,
        doc_index: usize,
        doc: &EvidenceDoc,
        claim: &str,
        focus: Option<&str>,
        doc_lexical: f64,
        focus_present: bool,
    ) -> Scored {
        let eps = self.config.epsilon;
        let entailment = self.oracle.score(&doc.text, claim).await;

        // Oracle sentences are only trusted when they are literally in the document.
        let sentence = entailment
            .evidence
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && doc.text.contains(*s));

        let (lexical, excerpt) = match sentence {
            Some(sentence) => (lexical::coverage(claim, sentence, eps), sentence.to_string()),
            None => {
                let excerpt = lexical::best_sentence(&doc.text, claim, focus, eps)
                    .unwrap_or_else(|| doc.text.trim());
                (doc_lexical, excerpt.to_string())
            }
        };

        let semantic = if entailment.score.is_finite() {
            entailment.score
        } else {
            warn!(doc = doc_index, "non-finite entailment score, using neutral score");
            self.config.neutral_score
        };
        let css = self.config.alpha * lexical + self.config.beta * semantic;
        let boost = if focus_present {
            self.config.entity_bonus
        } else {
            0.0
        };

        Scored {
            doc_index,
            score: (css + boost).min(1.0),
            lexical,
            semantic,
            boost,
            excerpt,
        }
    }
}

fn focus_in(doc: &EvidenceDoc, focus: Option<&str>) -> bool {
    focus.is_some_and(|f| !f.is_empty() && doc.text.contains(f))
}

#[async_trait]
impl VerificationEngine for CompositeVerifier {
    fn name(&self) -> &'static str {
        "composite"
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

        let cfg = &self.config;
        let candidates = &evidence[..cfg.top_k.max(1).min(evidence.len())];

        let mut best: Option<Scored> = None;
        let mut scanned = 0;
        let mut skipped = 0;

        for (idx, doc) in candidates.iter().enumerate() {
            let doc_lexical = lexical::coverage(claim, &doc.text, cfg.epsilon);
            let focus_present = focus_in(doc, focus);

            if doc_lexical < cfg.prefilter_threshold && !focus_present {
                skipped += 1;
                debug!(doc = idx, lexical = doc_lexical, "pre-filtered evidence document");
                continue;
            }

            scanned += 1;
            let scored = self
                .score_document(idx, doc, claim, focus, doc_lexical, focus_present)
                .await;
            let early_exit = scored.score > cfg.early_exit_score;

            if best.as_ref().is_none_or(|b| scored.score > b.score) {
                best = Some(scored);
            }
            if early_exit {
                debug!(doc = idx, "high-confidence evidence, stopping scan");
                break;
            }
        }

        let fallback = best.is_none();
        let best = match best {
            Some(best) => best,
            None => {
                let doc = &evidence[0];
                let doc_lexical = lexical::coverage(claim, &doc.text, cfg.epsilon);
                self.score_document(0, doc, claim, focus, doc_lexical, focus_in(doc, focus))
                    .await
            }
        };

        let verified = best.score >= cfg.threshold;
        let reason = match (verified, fallback) {
            (true, _) => format!(
                "composite score {:.3} meets threshold {:.2}",
                best.score, cfg.threshold
            ),
            (false, false) => format!(
                "composite score {:.3} below threshold {:.2}",
                best.score, cfg.threshold
            ),
            (false, true) => format!(
                "no document passed the lexical pre-filter; first document scored {:.3}",
                best.score
            ),
        };

        let doc = &evidence[best.doc_index];
        Ok(Verdict {
            verified,
            score: best.score,
            evidence: Some(EvidenceRef {
                source_id: doc.source_id.clone(),
                chunk_id: doc.chunk_id.clone(),
                excerpt: best.excerpt,
                score: best.score,
            }),
            reason,
            breakdown: ScoreBreakdown {
                lexical: best.lexical,
                semantic: best.semantic,
                entity_boost: best.boost,
                doc_index: Some(best.doc_index),
                scanned,
                skipped,
                fallback,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::Entailment;
    use chaingraph_shared::ClaimField;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedOracle {
        score: f64,
        evidence: Option<String>,
        calls: AtomicUsize,
    }

    impl FixedOracle {
        fn new(score: f64, evidence: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                score,
                evidence: evidence.map(String::from),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EntailmentOracle for FixedOracle {
        async fn score(&self, _premise: &str, _hypothesis: &str) -> Entailment {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Entailment::new(self.score, self.evidence.clone())
        }
    }

    fn doc(id: &str, text: &str) -> EvidenceDoc {
        EvidenceDoc {
            text: text.into(),
            source_id: format!("{id}.pdf"),
            chunk_id: format!("{id}-0"),
        }
    }

    fn verifier(oracle: Arc<FixedOracle>) -> CompositeVerifier {
        CompositeVerifier::new(oracle, VerificationConfig::default())
    }

    const SUPPORT: &str = "光伏中游的产出产品包括电池片和组件。";

    fn supporting_doc() -> EvidenceDoc {
        doc("report", &format!("中游环节主要生产硅片和电池片。{SUPPORT}\n其他内容"))
    }

    fn claim() -> String {
        ClaimField::OutputProducts.claim("光伏中游", "电池片")
    }

    #[tokio::test]
    async fn empty_claim_or_docs_skip_the_oracle() {
        let oracle = FixedOracle::new(1.0, None);
        let v = verifier(oracle.clone());

        let verdict = v.verify_claim("   ", &[supporting_doc()], None).await.unwrap();
        assert!(!verdict.verified);
        assert_eq!(verdict.score, 0.0);

        let verdict = v.verify_claim(&claim(), &[], None).await.unwrap();
        assert!(!verdict.verified);
        assert_eq!(verdict.score, 0.0);
        assert!(verdict.evidence.is_none());

        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn supported_claim_cites_verbatim_sentence() {
        let oracle = FixedOracle::new(0.9, Some(SUPPORT));
        let doc = supporting_doc();
        let verdict = verifier(oracle)
            .verify_claim(&claim(), std::slice::from_ref(&doc), Some("电池片"))
            .await
            .unwrap();

        assert!(verdict.verified);
        assert!(verdict.score >= 0.6);
        let evidence = verdict.evidence.expect("evidence ref");
        assert_eq!(evidence.excerpt, SUPPORT);
        assert!(doc.text.contains(&evidence.excerpt));
        assert_eq!(evidence.source_id, "report.pdf");
        assert_eq!(evidence.chunk_id, "report-0");
        assert_eq!(verdict.breakdown.entity_boost, 0.25);
    }

    #[tokio::test]
    async fn missing_oracle_sentence_falls_back_to_focus_sentence() {
        let oracle = FixedOracle::new(0.8, None);
        let verdict = verifier(oracle)
            .verify_claim(&claim(), &[supporting_doc()], Some("电池片"))
            .await
            .unwrap();

        let evidence = verdict.evidence.expect("evidence ref");
        assert_eq!(evidence.excerpt, "中游环节主要生产硅片和电池片。");
    }

    #[tokio::test]
    async fn paraphrased_oracle_sentence_is_not_cited() {
        let oracle = FixedOracle::new(0.9, Some("中游产品主要是电池片"));
        let verdict = verifier(oracle)
            .verify_claim(&claim(), &[supporting_doc()], Some("电池片"))
            .await
            .unwrap();

        let evidence = verdict.evidence.expect("evidence ref");
        assert_ne!(evidence.excerpt, "中游产品主要是电池片");
        assert!(supporting_doc().text.contains(&evidence.excerpt));
    }

    #[tokio::test]
    async fn unrelated_documents_are_prefiltered() {
        let oracle = FixedOracle::new(0.9, None);
        let docs = [doc("noise", "weather report for tuesday"), supporting_doc()];
        let verdict = verifier(oracle.clone())
            .verify_claim(&claim(), &docs, None)
            .await
            .unwrap();

        assert_eq!(oracle.calls(), 1);
        assert_eq!(verdict.breakdown.skipped, 1);
        assert_eq!(verdict.breakdown.scanned, 1);
        assert_eq!(verdict.breakdown.doc_index, Some(1));
        assert!(!verdict.breakdown.fallback);
    }

    #[tokio::test]
    async fn focus_presence_overrides_prefilter() {
        let oracle = FixedOracle::new(0.1, None);
        // Lexical coverage is 3 / 83, under the pre-filter threshold.
        let claim = format!("电池片{}", "q".repeat(80));
        let docs = [doc("a", "battery 电池片 notes")];
        let verdict = verifier(oracle.clone())
            .verify_claim(&claim, &docs, Some("电池片"))
            .await
            .unwrap();

        assert_eq!(oracle.calls(), 1);
        assert_eq!(verdict.breakdown.skipped, 0);
        assert_eq!(verdict.breakdown.entity_boost, 0.25);
    }

    #[tokio::test]
    async fn all_skipped_forces_first_document_fallback() {
        let oracle = FixedOracle::new(0.1, None);
        let docs = [doc("first", "alpha beta"), doc("second", "gamma delta")];
        let verdict = verifier(oracle.clone())
            .verify_claim(&claim(), &docs, Some("电池片"))
            .await
            .unwrap();

        assert_eq!(oracle.calls(), 1);
        assert!(!verdict.verified);
        assert!(verdict.breakdown.fallback);
        assert_eq!(verdict.breakdown.skipped, 2);
        assert!(!verdict.reason.is_empty());
        let evidence = verdict.evidence.expect("fallback evidence");
        assert_eq!(evidence.source_id, "first.pdf");
        assert_eq!(evidence.excerpt, "alpha beta");
    }

    #[tokio::test]
    async fn only_top_k_documents_are_considered() {
        let oracle = FixedOracle::new(0.5, None);
        let docs: Vec<_> = (0..5).map(|i| doc(&format!("d{i}"), SUPPORT)).collect();
        let verdict = verifier(oracle.clone())
            .verify_claim(&claim(), &docs, None)
            .await
            .unwrap();

        assert_eq!(oracle.calls(), 3);
        assert_eq!(verdict.breakdown.scanned, 3);
    }

    #[tokio::test]
    async fn high_confidence_stops_the_scan() {
        let oracle = FixedOracle::new(1.0, Some(SUPPORT));
        let docs = [supporting_doc(), supporting_doc(), supporting_doc()];
        let verdict = verifier(oracle.clone())
            .verify_claim(&claim(), &docs, None)
            .await
            .unwrap();

        assert_eq!(oracle.calls(), 1);
        assert_eq!(verdict.breakdown.doc_index, Some(0));
        assert!(verdict.score > 0.95);
    }

    #[tokio::test]
    async fn weak_support_is_rejected() {
        let oracle = FixedOracle::new(0.0, None);
        let verdict = verifier(oracle)
            .verify_claim(&claim(), &[doc("thin", "光伏中游的")], None)
            .await
            .unwrap();

        assert!(!verdict.verified);
        assert!(verdict.score < 0.6);
        assert_eq!(verdict.breakdown.entity_boost, 0.0);
        assert!(verdict.reason.contains("below threshold"));
    }

    struct NanOracle;

    #[async_trait]
    impl EntailmentOracle for NanOracle {
        async fn score(&self, _premise: &str, _hypothesis: &str) -> Entailment {
            Entailment {
                score: f64::NAN,
                evidence: None,
            }
        }
    }

    #[tokio::test]
    async fn non_finite_oracle_score_counts_as_neutral() {
        let verdict = CompositeVerifier::new(Arc::new(NanOracle), VerificationConfig::default())
            .verify_claim("电池片的产出产品包括组件。", &[doc("price", "硅片价格")], None)
            .await
            .unwrap();

        assert!(!verdict.verified);
        assert!(verdict.score.is_finite());
        assert!(verdict.score < 0.6);
        assert_eq!(verdict.breakdown.semantic, 0.5);
    }
}
