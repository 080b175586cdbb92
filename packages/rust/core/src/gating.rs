//! Per-node claim gating: every candidate fact is verified before admission.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use chaingraph_shared::{
    CandidateBundle, ClaimBundle, ClaimField, EvidenceDoc, FilteredItem, GraphError, Result,
    description_claim,
};
use chaingraph_verify::{Verdict, VerificationEngine};

/// Which part of the bundle a verification job belongs to.
enum Slot {
    Item(ClaimField, String),
    Description(String),
}

/// Verifies a candidate's items with bounded parallelism and splits them into
/// admitted facts and filtered items.
pub struct ClaimGate {
    engine: Arc<dyn VerificationEngine>,
    concurrency: usize,
}

impl ClaimGate {
    pub fn new(engine: Arc<dyn VerificationEngine>, concurrency: usize) -> Self {
        Self {
            engine,
            concurrency: concurrency.max(1),
        }
    }

    /// Gate `candidate` against `evidence`.
    ///
    /// Returns `None` when the candidate carries no content at all ("no
    /// information found"). A failing or panicking verification rejects only
    /// its own item.
    #[instrument(skip_all, fields(entity = %entity, engine = self.engine.name()))]
    pub async fn gate(
        &self,
        entity: &str,
        candidate: &CandidateBundle,
        evidence: &[EvidenceDoc],
    ) -> Option<ClaimBundle> {
        if !candidate.has_content() {
            info!("candidate is empty, no information found");
            return None;
        }

        let evidence: Arc<[EvidenceDoc]> = Arc::from(evidence);
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut jobs = Vec::new();

        for field in ClaimField::ALL {
            let mut seen = HashSet::new();
            for item in candidate.field(field) {
                if !seen.insert(item.as_str()) {
                    continue;
                }
                let claim = field.claim(entity, item);
                let handle = self.spawn_verification(&semaphore, &evidence, claim, Some(item.clone()));
                jobs.push((Slot::Item(field, item.clone()), handle));
            }
        }

        if let Some(description) = candidate.description.as_deref().map(str::trim) {
            if !description.is_empty() {
                let claim = description_claim(entity, description);
                let handle = self.spawn_verification(&semaphore, &evidence, claim, None);
                jobs.push((Slot::Description(description.to_string()), handle));
            }
        }

        let mut bundle = ClaimBundle::new(entity);
        let mut admitted = 0;
        let mut filtered = 0;

        for (slot, handle) in jobs {
            let verdict = match handle.await {
                Ok(Ok(verdict)) => verdict,
                Ok(Err(e)) => {
                    warn!(error = %e, "verification failed");
                    Verdict::rejected(format!("verification error: {e}"))
                }
                Err(e) => {
                    warn!(error = %e, "verification task aborted");
                    Verdict::rejected(format!("verification task aborted: {e}"))
                }
            };

            match slot {
                Slot::Item(field, item) if verdict.verified => {
                    admitted += 1;
                    if let Some(evidence) = verdict.evidence {
                        bundle.evidence_details.insert(field, item.clone(), evidence);
                    }
                    bundle.field_mut(field).push(item);
                }
                Slot::Item(field, item) => {
                    filtered += 1;
                    debug!(field = field.as_str(), %item, reason = %verdict.reason, "item filtered");
                    bundle
                        .filtered_items
                        .entry(field.as_str().to_string())
                        .or_default()
                        .push(FilteredItem {
                            value: item,
                            reason: verdict.reason,
                            score: verdict.score,
                        });
                }
                Slot::Description(text) => {
                    if verdict.verified {
                        bundle.evidence_details.description = verdict.evidence;
                    }
                    bundle.description = Some(text);
                }
            }
        }

        info!(admitted, filtered, "candidate gated");
        Some(bundle)
    }

    fn spawn_verification(
        &self,
        semaphore: &Arc<Semaphore>,
        evidence: &Arc<[EvidenceDoc]>,
        claim: String,
        focus: Option<String>,
    ) -> tokio::task::JoinHandle<Result<Verdict>> {
        let engine = self.engine.clone();
        let semaphore = semaphore.clone();
        let evidence = evidence.clone();

        tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| GraphError::Verification("verification pool closed".into()))?;
            engine.verify_claim(&claim, &evidence, focus.as_deref()).await
        })
    }
}
