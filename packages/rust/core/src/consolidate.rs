//! End-of-run consolidation: drop invalid nodes, fold synonyms together.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use chaingraph_shared::Result;

use crate::collaborators::{MergeSuggestion, SynonymAdvisor};
use crate::store::GraphStore;

/// What a consolidation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsolidationReport {
    /// Invalid names that were actually removed.
    pub removed: Vec<String>,
    /// Merge suggestions that were applied.
    pub merged: Vec<MergeSuggestion>,
    /// Suggestions skipped because no source other than the target remained.
    pub skipped: usize,
}

pub struct GraphConsolidator {
    advisor: Arc<dyn SynonymAdvisor>,
}

impl GraphConsolidator {
    pub fn new(advisor: Arc<dyn SynonymAdvisor>) -> Self {
        Self { advisor }
    }

    /// Ask the advisor about every known name, then remove invalid nodes and
    /// apply merges in the order given.
    #[instrument(skip_all)]
    pub async fn consolidate(&self, store: &mut GraphStore) -> Result<ConsolidationReport> {
        let names = store.known_names();
        let mut report = ConsolidationReport::default();
        if names.is_empty() {
            return Ok(report);
        }

        let topic = store.graph().root_topic.clone();
        let advice = self.advisor.suggest(&topic, &names).await?;

        for name in &advice.invalid {
            if store.remove_node(name) {
                report.removed.push(name.clone());
            }
        }

        for suggestion in advice.merges {
            if store.absorb_nodes(&suggestion.target, &suggestion.sources) {
                report.merged.push(suggestion);
            } else {
                report.skipped += 1;
            }
        }

        info!(
            removed = report.removed.len(),
            merged = report.merged.len(),
            skipped = report.skipped,
            "graph consolidated"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use chaingraph_shared::ClaimBundle;

    use crate::collaborators::Advice;
    use crate::testing::{FixedAdvisor, plan};

    fn resolved(store: &mut GraphStore, name: &str, inputs: &[&str]) {
        let mut bundle = ClaimBundle::new(name);
        bundle.input_elements = inputs.iter().map(|s| s.to_string()).collect();
        store.update_node_details(name, Some(bundle));
    }

    fn suggestion(target: &str, sources: &[&str]) -> MergeSuggestion {
        MergeSuggestion {
            target: target.into(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn removes_invalid_then_merges() {
        let mut store = GraphStore::new("光伏");
        store.initialize_structure(&plan(&["多晶硅", "硅料"], &["电池片", "噪声"], &["组件"]));
        resolved(&mut store, "多晶硅", &["石英"]);
        resolved(&mut store, "硅料", &["工业硅"]);
        resolved(&mut store, "电池片", &["硅片"]);
        resolved(&mut store, "噪声", &["x"]);
        resolved(&mut store, "组件", &["电池片"]);

        let advisor = Arc::new(FixedAdvisor {
            advice: Advice {
                merges: vec![
                    suggestion("多晶硅", &["硅料", "多晶硅"]),
                    suggestion("组件", &["组件"]),
                ],
                invalid: vec!["噪声".into(), "不存在".into()],
            },
            ..Default::default()
        });
        let report = GraphConsolidator::new(advisor.clone())
            .consolidate(&mut store)
            .await
            .unwrap();

        assert_eq!(report.removed, vec!["噪声"]);
        assert_eq!(report.merged.len(), 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(advisor.asked.lock().unwrap().len(), 5);

        let g = store.graph();
        assert_eq!(g.structure.upstream, vec!["多晶硅"]);
        assert!(!g.node_details.contains_key("硅料"));
        assert!(!g.node_details.contains_key("噪声"));
        let merged = g.node_details["多晶硅"].as_ref().unwrap();
        assert_eq!(merged.input_elements, vec!["石英", "工业硅"]);
    }

    #[tokio::test]
    async fn merge_spanning_categories_leaves_one_target() {
        let mut store = GraphStore::new("光伏");
        store.initialize_structure(&plan(&["A"], &["B"], &[]));
        resolved(&mut store, "A", &["x"]);
        resolved(&mut store, "B", &["y"]);

        let advisor = Arc::new(FixedAdvisor {
            advice: Advice {
                merges: vec![suggestion("New", &["A", "B"])],
                invalid: vec![],
            },
            ..Default::default()
        });
        GraphConsolidator::new(advisor)
            .consolidate(&mut store)
            .await
            .unwrap();

        let s = &store.graph().structure;
        assert_eq!(s.names().filter(|n| *n == "New").count(), 1);
        let unique: HashSet<_> = s.names().collect();
        assert_eq!(unique.len(), s.len());
    }

    #[tokio::test]
    async fn empty_graph_skips_the_advisor() {
        let mut store = GraphStore::new("光伏");
        let advisor = Arc::new(FixedAdvisor::default());
        let report = GraphConsolidator::new(advisor.clone())
            .consolidate(&mut store)
            .await
            .unwrap();
        assert_eq!(report, ConsolidationReport::default());
        assert!(advisor.asked.lock().unwrap().is_empty());
    }
}
