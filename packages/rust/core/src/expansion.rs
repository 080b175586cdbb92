//! Depth-bounded discovery: verified inputs become upstream nodes, verified
//! outputs become downstream nodes.

use tracing::debug;

use chaingraph_shared::{Category, ClaimBundle, ClaimField, ExpansionConfig};

use crate::store::GraphStore;
use crate::task::TaskKind;

#[derive(Debug, Clone)]
pub struct ExpansionPolicy {
    max_name_chars: usize,
    child_priority: i32,
}

impl ExpansionPolicy {
    pub fn new(config: &ExpansionConfig) -> Self {
        Self {
            max_name_chars: config.max_name_chars,
            child_priority: config.child_priority,
        }
    }

    /// Register new nodes from `bundle`'s verified items and enqueue a discovery
    /// task for each one that was actually new. Nothing is spawned once
    /// `depth >= max_depth`. Returns the names that were enqueued.
    pub fn expand(
        &self,
        store: &mut GraphStore,
        bundle: &ClaimBundle,
        depth: u32,
        max_depth: u32,
    ) -> Vec<(String, Category)> {
        let mut spawned = Vec::new();
        if depth >= max_depth {
            return spawned;
        }

        let directions = [
            (ClaimField::InputElements, Category::Upstream),
            (ClaimField::OutputProducts, Category::Downstream),
        ];

        for (field, category) in directions {
            for item in bundle.field(field) {
                let name = item.trim();
                if name.is_empty() || name.chars().count() > self.max_name_chars {
                    debug!(%name, "not an entity name, skipping expansion");
                    continue;
                }
                if !store.add_node_to_structure(name, category) {
                    continue;
                }

                store.add_task(
                    TaskKind::ExtractNode {
                        name: name.to_string(),
                        category,
                        depth: depth + 1,
                        max_depth,
                    },
                    self.child_priority,
                );
                spawned.push((name.to_string(), category));
            }
        }

        spawned
    }
}
