//! Task handlers: one per [`TaskType`](crate::task::TaskType).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use chaingraph_shared::{Category, ClaimBundle, ClaimField, GraphError, Result};

use crate::collaborators::{Generation, Generator, QueryBuilder, Retriever, StructurePlanner};
use crate::expansion::ExpansionPolicy;
use crate::gating::ClaimGate;
use crate::store::GraphStore;
use crate::task::{Task, TaskKind};

/// Executes one task against the store.
///
/// The returned message becomes the completion record; an error fails the
/// task. Handlers never call `complete_task` themselves.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &Task, store: &mut GraphStore) -> Result<String>;
}

fn unexpected(task: &Task, handler: &str) -> GraphError {
    GraphError::validation(format!(
        "{handler} handler cannot run {} task {}",
        task.task_type(),
        task.id
    ))
}

// ---------------------------------------------------------------------------
// PlanStructure
// ---------------------------------------------------------------------------

/// Plans the three tiers for the topic and enqueues one extraction per node.
pub struct PlanStructureHandler {
    pub queries: Arc<dyn QueryBuilder>,
    pub retriever: Arc<dyn Retriever>,
    pub planner: Arc<dyn StructurePlanner>,
    /// Priority of the extraction tasks this plan enqueues.
    pub extract_priority: i32,
}

#[async_trait]
impl TaskHandler for PlanStructureHandler {
    #[instrument(skip_all, fields(task_id = %task.id))]
    async fn handle(&self, task: &Task, store: &mut GraphStore) -> Result<String> {
        let TaskKind::PlanStructure { topic, max_depth } = &task.kind else {
            return Err(unexpected(task, "plan_structure"));
        };

        let queries = self.queries.topic_queries(topic).await;
        let context = self.retriever.retrieve(&queries).await?;
        let plan = self.planner.plan(topic, &context).await?;

        store.initialize_structure(&plan);

        let mut planned = Vec::new();
        for category in Category::ALL {
            for name in store.graph().structure.get(category) {
                planned.push((name.clone(), category));
            }
        }
        for (name, category) in &planned {
            store.add_task(
                TaskKind::ExtractNode {
                    name: name.clone(),
                    category: *category,
                    depth: 0,
                    max_depth: *max_depth,
                },
                self.extract_priority,
            );
        }

        info!(%topic, nodes = planned.len(), context = context.len(), "structure planned");
        Ok(format!("planned {} nodes for {topic}", planned.len()))
    }
}

// ---------------------------------------------------------------------------
// ExtractNode
// ---------------------------------------------------------------------------

/// Resolves one node: retrieve, generate, gate, persist, expand.
pub struct ExtractNodeHandler {
    pub queries: Arc<dyn QueryBuilder>,
    pub retriever: Arc<dyn Retriever>,
    pub generator: Arc<dyn Generator>,
    pub gate: ClaimGate,
    pub expansion: ExpansionPolicy,
}

#[async_trait]
impl TaskHandler for ExtractNodeHandler {
    #[instrument(skip_all, fields(task_id = %task.id))]
    async fn handle(&self, task: &Task, store: &mut GraphStore) -> Result<String> {
        let TaskKind::ExtractNode {
            name,
            category,
            depth,
            max_depth,
        } = &task.kind
        else {
            return Err(unexpected(task, "extract_node"));
        };

        let topic = store.graph().root_topic.clone();
        let queries = self.queries.node_queries(name, &topic).await;
        let evidence = self.retriever.retrieve(&queries).await?;

        let candidate = match self.generator.generate(name, &evidence).await? {
            Generation::Candidate(candidate) => candidate,
            Generation::Malformed { raw, error } => {
                warn!(%name, %error, "malformed candidate, storing placeholder");
                store.update_node_details(name, Some(ClaimBundle::placeholder(name.as_str(), raw, error)));
                return Ok(format!("{name}: candidate output malformed, placeholder stored"));
            }
        };

        let Some(bundle) = self.gate.gate(name, &candidate, &evidence).await else {
            // Nothing to resolve it with; withdraw the declared node so the run can complete.
            store.remove_node(name);
            return Ok(format!("{name}: no information found"));
        };

        let admitted: usize = ClaimField::ALL
            .iter()
            .map(|f| bundle.field(*f).len())
            .sum();
        let spawned = self.expansion.expand(store, &bundle, *depth, *max_depth);
        store.update_node_details(name, Some(bundle));

        info!(%name, %category, depth, admitted, spawned = spawned.len(), "node resolved");
        Ok(format!(
            "{name}: {admitted} facts admitted, {} nodes discovered",
            spawned.len()
        ))
    }
}
