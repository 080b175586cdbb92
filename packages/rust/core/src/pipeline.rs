//! End-to-end build: topic → plan → extract/verify/expand → prune → consolidate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use chaingraph_shared::{ExpansionConfig, IndustryGraph, SchedulerConfig};
use chaingraph_verify::VerificationEngine;

use crate::collaborators::{Generator, QueryBuilder, Retriever, StructurePlanner, SynonymAdvisor};
use crate::consolidate::{ConsolidationReport, GraphConsolidator};
use crate::expansion::ExpansionPolicy;
use crate::gating::ClaimGate;
use crate::handlers::{ExtractNodeHandler, PlanStructureHandler};
use crate::scheduler::{ProgressReporter, RunOutcome, Scheduler};
use crate::store::GraphStore;
use crate::task::{CompletionRecord, TaskKind, TaskType};

/// Priority of the initial planning task.
const PLAN_PRIORITY: i32 = 0;

/// Configuration for [`build_graph`].
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Industry topic to build a graph for.
    pub topic: String,
    /// Maximum discovery hops from the planned nodes.
    pub max_depth: u32,
    pub scheduler: SchedulerConfig,
    pub expansion: ExpansionConfig,
    /// Concurrent verifications per node.
    pub concurrency: usize,
}

/// The external services a build talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub queries: Arc<dyn QueryBuilder>,
    pub retriever: Arc<dyn Retriever>,
    pub planner: Arc<dyn StructurePlanner>,
    pub generator: Arc<dyn Generator>,
    pub verifier: Arc<dyn VerificationEngine>,
    pub advisor: Arc<dyn SynonymAdvisor>,
}

/// Result of [`build_graph`]. The graph is present even when the run aborted.
#[derive(Debug)]
pub struct GraphRun {
    pub graph: IndustryGraph,
    pub outcome: RunOutcome,
    pub iterations: u32,
    pub error_count: usize,
    pub completions: Vec<CompletionRecord>,
    /// Names removed by the structural-content prune.
    pub pruned: Vec<String>,
    /// `None` when the run aborted or the advisor failed.
    pub consolidation: Option<ConsolidationReport>,
    pub elapsed: Duration,
}

/// Build an industry graph for `options.topic`.
///
/// 1. Enqueue the planning task
/// 2. Run the scheduler (plan, then extract/verify/expand each node)
/// 3. Prune nodes without structural content
/// 4. Consolidate synonyms and invalid nodes (complete runs only)
#[instrument(skip_all, fields(topic = %options.topic, max_depth = options.max_depth))]
pub async fn build_graph(
    options: &BuildOptions,
    collaborators: &Collaborators,
    progress: &dyn ProgressReporter,
) -> GraphRun {
    let start = Instant::now();
    info!(verifier = collaborators.verifier.name(), "starting graph build");

    let mut store = GraphStore::new(options.topic.clone());
    store.add_task(
        TaskKind::PlanStructure {
            topic: options.topic.clone(),
            max_depth: options.max_depth,
        },
        PLAN_PRIORITY,
    );

    let mut scheduler = Scheduler::new(options.scheduler.clone());
    scheduler
        .register(
            TaskType::PlanStructure,
            Arc::new(PlanStructureHandler {
                queries: collaborators.queries.clone(),
                retriever: collaborators.retriever.clone(),
                planner: collaborators.planner.clone(),
                extract_priority: options.expansion.child_priority,
            }),
        )
        .register(
            TaskType::ExtractNode,
            Arc::new(ExtractNodeHandler {
                queries: collaborators.queries.clone(),
                retriever: collaborators.retriever.clone(),
                generator: collaborators.generator.clone(),
                gate: ClaimGate::new(collaborators.verifier.clone(), options.concurrency),
                expansion: ExpansionPolicy::new(&options.expansion),
            }),
        );

    // --- Phase 1: Discovery ---
    progress.phase("Building graph");
    let report = scheduler.run(&mut store, progress).await;

    // --- Phase 2: Prune ---
    progress.phase("Pruning empty nodes");
    let mut pruned = store.prune_graph();

    // --- Phase 3: Consolidate ---
    let consolidation = if report.outcome.is_complete() {
        progress.phase("Consolidating synonyms");
        let consolidator = GraphConsolidator::new(collaborators.advisor.clone());
        match consolidator.consolidate(&mut store).await {
            Ok(consolidation) => {
                // Targets the advisor invented without any known source stay empty.
                pruned.extend(store.prune_graph());
                Some(consolidation)
            }
            Err(e) => {
                warn!(error = %e, "consolidation failed, keeping pruned graph");
                None
            }
        }
    } else {
        warn!(outcome = %report.outcome, "run aborted, skipping consolidation");
        None
    };

    let error_count = store.error_count();
    let completions = store.completions().to_vec();
    let graph = store.into_graph();
    let elapsed = start.elapsed();

    info!(
        outcome = %report.outcome,
        nodes = graph.structure.len(),
        pruned = pruned.len(),
        errors = error_count,
        elapsed_ms = elapsed.as_millis(),
        "graph build finished"
    );

    GraphRun {
        graph,
        outcome: report.outcome,
        iterations: report.iterations,
        error_count,
        completions,
        pruned,
        consolidation,
        elapsed,
    }
}
