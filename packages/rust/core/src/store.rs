//! Graph store: the canonical graph, the task queue, and every mutation primitive.
//!
//! Invariants maintained by the operations below:
//! - a name sits in exactly one category once declared;
//! - every name in `structure` has a `node_details` key (possibly `None`).

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use chrono::Utc;
use tracing::{debug, info, warn};

use chaingraph_shared::{Category, ClaimBundle, IndustryGraph, StructurePlan};

use crate::task::{CompletionRecord, Task, TaskId, TaskKind, TaskOutcome, TaskStatus, TaskType};

/// Owns the graph under construction and the pending task queue.
#[derive(Debug)]
pub struct GraphStore {
    graph: IndustryGraph,
    initialized: bool,
    /// Sorted by `(priority, seq)`.
    queue: VecDeque<Task>,
    dispatched: HashMap<TaskId, TaskType>,
    completions: Vec<CompletionRecord>,
    error_count: usize,
    next_seq: u64,
}

impl GraphStore {
    pub fn new(root_topic: impl Into<String>) -> Self {
        Self {
            graph: IndustryGraph::new(root_topic),
            initialized: false,
            queue: VecDeque::new(),
            dispatched: HashMap::new(),
            completions: Vec::new(),
            error_count: 0,
            next_seq: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Task queue
    // -----------------------------------------------------------------------

    /// Enqueue a task. Lower `priority` dispatches first; equal priorities are FIFO.
    pub fn add_task(&mut self, kind: TaskKind, priority: i32) -> TaskId {
        let task = Task {
            id: TaskId::new(),
            kind,
            priority,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            seq: self.next_seq,
        };
        self.next_seq += 1;

        let id = task.id;
        debug!(task_id = %id, task_type = %task.task_type(), priority, "task queued");
        let at = self.queue.partition_point(|t| t.priority <= priority);
        self.queue.insert(at, task);
        id
    }

    /// Pop the head of the queue and mark it in progress. `None` when empty.
    pub fn next_task(&mut self) -> Option<Task> {
        let mut task = self.queue.pop_front()?;
        task.status = TaskStatus::InProgress;
        self.dispatched.insert(task.id, task.task_type());
        Some(task)
    }

    /// Record a task's completion. Not idempotent: each call appends a record.
    pub fn complete_task(&mut self, id: TaskId, message: impl Into<String>, status: TaskOutcome) {
        let message = message.into();
        let Some(task_type) = self.dispatched.get(&id).copied() else {
            warn!(task_id = %id, "completion for a task that was never dispatched, ignoring");
            return;
        };

        if status == TaskOutcome::Failed {
            self.error_count += 1;
            warn!(task_id = %id, %task_type, %message, "task failed");
        } else {
            debug!(task_id = %id, %task_type, %message, "task completed");
        }

        self.completions.push(CompletionRecord {
            task_id: id,
            task_type,
            status,
            message,
            completed_at: Utc::now(),
        });
    }

    pub fn pending_tasks(&self) -> usize {
        self.queue.len()
    }

    pub fn completions(&self) -> &[CompletionRecord] {
        &self.completions
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    // -----------------------------------------------------------------------
    // Structure
    // -----------------------------------------------------------------------

    /// Seed the structure from a plan, deduplicating names across categories
    /// in priority order (midstream, downstream, upstream).
    pub fn initialize_structure(&mut self, plan: &StructurePlan) {
        let mut seen = HashSet::new();
        let structure = &mut self.graph.structure;
        *structure = Default::default();

        for category in Category::PRIORITY {
            for name in plan.get(category) {
                let name = name.trim();
                if name.is_empty() || !seen.insert(name.to_string()) {
                    continue;
                }
                structure.get_mut(category).push(name.to_string());
                self.graph.node_details.entry(name.to_string()).or_insert(None);
            }
        }

        self.initialized = true;
        info!(
            upstream = structure.upstream.len(),
            midstream = structure.midstream.len(),
            downstream = structure.downstream.len(),
            "structure initialized"
        );
    }

    /// Register a newly discovered node. Returns `false` without mutating
    /// anything if the name already exists in any category.
    pub fn add_node_to_structure(&mut self, name: &str, category: Category) -> bool {
        if self.graph.structure.contains(name) {
            return false;
        }
        self.graph.structure.get_mut(category).push(name.to_string());
        self.graph.node_details.entry(name.to_string()).or_insert(None);
        debug!(name, %category, "node added");
        true
    }

    /// Overwrite a node's details. Unknown names are accepted with a warning.
    pub fn update_node_details(&mut self, name: &str, details: Option<ClaimBundle>) {
        if !self.graph.node_details.contains_key(name) {
            warn!(name, "details for a node not yet in node_details");
        }
        self.graph.node_details.insert(name.to_string(), details);
    }

    /// Delete a node from every category and from `node_details`.
    pub fn remove_node(&mut self, name: &str) -> bool {
        let from_structure = self.graph.structure.remove_everywhere(name);
        let from_details = self.graph.node_details.remove(name).is_some();
        from_structure || from_details
    }

    /// Fold `drop` into `keep`. Returns `false` (no mutation) when `drop` has no
    /// `node_details` entry or the names are equal.
    pub fn merge_nodes(&mut self, keep: &str, drop: &str) -> bool {
        if keep == drop {
            return false;
        }
        let Some(dropped) = self.graph.node_details.get(drop).cloned() else {
            return false;
        };

        if !self.graph.structure.contains(keep) {
            if let Some(category) = self.graph.structure.category_of(drop) {
                self.graph.structure.get_mut(category).push(keep.to_string());
            }
        }

        let merged = merge_bundles(keep, self.graph.node_details.remove(keep).flatten(), dropped);
        self.graph.node_details.insert(keep.to_string(), merged);
        self.remove_node(drop);

        info!(keep, drop, "nodes merged");
        true
    }

    /// Merge `sources` into `target` so the target ends up in exactly one category.
    ///
    /// The target category is the one `target` already occupies, else that of the
    /// first source found in the structure, else upstream. Returns `false` when no
    /// source other than the target remains.
    pub fn absorb_nodes(&mut self, target: &str, sources: &[String]) -> bool {
        let mut unique = BTreeSet::new();
        let sources: Vec<&str> = sources
            .iter()
            .map(String::as_str)
            .filter(|s| *s != target && unique.insert(*s))
            .collect();
        if sources.is_empty() {
            return false;
        }

        let structure = &mut self.graph.structure;
        let category = structure
            .category_of(target)
            .or_else(|| sources.iter().find_map(|s| structure.category_of(s)))
            .unwrap_or(Category::Upstream);

        for source in &sources {
            structure.remove_everywhere(source);
        }
        if !structure.get(category).iter().any(|n| n == target) {
            structure.get_mut(category).push(target.to_string());
        }

        let mut merged = self.graph.node_details.remove(target).flatten();
        for source in &sources {
            if let Some(bundle) = self.graph.node_details.remove(*source) {
                merged = merge_bundles(target, merged, bundle);
            }
        }
        self.graph.node_details.insert(target.to_string(), merged);

        info!(target, sources = ?sources, %category, "nodes consolidated");
        true
    }

    /// Remove every node whose details are missing or carry no list content.
    /// Returns the removed names.
    pub fn prune_graph(&mut self) -> Vec<String> {
        let mut candidates: BTreeSet<String> = self.graph.node_details.keys().cloned().collect();
        candidates.extend(self.graph.structure.names().cloned());

        let doomed: Vec<String> = candidates
            .into_iter()
            .filter(|name| {
                !matches!(
                    self.graph.node_details.get(name),
                    Some(Some(bundle)) if bundle.has_structural_content()
                )
            })
            .collect();

        for name in &doomed {
            self.remove_node(name);
        }
        if !doomed.is_empty() {
            info!(count = doomed.len(), "pruned empty nodes");
        }
        doomed
    }

    /// True once the structure is initialized and every declared name has details.
    pub fn all_nodes_resolved(&self) -> bool {
        self.initialized
            && self
                .graph
                .structure
                .names()
                .all(|n| matches!(self.graph.node_details.get(n), Some(Some(_))))
    }

    /// Every known name: structure order first, then detail-only keys.
    pub fn known_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.graph
            .structure
            .names()
            .chain(self.graph.node_details.keys())
            .filter(|n| seen.insert(n.as_str()))
            .cloned()
            .collect()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn graph(&self) -> &IndustryGraph {
        &self.graph
    }

    pub fn into_graph(self) -> IndustryGraph {
        self.graph
    }
}

/// `keep`'s bundle absorbs `dropped`; a missing `keep` bundle adopts `dropped` wholesale.
fn merge_bundles(
    keep: &str,
    kept: Option<ClaimBundle>,
    dropped: Option<ClaimBundle>,
) -> Option<ClaimBundle> {
    match (kept, dropped) {
        (Some(mut kept), Some(dropped)) => {
            kept.absorb(dropped);
            Some(kept)
        }
        (None, Some(mut dropped)) => {
            dropped.entity_name = keep.to_string();
            Some(dropped)
        }
        (kept, None) => kept,
    }
}
