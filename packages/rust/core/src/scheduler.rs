//! The dispatch loop: pop a task, run its handler, record the completion.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use chaingraph_shared::SchedulerConfig;

use crate::handlers::TaskHandler;
use crate::store::GraphStore;
use crate::task::{TaskOutcome, TaskType};

/// Why a run stopped before every node was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    IterationCap,
    Stalled,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IterationCap => f.write_str("iteration cap exceeded"),
            Self::Stalled => f.write_str("stalled"),
        }
    }
}

/// Terminal state of the scheduling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum RunOutcome {
    Complete,
    Aborted(AbortReason),
}

impl RunOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => f.write_str("complete"),
            Self::Aborted(reason) => write!(f, "aborted ({reason})"),
        }
    }
}

/// Counts emitted every few iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub iteration: u32,
    pub pending: usize,
    pub nodes: usize,
    pub resolved: usize,
    pub errors: usize,
}

impl ProgressSnapshot {
    fn of(store: &GraphStore, iteration: u32) -> Self {
        let graph = store.graph();
        Self {
            iteration,
            pending: store.pending_tasks(),
            nodes: graph.structure.len(),
            resolved: graph
                .structure
                .names()
                .filter(|n| matches!(graph.node_details.get(*n), Some(Some(_))))
                .count(),
            errors: store.error_count(),
        }
    }
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called every `progress_every` iterations.
    fn progress(&self, snapshot: &ProgressSnapshot);
    /// Called once the loop has stopped.
    fn finished(&self, outcome: RunOutcome, iterations: u32);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn progress(&self, _snapshot: &ProgressSnapshot) {}
    fn finished(&self, _outcome: RunOutcome, _iterations: u32) {}
}

/// Loop result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerReport {
    pub outcome: RunOutcome,
    pub iterations: u32,
}

/// Sequential task dispatcher over a [`GraphStore`].
pub struct Scheduler {
    handlers: HashMap<TaskType, Arc<dyn TaskHandler>>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            handlers: HashMap::new(),
            config,
        }
    }

    /// Register the handler for `task_type`, replacing any previous one.
    pub fn register(&mut self, task_type: TaskType, handler: Arc<dyn TaskHandler>) -> &mut Self {
        self.handlers.insert(task_type, handler);
        self
    }

    /// Drive the store until every node is resolved, the queue stays empty for
    /// `stall_patience` consecutive polls, or `max_iterations` is reached.
    ///
    /// Handler errors fail only their task; the loop itself never errors.
    #[instrument(skip_all, fields(max_iterations = self.config.max_iterations))]
    pub async fn run(&self, store: &mut GraphStore, progress: &dyn ProgressReporter) -> SchedulerReport {
        let mut iterations: u32 = 0;
        let mut stall: u32 = 0;
        let every = self.config.progress_every.max(1);

        let outcome = loop {
            if iterations >= self.config.max_iterations {
                warn!(iterations, "iteration cap exceeded, stopping");
                break RunOutcome::Aborted(AbortReason::IterationCap);
            }
            iterations += 1;

            if iterations % every == 0 {
                let snapshot = ProgressSnapshot::of(store, iterations);
                info!(
                    iteration = snapshot.iteration,
                    pending = snapshot.pending,
                    nodes = snapshot.nodes,
                    resolved = snapshot.resolved,
                    errors = snapshot.errors,
                    "progress"
                );
                progress.progress(&snapshot);
            }

            let Some(task) = store.next_task() else {
                stall += 1;
                if store.all_nodes_resolved() {
                    break RunOutcome::Complete;
                }
                if stall >= self.config.stall_patience {
                    warn!(stall, "queue empty with unresolved nodes, stopping");
                    break RunOutcome::Aborted(AbortReason::Stalled);
                }
                tokio::task::yield_now().await;
                continue;
            };
            stall = 0;

            let task_type = task.task_type();
            let Some(handler) = self.handlers.get(&task_type) else {
                store.complete_task(task.id, "unknown task type", TaskOutcome::Failed);
                continue;
            };

            let result = AssertUnwindSafe(handler.handle(&task, store))
                .catch_unwind()
                .await;
            match result {
                Ok(Ok(message)) => store.complete_task(task.id, message, TaskOutcome::Success),
                Ok(Err(e)) => {
                    error!(task_id = %task.id, %task_type, error = %e, "task handler failed");
                    store.complete_task(task.id, e.to_string(), TaskOutcome::Failed);
                }
                Err(payload) => {
                    let message = format!("handler panicked: {}", panic_message(payload.as_ref()));
                    error!(task_id = %task.id, %task_type, %message, "task handler panicked");
                    store.complete_task(task.id, message, TaskOutcome::Failed);
                }
            }
        };

        info!(%outcome, iterations, errors = store.error_count(), "scheduler stopped");
        progress.finished(outcome, iterations);
        SchedulerReport {
            outcome,
            iterations,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
