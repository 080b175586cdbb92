//! Typed discovery tasks and their completion log.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use chaingraph_shared::Category;

/// Unique task identifier (UUID v7, time-ordered).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handler registration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    PlanStructure,
    ExtractNode,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlanStructure => "plan_structure",
            Self::ExtractNode => "extract_node",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task payload, one variant per task type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKind {
    /// Plan the three-tier structure for a topic.
    PlanStructure { topic: String, max_depth: u32 },
    /// Resolve one node's facts and expand from them.
    ExtractNode {
        name: String,
        category: Category,
        depth: u32,
        max_depth: u32,
    },
}

impl TaskKind {
    pub fn task_type(&self) -> TaskType {
        match self {
            Self::PlanStructure { .. } => TaskType::PlanStructure,
            Self::ExtractNode { .. } => TaskType::ExtractNode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
}

/// Terminal status passed to `complete_task`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    Success,
    Failed,
}

/// A unit of work in the store's queue.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    /// Lower values dispatch first.
    pub priority: i32,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    /// Arrival order; breaks ties between equal priorities and timestamps.
    pub seq: u64,
}

impl Task {
    pub fn task_type(&self) -> TaskType {
        self.kind.task_type()
    }
}

/// One entry of the completion log.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRecord {
    pub task_id: TaskId,
    pub task_type: TaskType,
    pub status: TaskOutcome,
    pub message: String,
    pub completed_at: DateTime<Utc>,
}
