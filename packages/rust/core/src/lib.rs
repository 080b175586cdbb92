//! Graph-construction workflow engine for chaingraph.
//!
//! This crate ties the graph store, the scheduling loop, per-node claim gating,
//! depth-bounded expansion, and end-of-run consolidation into one workflow
//! (see [`pipeline::build_graph`]). External services are reached only through
//! the traits in [`collaborators`].

pub mod collaborators;
pub mod consolidate;
pub mod expansion;
pub mod gating;
pub mod handlers;
pub mod pipeline;
pub mod scheduler;
pub mod store;
pub mod task;

#[cfg(test)]
mod testing;

pub use collaborators::{
    Advice, Generation, Generator, MergeSuggestion, QueryBuilder, RetrievalQueries, Retriever,
    StructurePlanner, SynonymAdvisor,
};
pub use pipeline::{BuildOptions, Collaborators, GraphRun, build_graph};
pub use scheduler::{AbortReason, ProgressReporter, ProgressSnapshot, RunOutcome, SilentProgress};
pub use store::GraphStore;
