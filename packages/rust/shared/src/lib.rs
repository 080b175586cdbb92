//! Shared types, error model, and configuration for chaingraph.
//!
//! This crate is the foundation depended on by all other chaingraph crates.
//! It provides:
//! - [`GraphError`] - the unified error type
//! - Domain types ([`Category`], [`ClaimBundle`], [`EvidenceRef`], [`IndustryGraph`])
//! - Configuration ([`AppConfig`], [`VerificationConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, ExpansionConfig, LlmConfig, RetrievalConfig, SchedulerConfig,
    VerificationConfig, VerificationStrategy, config_dir, config_file_path, init_config,
    load_config, load_config_from, validate_api_key,
};
pub use error::{GraphError, Result};
pub use types::{
    CandidateBundle, Category, ClaimBundle, ClaimField, EvidenceDetails, EvidenceDoc,
    EvidenceRef, FilteredItem, IndustryGraph, Structure, StructurePlan, description_claim,
};
