//! Application configuration for chaingraph.
//!
//! User config lives at `~/.chaingraph/chaingraph.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{GraphError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "chaingraph.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".chaingraph";

// ---------------------------------------------------------------------------
// Config structs (matching chaingraph.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Scheduler loop limits.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Claim verification scoring.
    #[serde(default)]
    pub verification: VerificationConfig,

    /// Discovery expansion policy.
    #[serde(default)]
    pub expansion: ExpansionConfig,

    /// Chat-completion endpoint used by the generation collaborators.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Retrieval service.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory for graph JSON output.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Maximum discovery hops from the planned nodes.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_depth: default_max_depth(),
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}
fn default_max_depth() -> u32 {
    2
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Hard cap on loop iterations (empty polls included).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Consecutive empty polls tolerated before the run is declared stalled.
    #[serde(default = "default_stall_patience")]
    pub stall_patience: u32,

    /// Emit a progress observation every N iterations.
    #[serde(default = "default_progress_every")]
    pub progress_every: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            stall_patience: default_stall_patience(),
            progress_every: default_progress_every(),
        }
    }
}

fn default_max_iterations() -> u32 {
    100
}
fn default_stall_patience() -> u32 {
    5
}
fn default_progress_every() -> u32 {
    5
}

/// Which verification strategy backs the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStrategy {
    /// Lexical coverage + entailment composite score.
    #[default]
    Composite,
    /// Reranker relevance + verbatim span location.
    Ranking,
}

/// `[verification]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    #[serde(default)]
    pub strategy: VerificationStrategy,

    /// Weight of lexical coverage in the composite score.
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Weight of the entailment probability in the composite score.
    #[serde(default = "default_beta")]
    pub beta: f64,

    /// Minimum composite score for a claim to be admitted.
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Only the first K evidence documents are considered.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Documents under this lexical coverage skip the entailment call
    /// unless they contain the focus entity verbatim.
    #[serde(default = "default_prefilter_threshold")]
    pub prefilter_threshold: f64,

    /// Added to the score when the focus entity appears verbatim.
    #[serde(default = "default_entity_bonus")]
    pub entity_bonus: f64,

    /// Stop scanning once a document scores above this.
    #[serde(default = "default_early_exit_score")]
    pub early_exit_score: f64,

    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    /// Entailment score assumed when the oracle call fails.
    #[serde(default = "default_neutral_score")]
    pub neutral_score: f64,

    /// Concurrent verifications per node.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Minimum reranker relevance for the ranking strategy.
    #[serde(default = "default_ranking_threshold")]
    pub ranking_threshold: f64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            strategy: VerificationStrategy::default(),
            alpha: default_alpha(),
            beta: default_beta(),
            threshold: default_threshold(),
            top_k: default_top_k(),
            prefilter_threshold: default_prefilter_threshold(),
            entity_bonus: default_entity_bonus(),
            early_exit_score: default_early_exit_score(),
            epsilon: default_epsilon(),
            neutral_score: default_neutral_score(),
            concurrency: default_concurrency(),
            ranking_threshold: default_ranking_threshold(),
        }
    }
}

fn default_alpha() -> f64 {
    0.6
}
fn default_beta() -> f64 {
    0.4
}
fn default_threshold() -> f64 {
    0.6
}
fn default_top_k() -> usize {
    3
}
fn default_prefilter_threshold() -> f64 {
    0.05
}
fn default_entity_bonus() -> f64 {
    0.25
}
fn default_early_exit_score() -> f64 {
    0.95
}
fn default_epsilon() -> f64 {
    1e-6
}
fn default_neutral_score() -> f64 {
    0.5
}
fn default_concurrency() -> usize {
    5
}
fn default_ranking_threshold() -> f64 {
    0.5
}

/// `[expansion]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpansionConfig {
    /// Longer candidates are treated as descriptive phrases, not entity names.
    #[serde(default = "default_max_name_chars")]
    pub max_name_chars: usize,

    /// Priority of discovery tasks spawned by expansion.
    #[serde(default = "default_child_priority")]
    pub child_priority: i32,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            max_name_chars: default_max_name_chars(),
            child_priority: default_child_priority(),
        }
    }
}

fn default_max_name_chars() -> usize {
    20
}
fn default_child_priority() -> i32 {
    1
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API (`.../v1`).
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Model served on `{base_url}/rerank` for the ranking verification strategy.
    #[serde(default = "default_reranker_model")]
    pub reranker_model: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            reranker_model: default_reranker_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl LlmConfig {
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .map_err(|e| GraphError::config(format!("invalid llm.base_url '{}': {e}", self.base_url)))
    }
}

fn default_llm_base_url() -> String {
    "http://localhost:9997/v1".into()
}
fn default_llm_model() -> String {
    "qwen3".into()
}
fn default_reranker_model() -> String {
    "Qwen3-Reranker-0.6B".into()
}
fn default_api_key_env() -> String {
    "CHAINGRAPH_API_KEY".into()
}
fn default_temperature() -> f64 {
    0.6
}
fn default_llm_timeout() -> u64 {
    120
}

/// `[retrieval]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Search endpoint accepting `{queries, top_n}`.
    #[serde(default = "default_retrieval_endpoint")]
    pub endpoint: String,

    /// Documents requested per retrieval.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    #[serde(default = "default_retrieval_timeout")]
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            endpoint: default_retrieval_endpoint(),
            top_n: default_top_n(),
            timeout_secs: default_retrieval_timeout(),
        }
    }
}

impl RetrievalConfig {
    pub fn endpoint(&self) -> Result<Url> {
        Url::parse(&self.endpoint).map_err(|e| {
            GraphError::config(format!("invalid retrieval.endpoint '{}': {e}", self.endpoint))
        })
    }
}

fn default_retrieval_endpoint() -> String {
    "http://localhost:8080/search".into()
}
fn default_top_n() -> usize {
    40
}
fn default_retrieval_timeout() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.chaingraph/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| GraphError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.chaingraph/chaingraph.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| GraphError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| GraphError::config(format!("failed to parse {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| GraphError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content = toml::to_string_pretty(&config).map_err(|e| GraphError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| GraphError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the LLM API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.llm.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(GraphError::config(format!(
            "LLM API key not found. Set the {var_name} environment variable."
        ))),
    }
}

impl AppConfig {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let v = &self.verification;
        if v.top_k == 0 {
            return Err(GraphError::config("verification.top_k must be at least 1"));
        }
        if v.concurrency == 0 {
            return Err(GraphError::config("verification.concurrency must be at least 1"));
        }
        if !(0.0..=1.0).contains(&v.threshold) {
            return Err(GraphError::config("verification.threshold must be within [0, 1]"));
        }
        if self.scheduler.stall_patience == 0 {
            return Err(GraphError::config("scheduler.stall_patience must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("stall_patience"));
        assert!(toml_str.contains("CHAINGRAPH_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.max_depth, 2);
        assert_eq!(parsed.scheduler.max_iterations, 100);
        assert_eq!(parsed.verification.top_k, 3);
        assert_eq!(parsed.verification.strategy, VerificationStrategy::Composite);
    }

    #[test]
    fn partial_sections_fill_defaults() {
        let toml_str = r#"
[verification]
strategy = "ranking"
threshold = 0.7

[expansion]
max_name_chars = 12
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.verification.strategy, VerificationStrategy::Ranking);
        assert_eq!(config.verification.threshold, 0.7);
        assert_eq!(config.verification.alpha, 0.6);
        assert_eq!(config.expansion.max_name_chars, 12);
        assert_eq!(config.expansion.child_priority, 1);
        assert_eq!(config.scheduler.stall_patience, 5);
    }

    #[test]
    fn validation_rejects_zero_top_k() {
        let mut config = AppConfig::default();
        config.verification.top_k = 0;
        assert!(config.validate().is_err());
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn urls_parse() {
        let config = AppConfig::default();
        assert!(config.llm.base_url().is_ok());
        assert_eq!(config.retrieval.endpoint().expect("endpoint").path(), "/search");
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.llm.api_key_env = "CG_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
