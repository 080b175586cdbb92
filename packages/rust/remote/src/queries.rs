//! Retrieval query construction: model-suggested with fixed fallbacks.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use chaingraph_core::{QueryBuilder, RetrievalQueries};

use crate::chat::ChatClient;
use crate::json::parse_object;
use crate::prompts;

#[derive(Debug, Default, Deserialize)]
struct SuggestedQueries {
    #[serde(default)]
    vector_queries: Vec<String>,
    #[serde(default)]
    bm25_queries: Vec<String>,
}

pub struct LlmQueryBuilder {
    chat: ChatClient,
}

impl LlmQueryBuilder {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }
}

/// Fixed queries used when the model is unreachable or its answer unusable.
pub fn fallback_queries(name: &str, topic: &str) -> RetrievalQueries {
    RetrievalQueries {
        semantic: vec![
            format!("{topic} {name} 定义与描述"),
            format!("{name} 的上下游关系"),
            format!("{name} 行业代表性企业及龙头公司"),
        ],
        keyword: vec![
            name.to_string(),
            format!("{name}企业"),
            format!("{name}上市公司"),
        ],
    }
}

fn clean(queries: Vec<String>) -> Vec<String> {
    queries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect()
}

/// Parse a model answer; an empty half is filled with a single default query.
pub(crate) fn interpret(raw: &str, name: &str, topic: &str) -> Option<RetrievalQueries> {
    let suggested: SuggestedQueries = serde_json::from_value(parse_object(raw)?).ok()?;
    let mut semantic = clean(suggested.vector_queries);
    let mut keyword = clean(suggested.bm25_queries);
    if semantic.is_empty() {
        semantic.push(format!("{topic} {name} 详细信息"));
    }
    if keyword.is_empty() {
        keyword.push(name.to_string());
    }
    Some(RetrievalQueries { semantic, keyword })
}

#[async_trait]
impl QueryBuilder for LlmQueryBuilder {
    async fn topic_queries(&self, topic: &str) -> RetrievalQueries {
        RetrievalQueries {
            semantic: vec![
                topic.to_string(),
                format!("{topic} 产业链"),
                format!("{topic} 上游 中游 下游"),
            ],
            keyword: vec![topic.to_string()],
        }
    }

    async fn node_queries(&self, name: &str, topic: &str) -> RetrievalQueries {
        let prompt = prompts::node_queries(name, topic);
        let raw = match self.chat.complete(prompts::QUERY_SYSTEM, &prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%name, error = %e, "query generation failed, using fallback queries");
                return fallback_queries(name, topic);
            }
        };

        match interpret(&raw, name, topic) {
            Some(queries) => {
                debug!(
                    %name,
                    semantic = queries.semantic.len(),
                    keyword = queries.keyword.len(),
                    "queries generated"
                );
                queries
            }
            None => {
                warn!(%name, "unparseable query output, using fallback queries");
                fallback_queries(name, topic)
            }
        }
    }
}
