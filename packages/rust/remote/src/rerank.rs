//! Cross-encoder reranking over the `/rerank` endpoint of the model server.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use chaingraph_shared::{GraphError, Result};
use chaingraph_verify::{RankedDoc, Reranker};

use crate::chat::ChatClient;

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [&'a str],
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    #[serde(default)]
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f64,
}

pub struct HttpReranker {
    chat: ChatClient,
    model: String,
}

impl HttpReranker {
    /// Reuses the chat client's server, credentials and timeout.
    pub fn new(chat: ChatClient, model: impl Into<String>) -> Self {
        Self {
            chat,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[&str],
        top_n: usize,
    ) -> Result<Vec<RankedDoc>> {
        if documents.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }
        let url = self.chat.endpoint("rerank")?;
        let body = RerankRequest {
            model: &self.model,
            query,
            documents,
            top_n,
        };

        let response = self
            .chat
            .authorize(self.chat.http().post(url.clone()).json(&body))
            .send()
            .await
            .map_err(|e| GraphError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GraphError::Network(format!("{url}: HTTP {status}")));
        }

        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|e| GraphError::parse(format!("{url}: invalid rerank body: {e}")))?;

        let mut ranked: Vec<RankedDoc> = parsed
            .results
            .into_iter()
            .filter(|r| r.index < documents.len())
            .map(|r| RankedDoc {
                index: r.index,
                score: r.relevance_score,
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(top_n);

        debug!(docs = documents.len(), ranked = ranked.len(), "reranked");
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::tests::config_for;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn results_are_sorted_and_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/rerank"))
            .and(body_partial_json(serde_json::json!({
                "model": "Qwen3-Reranker-0.6B",
                "query": "硅片"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"index": 0, "relevance_score": 0.2},
                    {"index": 2, "relevance_score": 0.9},
                    {"index": 9, "relevance_score": 0.99}
                ]
            })))
            .mount(&server)
            .await;

        let chat = ChatClient::new(&config_for(&server)).unwrap();
        let reranker = HttpReranker::new(chat, "Qwen3-Reranker-0.6B");
        let ranked = reranker.rerank("硅片", &["a", "b", "c"], 3).await.unwrap();

        assert_eq!(
            ranked,
            vec![
                RankedDoc { index: 2, score: 0.9 },
                RankedDoc { index: 0, score: 0.2 },
            ]
        );
    }

    #[tokio::test]
    async fn http_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let chat = ChatClient::new(&config_for(&server)).unwrap();
        let err = HttpReranker::new(chat, "m")
            .rerank("q", &["a"], 1)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Network(_)));
    }
}
