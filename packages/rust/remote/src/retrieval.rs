//! HTTP client for the hybrid search service.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use chaingraph_core::{RetrievalQueries, Retriever};
use chaingraph_shared::{EvidenceDoc, GraphError, Result, RetrievalConfig};

use crate::chat::build_client;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    queries: &'a RetrievalQueries,
    top_n: usize,
}

/// The service may answer with `{"results": [...]}` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Wrapped { results: Vec<EvidenceDoc> },
    Bare(Vec<EvidenceDoc>),
}

impl SearchResponse {
    fn into_docs(self) -> Vec<EvidenceDoc> {
        match self {
            Self::Wrapped { results } | Self::Bare(results) => results,
        }
    }
}

/// [`Retriever`] that POSTs queries to a search endpoint and trusts its ordering.
pub struct HttpRetriever {
    client: Client,
    endpoint: Url,
    top_n: usize,
}

impl HttpRetriever {
    pub fn new(config: &RetrievalConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            endpoint: config.endpoint()?,
            top_n: config.top_n,
        })
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    #[instrument(skip_all, fields(
        semantic = queries.semantic.len(),
        keyword = queries.keyword.len(),
    ))]
    async fn retrieve(&self, queries: &RetrievalQueries) -> Result<Vec<EvidenceDoc>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        let url = &self.endpoint;
        let body = SearchRequest {
            queries,
            top_n: self.top_n,
        };

        let response = self
            .client
            .post(url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| GraphError::Retrieval(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GraphError::Retrieval(format!("{url}: HTTP {status}")));
        }

        let docs = response
            .json::<SearchResponse>()
            .await
            .map_err(|e| GraphError::Retrieval(format!("{url}: invalid search response: {e}")))?
            .into_docs();

        debug!(docs = docs.len(), "evidence retrieved");
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> RetrievalConfig {
        RetrievalConfig {
            endpoint: format!("{}/search", server.uri()),
            top_n: 10,
            ..RetrievalConfig::default()
        }
    }

    fn queries() -> RetrievalQueries {
        RetrievalQueries {
            semantic: vec!["硅片的生产工艺".into()],
            keyword: vec!["硅片".into()],
        }
    }

    #[tokio::test]
    async fn posts_queries_and_keeps_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(serde_json::json!({
                "top_n": 10,
                "queries": {"keyword": ["硅片"]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"text": "硅片由多晶硅切割而成。", "source_id": "a.pdf", "chunk_id": "3"},
                    {"text": "隆基是硅片龙头。", "source_id": "b.pdf", "chunk_id": "7"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let retriever = HttpRetriever::new(&config_for(&server)).unwrap();
        let docs = retriever.retrieve(&queries()).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source_id, "a.pdf");
        assert_eq!(docs[1].chunk_id, "7");
    }

    #[tokio::test]
    async fn bare_array_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"text": "t", "source_id": "s", "chunk_id": "c"}
            ])))
            .mount(&server)
            .await;

        let retriever = HttpRetriever::new(&config_for(&server)).unwrap();
        assert_eq!(retriever.retrieve(&queries()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn server_error_is_a_retrieval_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let retriever = HttpRetriever::new(&config_for(&server)).unwrap();
        let err = retriever.retrieve(&queries()).await.unwrap_err();
        assert!(matches!(err, GraphError::Retrieval(_)));
    }

    #[tokio::test]
    async fn empty_queries_skip_the_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let retriever = HttpRetriever::new(&config_for(&server)).unwrap();
        let docs = retriever.retrieve(&RetrievalQueries::default()).await.unwrap();
        assert!(docs.is_empty());
    }
}
