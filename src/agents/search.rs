//! 搜索服务：Firecrawl 兼容的 /v2/search
//!
//! 单条查询失败只记 warn 并返回空结果，不会让 Agent 失败。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::agents::AgentRunError;
use crate::synthesis::truncate_chars;

/// 一条搜索结果
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchHit {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, AgentRunError>;
}

/// 未配置搜索服务：没有来源，报告会自行标注缺口
#[derive(Debug, Default)]
pub struct NoSearch;

#[async_trait]
impl SearchProvider for NoSearch {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchHit>, AgentRunError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    limit: usize,
}

/// v2 返回 {data: {web: [...]}}，v1 返回 {data: [...]}
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchData {
    Grouped {
        #[serde(default)]
        web: Vec<SearchHit>,
    },
    Flat(Vec<SearchHit>),
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Option<SearchData>,
}

pub struct FirecrawlSearch {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl FirecrawlSearch {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl SearchProvider for FirecrawlSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, AgentRunError> {
        let mut req = self
            .client
            .post(format!("{}/v2/search", self.base_url))
            .json(&SearchRequest { query, limit });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| AgentRunError::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AgentRunError::Search(format!("search returned {}", status)));
        }
        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| AgentRunError::Search(format!("malformed search response: {e}")))?;
        let mut hits = match body.data {
            Some(SearchData::Grouped { web }) => web,
            Some(SearchData::Flat(hits)) => hits,
            None => Vec::new(),
        };
        hits.truncate(limit);
        Ok(hits)
    }
}

/// `URL / Title / Summary` 块，以 `---` 分隔；摘要按字符截断
pub fn render_sources(hits: &[SearchHit], max_summary_chars: usize) -> String {
    hits.iter()
        .map(|h| {
            format!(
                "URL: {}\nTitle: {}\nSummary: {}",
                h.url,
                h.title.as_deref().filter(|t| !t.is_empty()).unwrap_or("Untitled"),
                truncate_chars(h.description.as_deref().unwrap_or(""), max_summary_chars)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_render_sources() {
        let hits = vec![
            SearchHit {
                url: "https://a.example".into(),
                title: Some("A".into()),
                description: Some("abcdef".into()),
            },
            SearchHit {
                url: "https://b.example".into(),
                title: None,
                description: None,
            },
        ];
        assert_eq!(
            render_sources(&hits, 3),
            "URL: https://a.example\nTitle: A\nSummary: abc\n\n---\n\nURL: https://b.example\nTitle: Untitled\nSummary: "
        );
        assert_eq!(render_sources(&[], 3), "");
    }

    #[tokio::test]
    async fn test_firecrawl_v2_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/search"))
            .and(header("authorization", "Bearer fc-key"))
            .and(body_json(json!({"query": "Perplexity AI", "limit": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"web": [
                    {"url": "https://perplexity.ai", "title": "Perplexity", "description": "Answer engine"},
                    {"url": "https://x.example"},
                    {"url": "https://y.example"}
                ]}
            })))
            .mount(&server)
            .await;

        let search = FirecrawlSearch::new(server.uri(), Some("fc-key".into()), 5);
        let hits = search.search("Perplexity AI", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title.as_deref(), Some("Perplexity"));
        assert!(hits[1].title.is_none());
    }

    #[tokio::test]
    async fn test_firecrawl_v1_shape_and_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/search"))
            .and(body_json(json!({"query": "ok", "limit": 3})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"url": "https://v1.example", "title": "v1"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/search"))
            .and(body_json(json!({"query": "boom", "limit": 3})))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let search = FirecrawlSearch::new(server.uri(), None, 5);
        assert_eq!(search.search("ok", 3).await.unwrap()[0].url, "https://v1.example");
        assert!(matches!(
            search.search("boom", 3).await,
            Err(AgentRunError::Search(_))
        ));
    }
}
