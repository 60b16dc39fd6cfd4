//! 自托管的 Agent 执行端点：检索 + 报告生成
//!
//! 每个 Agent 并发执行 2–3 条检索，把结果渲染成来源块，再把报告提示交给 LLM 流式生成。
//! Capability Invoker 通过 HTTP 调用这里，对编排器而言它仍是黑盒。

pub mod profiles;
pub mod search;

use std::sync::Arc;

use futures_util::future::join_all;
use thiserror::Error;

use crate::llm::{LlmClient, LlmError, Message, TextStream};

pub use profiles::{profile, AgentProfile, QuerySpec, PROFILES};
pub use search::{render_sources, FirecrawlSearch, NoSearch, SearchHit, SearchProvider};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentRunError {
    #[error("Input is required")]
    EmptyInput,

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("search failed: {0}")]
    Search(String),

    #[error("llm failed: {0}")]
    Llm(#[from] LlmError),
}

/// 执行单个 Agent 的报告流程
pub struct AgentRunner {
    llm: Arc<dyn LlmClient>,
    search: Arc<dyn SearchProvider>,
    max_summary_chars: usize,
    max_tokens_cap: u32,
}

impl AgentRunner {
    pub fn new(llm: Arc<dyn LlmClient>, search: Arc<dyn SearchProvider>) -> Self {
        Self {
            llm,
            search,
            max_summary_chars: 400,
            max_tokens_cap: 2000,
        }
    }

    pub fn with_max_summary_chars(mut self, chars: usize) -> Self {
        self.max_summary_chars = chars;
        self
    }

    /// 各 Agent 自带 token 预算，这里只设上限
    pub fn with_max_tokens_cap(mut self, cap: u32) -> Self {
        self.max_tokens_cap = cap;
        self
    }

    pub fn supports(&self, agent_id: &str) -> bool {
        profile(agent_id).is_some()
    }

    /// 检索并渲染来源；单条检索失败视为无结果
    pub async fn gather_sources(&self, profile: &AgentProfile, subject: &str) -> String {
        let queries = profile.queries_for(subject);
        let searches = queries
            .iter()
            .map(|(query, limit)| self.search.search(query, *limit));
        let hits: Vec<SearchHit> = join_all(searches)
            .await
            .into_iter()
            .zip(&queries)
            .flat_map(|(result, (query, _))| match result {
                Ok(hits) => hits,
                Err(e) => {
                    tracing::warn!(agent_id = profile.id, query = %query, "{}", e);
                    Vec::new()
                }
            })
            .collect();
        tracing::debug!(agent_id = profile.id, sources = hits.len(), "sources gathered");
        render_sources(&hits, self.max_summary_chars)
    }

    pub fn messages(&self, profile: &AgentProfile, subject: &str, sources: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = profile.system {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(profile.render_prompt(subject, sources)));
        messages
    }

    /// 生成报告流；LLM 在开始输出之前失败则返回 Err
    pub async fn run(&self, agent_id: &str, input: &str) -> Result<TextStream, AgentRunError> {
        let subject = input.trim();
        if subject.is_empty() {
            return Err(AgentRunError::EmptyInput);
        }
        let profile =
            profile(agent_id).ok_or_else(|| AgentRunError::UnknownAgent(agent_id.to_string()))?;

        let sources = self.gather_sources(profile, subject).await;
        let messages = self.messages(profile, subject, &sources);
        let max_tokens = profile.max_tokens.min(self.max_tokens_cap);
        Ok(self.llm.complete_stream(&messages, max_tokens).await?)
    }
}
