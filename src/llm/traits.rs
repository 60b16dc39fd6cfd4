//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / Mock）实现 LlmClient：complete（非流式）、complete_stream（流式文本片段）。
//! Planner 用 complete，Synthesizer 与 Agent 执行端点用 complete_stream。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use thiserror::Error;

use crate::llm::Message;

/// 流式补全：有限、不可重启的文本片段序列
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// LLM 调用错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("api error: {0}")]
    Api(String),

    #[error("stream error: {0}")]
    Stream(String),
}

/// LLM 客户端 trait：非流式完成与流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成，max_tokens 为本次输出上限
    async fn complete(&self, messages: &[Message], max_tokens: u32) -> Result<String, LlmError>;

    /// 流式完成：请求被拒绝时直接返回 Err，开始后错误以流中的 Err 项出现
    async fn complete_stream(
        &self,
        messages: &[Message],
        max_tokens: u32,
    ) -> Result<TextStream, LlmError>;

    /// 模型名（日志用）
    fn model_name(&self) -> &str {
        "unknown"
    }
}
