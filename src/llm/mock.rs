//! Mock / Scripted LLM 客户端（无需 API）
//!
//! - MockLlmClient：无 Key 时的离线兜底，回显最后一条 User 消息。规划因此必然走默认 Agent。
//! - ScriptedLlmClient：按顺序消费预置脚本，供测试与演示精确控制每次调用的结果。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;

use crate::llm::{last_user_content, LlmClient, LlmError, Message, TextStream};

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message], _max_tokens: u32) -> Result<String, LlmError> {
        let last_user = last_user_content(messages).unwrap_or("(no input)");
        let preview: String = last_user.chars().take(200).collect();
        Ok(format!("Echo from Mock: {}", preview))
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        max_tokens: u32,
    ) -> Result<TextStream, LlmError> {
        let content = self.complete(messages, max_tokens).await?;
        // 按词切分，模拟逐段输出
        let words: Vec<Result<String, LlmError>> = content
            .split_inclusive(' ')
            .map(|w| Ok(w.to_string()))
            .collect();
        Ok(Box::pin(stream::iter(words)))
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

/// 单次调用的脚本
#[derive(Debug, Clone)]
pub enum Script {
    /// 完整回复；流式调用时作为单个片段输出
    Reply(String),
    /// 分片回复；非流式调用时拼接后返回
    Chunks(Vec<String>),
    /// 请求直接失败
    Fail(String),
    /// 先输出若干片段，再以错误中断
    Abort(Vec<String>, String),
}

/// 按脚本顺序回复的客户端；记录每次调用收到的消息
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    scripts: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 已收到的调用（按顺序）
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn next(&self, messages: &[Message]) -> Result<Script, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        self.scripts
            .lock()
            .map_err(|_| LlmError::Api("script lock poisoned".to_string()))?
            .pop_front()
            .ok_or_else(|| LlmError::Api("script exhausted".to_string()))
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message], _max_tokens: u32) -> Result<String, LlmError> {
        match self.next(messages)? {
            Script::Reply(text) => Ok(text),
            Script::Chunks(chunks) => Ok(chunks.concat()),
            Script::Fail(reason) | Script::Abort(_, reason) => Err(LlmError::Api(reason)),
        }
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        _max_tokens: u32,
    ) -> Result<TextStream, LlmError> {
        let items: Vec<Result<String, LlmError>> = match self.next(messages)? {
            Script::Reply(text) => vec![Ok(text)],
            Script::Chunks(chunks) => chunks.into_iter().map(Ok).collect(),
            Script::Fail(reason) => return Err(LlmError::Api(reason)),
            Script::Abort(chunks, reason) => chunks
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(LlmError::Stream(reason))))
                .collect(),
        };
        Ok(Box::pin(stream::iter(items)))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
