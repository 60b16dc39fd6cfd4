//! Capability Invoker：调用 Agent 执行端点，转发其流式输出
//!
//! POST {base}/api/agents/{id}，body {"input": task}。非 2xx 立即返回 CapabilityUnavailable（此时尚未产出片段）；
//! 成功则把响应体按到达顺序转成文本片段，除了补齐被切断的 UTF-8 字符外不做任何缓冲。
//! 中途断流或片段间隔超时：已产出的片段保留，随后以一个 Err 项结束。

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::HiveError;

/// Agent 输出：有限、不可重启的片段序列
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, HiveError>> + Send>>;

/// 对单个 Agent 能力的调用
#[async_trait]
pub trait Capability: Send + Sync {
    async fn invoke(&self, agent_id: &str, task: &str) -> Result<FragmentStream, HiveError>;
}

#[derive(Debug, Serialize)]
struct InvokeRequest<'a> {
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// 通过 HTTP 调用 Agent 执行端点
pub struct HttpCapabilityInvoker {
    client: Client,
    base_url: String,
    idle_timeout: Duration,
}

impl HttpCapabilityInvoker {
    pub fn new(base_url: impl Into<String>, idle_timeout: Duration) -> Self {
        // 不设整体超时：报告可能持续数分钟，由 idle_timeout 与编排器的总时限约束
        let client = Client::builder()
            .connect_timeout(idle_timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            idle_timeout,
        }
    }

    pub fn endpoint(&self, agent_id: &str) -> String {
        format!("{}/api/agents/{}", self.base_url, agent_id)
    }
}

#[async_trait]
impl Capability for HttpCapabilityInvoker {
    async fn invoke(&self, agent_id: &str, task: &str) -> Result<FragmentStream, HiveError> {
        let url = self.endpoint(agent_id);
        let request = self.client.post(&url).json(&InvokeRequest { input: task }).send();

        let resp = tokio::time::timeout(self.idle_timeout, request)
            .await
            .map_err(|_| HiveError::CapabilityTimeout(agent_id.to_string()))?
            .map_err(|e| HiveError::CapabilityAborted {
                agent_id: agent_id.to_string(),
                reason: format!("request failed: {e}"),
            })?;

        let status = resp.status();
        if !status.is_success() {
            // 执行端点的错误体是 {"error": "..."}，只用于日志
            let detail = resp
                .json::<ErrorBody>()
                .await
                .map(|b| b.error)
                .unwrap_or_default();
            tracing::warn!(agent_id = %agent_id, status = status.as_u16(), detail = %detail, "capability rejected");
            return Err(HiveError::CapabilityUnavailable {
                agent_id: agent_id.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = Box::pin(
            resp.bytes_stream()
                .map(|chunk| chunk.map(|b| b.to_vec()).map_err(|e| e.to_string())),
        );
        Ok(fragments(bytes, agent_id.to_string(), self.idle_timeout))
    }
}

/// UTF-8 拼接器：字节块可能在多字节字符中间被切断，把不完整的尾部留到下一块
#[derive(Debug, Default)]
pub(crate) struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) => match e.error_len() {
                // 尾部不完整：等待后续字节
                None => e.valid_up_to(),
                // 真正的非法字节：有损替换，不再等待
                Some(_) => {
                    let text = String::from_utf8_lossy(&self.pending).into_owned();
                    self.pending.clear();
                    return text;
                }
            },
        };
        let rest = self.pending.split_off(valid_up_to);
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending = rest;
        text
    }

    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            let text = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            Some(text)
        }
    }
}

struct FragmentState<S> {
    bytes: S,
    carry: Utf8Carry,
    agent_id: String,
    idle: Duration,
    done: bool,
}

/// 字节流 -> 文本片段流；中断或空闲超时时先交出已有内容，再以一个 Err 结束
pub(crate) fn fragments<S>(bytes: S, agent_id: String, idle: Duration) -> FragmentStream
where
    S: Stream<Item = Result<Vec<u8>, String>> + Send + Unpin + 'static,
{
    let state = FragmentState {
        bytes,
        carry: Utf8Carry::default(),
        agent_id,
        idle,
        done: false,
    };
    Box::pin(stream::unfold(state, |mut st| async move {
        if st.done {
            return None;
        }
        loop {
            match tokio::time::timeout(st.idle, st.bytes.next()).await {
                Err(_) => {
                    st.done = true;
                    let err = HiveError::CapabilityTimeout(st.agent_id.clone());
                    return Some((Err(err), st));
                }
                Ok(None) => {
                    st.done = true;
                    return st.carry.finish().map(|tail| (Ok(tail), st));
                }
                Ok(Some(Err(reason))) => {
                    st.done = true;
                    let err = HiveError::CapabilityAborted {
                        agent_id: st.agent_id.clone(),
                        reason,
                    };
                    return Some((Err(err), st));
                }
                Ok(Some(Ok(chunk))) => {
                    let text = st.carry.push(&chunk);
                    if !text.is_empty() {
                        return Some((Ok(text), st));
                    }
                }
            }
        }
    }))
}
