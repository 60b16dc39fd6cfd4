//! 编排事件：状态机每次转移都产出一个事件，序列化为 NDJSON 的一行
//!
//! 标签字段 "type" 为 snake_case，字段名为 camelCase；金额为两位小数字符串，计数为整数。

use serde::{Deserialize, Serialize};

use crate::registry::Amount;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum OrchestratorEvent {
    /// 规划开始
    Thinking { message: String },
    /// 规划完成：有序 Agent 列表与预计总价
    Plan {
        agents: Vec<String>,
        total_cost: Amount,
    },
    /// 已付款雇佣某个 Agent
    Hiring {
        agent_id: String,
        agent_name: String,
        icon: String,
        cost: Amount,
        tx_hash: String,
        wallet_before: Amount,
        wallet_after: Amount,
        network: String,
        /// 线上字段名沿用 basescanUrl
        #[serde(default, rename = "basescanUrl", alias = "explorerUrl")]
        explorer_url: String,
        #[serde(default)]
        real_payment: bool,
        #[serde(default)]
        from_address: String,
        #[serde(default)]
        to_address: String,
    },
    AgentStart {
        agent_id: String,
        agent_name: String,
    },
    /// 仅携带新片段，累积由消费端负责
    Chunk { agent_id: String, content: String },
    AgentDone {
        agent_id: String,
        agent_name: String,
        cost: Amount,
        tx_hash: String,
    },
    AgentError { agent_id: String },
    Synthesizing { wallet_balance: Amount },
    SynthesisChunk { content: String },
    Complete {
        total_cost: Amount,
        agents_hired: usize,
        wallet_balance: Amount,
        tx_count: usize,
    },
    Error { message: String },
}

impl OrchestratorEvent {
    /// 事件类型标签（与线上 "type" 字段一致）
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorEvent::Thinking { .. } => "thinking",
            OrchestratorEvent::Plan { .. } => "plan",
            OrchestratorEvent::Hiring { .. } => "hiring",
            OrchestratorEvent::AgentStart { .. } => "agent_start",
            OrchestratorEvent::Chunk { .. } => "chunk",
            OrchestratorEvent::AgentDone { .. } => "agent_done",
            OrchestratorEvent::AgentError { .. } => "agent_error",
            OrchestratorEvent::Synthesizing { .. } => "synthesizing",
            OrchestratorEvent::SynthesisChunk { .. } => "synthesis_chunk",
            OrchestratorEvent::Complete { .. } => "complete",
            OrchestratorEvent::Error { .. } => "error",
        }
    }

    /// complete / error 之后不再有事件
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrchestratorEvent::Complete { .. } | OrchestratorEvent::Error { .. }
        )
    }
}
