//! 消费端投影：把事件流折叠成可展示的运行视图
//!
//! chunk 只携带增量，这里负责按 agent_id 累积；同时跟踪钱包余额、交易列表与最终简报。
//! CLI 渲染与集成测试都基于它。

use serde::Serialize;

use crate::registry::Amount;
use crate::stream::OrchestratorEvent;

/// 单个 Agent 在视图中的状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Hired,
    Running,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentView {
    pub agent_id: String,
    pub agent_name: String,
    pub icon: String,
    pub cost: Amount,
    pub tx_hash: String,
    pub real_payment: bool,
    pub status: AgentStatus,
    pub text: String,
}

/// 运行视图
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunView {
    pub planned: Vec<String>,
    pub planned_cost: Amount,
    pub wallet: Option<Amount>,
    pub agents: Vec<AgentView>,
    pub brief: String,
    pub complete: Option<CompleteSummary>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompleteSummary {
    pub total_cost: Amount,
    pub agents_hired: usize,
    pub wallet_balance: Amount,
    pub tx_count: usize,
}

impl RunView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn agent(&self, agent_id: &str) -> Option<&AgentView> {
        self.agents.iter().find(|a| a.agent_id == agent_id)
    }

    fn agent_mut(&mut self, agent_id: &str) -> Option<&mut AgentView> {
        self.agents.iter_mut().find(|a| a.agent_id == agent_id)
    }

    pub fn is_finished(&self) -> bool {
        self.complete.is_some() || self.error.is_some()
    }

    /// 应用一个事件
    pub fn apply(&mut self, event: &OrchestratorEvent) {
        match event {
            OrchestratorEvent::Thinking { .. } => {}
            OrchestratorEvent::Plan { agents, total_cost } => {
                self.planned = agents.clone();
                self.planned_cost = *total_cost;
            }
            OrchestratorEvent::Hiring {
                agent_id,
                agent_name,
                icon,
                cost,
                tx_hash,
                wallet_after,
                real_payment,
                ..
            } => {
                self.wallet = Some(*wallet_after);
                self.agents.push(AgentView {
                    agent_id: agent_id.clone(),
                    agent_name: agent_name.clone(),
                    icon: icon.clone(),
                    cost: *cost,
                    tx_hash: tx_hash.clone(),
                    real_payment: *real_payment,
                    status: AgentStatus::Hired,
                    text: String::new(),
                });
            }
            OrchestratorEvent::AgentStart { agent_id, .. } => {
                if let Some(a) = self.agent_mut(agent_id) {
                    a.status = AgentStatus::Running;
                }
            }
            OrchestratorEvent::Chunk { agent_id, content } => {
                if let Some(a) = self.agent_mut(agent_id) {
                    a.text.push_str(content);
                }
            }
            OrchestratorEvent::AgentDone { agent_id, .. } => {
                if let Some(a) = self.agent_mut(agent_id) {
                    a.status = AgentStatus::Done;
                }
            }
            OrchestratorEvent::AgentError { agent_id } => {
                if let Some(a) = self.agent_mut(agent_id) {
                    a.status = AgentStatus::Failed;
                }
            }
            OrchestratorEvent::Synthesizing { wallet_balance } => {
                self.wallet = Some(*wallet_balance);
            }
            OrchestratorEvent::SynthesisChunk { content } => self.brief.push_str(content),
            OrchestratorEvent::Complete {
                total_cost,
                agents_hired,
                wallet_balance,
                tx_count,
            } => {
                self.wallet = Some(*wallet_balance);
                self.complete = Some(CompleteSummary {
                    total_cost: *total_cost,
                    agents_hired: *agents_hired,
                    wallet_balance: *wallet_balance,
                    tx_count: *tx_count,
                });
            }
            OrchestratorEvent::Error { message } => self.error = Some(message.clone()),
        }
    }

    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a OrchestratorEvent>) -> Self {
        let mut view = Self::new();
        for ev in events {
            view.apply(ev);
        }
        view
    }
}
