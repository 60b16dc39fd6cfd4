//! 编排会话：单次请求独占的聚合根
//!
//! 余额、规划、每个 Agent 的运行结果、支付回执与简报都只属于当前会话，
//! 随响应流关闭而销毁，不跨请求共享。唯一的写入者是编排状态机。

use std::collections::HashMap;

use serde::Serialize;

use crate::core::HiveError;
use crate::ledger::PaymentReceipt;
use crate::planner::PlanDecision;
use crate::registry::Amount;

/// 任务文本：trim 后非空
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task(String);

impl Task {
    pub fn parse(text: &str) -> Result<Self, HiveError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(HiveError::MalformedStartRequest);
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 状态机所处阶段；序号为规划中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "index", rename_all = "snake_case")]
pub enum OrchestrationPhase {
    Planning,
    Hiring(usize),
    Running(usize),
    Synthesizing,
    Complete,
    Failed,
}

/// 单个 Agent 的运行结果，随片段到达增长
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRunResult {
    pub agent_id: String,
    pub accumulated_text: String,
    pub succeeded: bool,
}

/// 一次扣款前后的余额
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    pub before: Amount,
    pub after: Amount,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationSession {
    task: Task,
    phase: OrchestrationPhase,
    initial_allowance: Amount,
    balance: Amount,
    plan: Option<PlanDecision>,
    results: HashMap<String, AgentRunResult>,
    receipts: Vec<PaymentReceipt>,
    brief: String,
}

impl OrchestrationSession {
    pub fn new(task: Task, initial_allowance: Amount) -> Self {
        Self {
            task,
            phase: OrchestrationPhase::Planning,
            initial_allowance,
            balance: initial_allowance,
            plan: None,
            results: HashMap::new(),
            receipts: Vec::new(),
            brief: String::new(),
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn phase(&self) -> OrchestrationPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: OrchestrationPhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "phase");
        self.phase = phase;
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn initial_allowance(&self) -> Amount {
        self.initial_allowance
    }

    pub fn plan(&self) -> Option<&PlanDecision> {
        self.plan.as_ref()
    }

    pub fn set_plan(&mut self, plan: PlanDecision) {
        self.plan = Some(plan);
    }

    pub fn receipts(&self) -> &[PaymentReceipt] {
        &self.receipts
    }

    pub fn result(&self, agent_id: &str) -> Option<&AgentRunResult> {
        self.results.get(agent_id)
    }

    pub fn brief(&self) -> &str {
        &self.brief
    }

    /// 记录回执并扣减余额；无论随后 Agent 是否成功，扣款都不回滚
    pub fn record_hire(&mut self, receipt: PaymentReceipt) -> BalanceChange {
        let before = self.balance;
        self.balance -= receipt.amount;
        self.results.insert(
            receipt.agent_id.clone(),
            AgentRunResult {
                agent_id: receipt.agent_id.clone(),
                accumulated_text: String::new(),
                succeeded: false,
            },
        );
        self.receipts.push(receipt);
        BalanceChange {
            before,
            after: self.balance,
        }
    }

    /// 消费端已收到携带该回执的 hiring 事件
    pub fn confirm_receipt(&mut self, agent_id: &str) {
        if let Some(r) = self.receipts.iter_mut().rev().find(|r| r.agent_id == agent_id) {
            r.confirmed = true;
        }
    }

    pub fn append_fragment(&mut self, agent_id: &str, fragment: &str) {
        if let Some(r) = self.results.get_mut(agent_id) {
            r.accumulated_text.push_str(fragment);
        }
    }

    pub fn finish_run(&mut self, agent_id: &str, succeeded: bool) {
        if let Some(r) = self.results.get_mut(agent_id) {
            r.succeeded = succeeded;
        }
    }

    pub fn append_brief(&mut self, fragment: &str) {
        self.brief.push_str(fragment);
    }

    /// 成功的结果，按规划顺序
    pub fn succeeded_results(&self) -> Vec<&AgentRunResult> {
        self.plan
            .iter()
            .flat_map(|p| p.agents())
            .filter_map(|id| self.results.get(id))
            .filter(|r| r.succeeded)
            .collect()
    }

    /// 已承诺支付的总额
    pub fn total_committed(&self) -> Amount {
        self.receipts.iter().map(|r| r.amount).sum()
    }

    pub fn hired_count(&self) -> usize {
        self.receipts.len()
    }
}
