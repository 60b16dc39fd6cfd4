//! 编排错误分类
//!
//! 只有「没有恢复路径」的错误会终止会话（SynthesisFailed、ConsumerGone）；
//! 其余在本地吸收：规划降级为默认 Agent，结算降级为模拟回执，单个 Agent 失败转为 agent_error 事件。

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HiveError {
    /// 任务为空（trim 后），在进入 PLANNING 前拒绝
    #[error("Task required")]
    MalformedStartRequest,

    /// 推理服务返回不可用的规划；本地回退到默认 Agent，不对外报错
    #[error("planning degraded: {0}")]
    PlanningDegraded(String),

    /// 账本不可用或未配置；本地回退为模拟回执
    #[error("settlement unavailable: {0}")]
    SettlementUnavailable(String),

    /// Agent 执行端点拒绝请求（非 2xx），尚未产出任何片段
    #[error("capability {agent_id} unavailable (status {status})")]
    CapabilityUnavailable { agent_id: String, status: u16 },

    /// Agent 输出流中途断开
    #[error("capability {agent_id} aborted: {reason}")]
    CapabilityAborted { agent_id: String, reason: String },

    /// Agent 在时限内无响应
    #[error("capability {0} timed out")]
    CapabilityTimeout(String),

    /// 汇总调用彻底失败；唯一允许以 error 事件结束会话的情形
    #[error("synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    /// 消费端已关闭传输（或被取消），停止一切后续工作
    #[error("event consumer gone")]
    ConsumerGone,

    #[error("config error: {0}")]
    Config(String),
}
