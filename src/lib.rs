//! Hive - Rust 多智能体雇佣编排
//!
//! 模块划分：
//! - **registry**: Agent 注册表与定点金额 `Amount`
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock / Scripted）
//! - **planner**: 为任务挑选 1–3 个 Agent，输出不可信时回退到默认 Agent
//! - **ledger**: 账本抽象、HTTP 签名中继、钱包簿、雇佣结算适配器
//! - **invoker**: 调用 Agent 执行端点，转发流式片段
//! - **synthesis**: 汇总所有成功报告为执行简报
//! - **stream**: 编排事件、NDJSON 编解码、消费端投影
//! - **core**: 错误分类、会话、事件出口、编排状态机与组装
//! - **agents**: 自托管的 Agent 执行端点（检索 + 报告生成）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **server**: axum HTTP 接入层（feature = "web"）

pub mod agents;
pub mod config;
pub mod core;
pub mod invoker;
pub mod ledger;
pub mod llm;
pub mod observability;
pub mod planner;
pub mod registry;
#[cfg(feature = "web")]
pub mod server;
pub mod stream;
pub mod synthesis;

pub use crate::core::{HiveError, Orchestrator, Task};
pub use crate::stream::OrchestratorEvent;
