//! 核心编排层：错误分类、会话状态、事件出口、编排状态机与组装

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod session;
pub mod sink;

pub use builder::{build_orchestrator, build_orchestrator_with_llm, create_llm_from_config};
pub use error::HiveError;
pub use orchestrator::{Orchestrator, RunHandle, FAILURE_MESSAGE, THINKING_MESSAGE};
pub use session::{AgentRunResult, BalanceChange, OrchestrationPhase, OrchestrationSession, Task};
pub use sink::EventSink;
