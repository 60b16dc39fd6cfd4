//! 事件流：编排事件定义、NDJSON 编解码、消费端投影

pub mod codec;
pub mod events;
pub mod projection;

pub use codec::{decode, encode_event, EventDecoder};
pub use events::OrchestratorEvent;
pub use projection::{AgentStatus, AgentView, CompleteSummary, RunView};

/// NDJSON 响应的 Content-Type
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson; charset=utf-8";
