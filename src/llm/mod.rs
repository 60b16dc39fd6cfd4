//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock / Scripted）

pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

pub use message::{last_user_content, Message, Role};
pub use mock::{MockLlmClient, Script, ScriptedLlmClient};
pub use openai::{create_deepseek_client, OpenAiClient, DEEPSEEK_BASE_URL, DEEPSEEK_CHAT};
pub use traits::{LlmClient, LlmError, TextStream};
