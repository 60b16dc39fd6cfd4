//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__LLM__PROVIDER=openai`）。
//! API Key 只从环境变量读取，不写进 TOML。

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::registry::{Amount, DEFAULT_AGENT_ID};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub planner: PlannerSection,
    pub synthesis: SynthesisSection,
    pub agents: AgentsSection,
    pub ledger: LedgerSection,
    pub search: SearchSection,
    pub web: WebSection,
}

/// [app] 段：应用名、每个会话的初始额度、Agent 执行端点地址
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    /// 每个会话独立的初始余额
    #[serde(default = "default_initial_allowance")]
    pub initial_allowance: Amount,
    /// Capability Invoker 调用的 `{base}/api/agents/{id}`
    #[serde(default = "default_agents_base_url")]
    pub agents_base_url: String,
}

fn default_initial_allowance() -> Amount {
    Amount::from_cents(1000)
}

fn default_agents_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            initial_allowance: default_initial_allowance(),
            agents_base_url: default_agents_base_url(),
        }
    }
}

/// [llm] 段：后端选择、超时与各环节的 token 上限
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：deepseek / openai；优先级由 API Key 与 provider 共同决定
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
    #[serde(default = "default_planner_max_tokens")]
    pub planner_max_tokens: u32,
    #[serde(default = "default_synthesis_max_tokens")]
    pub synthesis_max_tokens: u32,
    #[serde(default = "default_agent_max_tokens")]
    pub agent_max_tokens: u32,
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

fn default_planner_max_tokens() -> u32 {
    300
}

fn default_synthesis_max_tokens() -> u32 {
    700
}

fn default_agent_max_tokens() -> u32 {
    2000
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
            planner_max_tokens: default_planner_max_tokens(),
            synthesis_max_tokens: default_synthesis_max_tokens(),
            agent_max_tokens: default_agent_max_tokens(),
        }
    }
}

/// [llm.timeouts] 段（秒）
#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
    #[serde(default = "default_stream_timeout")]
    pub stream: u64,
}

fn default_request_timeout() -> u64 {
    60
}

fn default_stream_timeout() -> u64 {
    120
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
            stream: default_stream_timeout(),
        }
    }
}

/// [planner] 段
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerSection {
    /// 规划失败时的回退 Agent
    #[serde(default = "default_agent")]
    pub default_agent: String,
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,
}

fn default_agent() -> String {
    DEFAULT_AGENT_ID.to_string()
}

fn default_max_agents() -> usize {
    3
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            default_agent: default_agent(),
            max_agents: default_max_agents(),
        }
    }
}

/// [synthesis] 段
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisSection {
    /// 每份报告进入汇总上下文前的字符上限
    #[serde(default = "default_per_agent_chars")]
    pub per_agent_chars: usize,
}

fn default_per_agent_chars() -> usize {
    1800
}

impl Default for SynthesisSection {
    fn default() -> Self {
        Self {
            per_agent_chars: default_per_agent_chars(),
        }
    }
}

/// [agents] 段：单个 Agent 调用的时限（秒）
#[derive(Debug, Clone, Deserialize)]
pub struct AgentsSection {
    /// 整个调用（含全部片段）的上限
    #[serde(default = "default_agent_timeout_secs")]
    pub timeout_secs: u64,
    /// 两个片段之间的最长间隔
    #[serde(default = "default_agent_idle_secs")]
    pub idle_secs: u64,
}

fn default_agent_timeout_secs() -> u64 {
    180
}

fn default_agent_idle_secs() -> u64 {
    60
}

impl Default for AgentsSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_agent_timeout_secs(),
            idle_secs: default_agent_idle_secs(),
        }
    }
}

/// [ledger] 段：签名中继、网络名与钱包地址
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSection {
    /// 未设置时只产出模拟回执
    pub relay_url: Option<String>,
    /// 中继 Bearer Key 所在的环境变量名
    #[serde(default = "default_ledger_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,
    pub orchestrator_address: Option<String>,
    #[serde(default = "default_ledger_timeout_secs")]
    pub timeout_secs: u64,
    /// agent id -> 收款地址，覆盖内置钱包簿
    #[serde(default)]
    pub wallets: HashMap<String, String>,
}

fn default_ledger_key_env() -> String {
    "HIVE_LEDGER_KEY".to_string()
}

fn default_network() -> String {
    "Base Sepolia".to_string()
}

fn default_explorer_url() -> String {
    "https://sepolia.basescan.org".to_string()
}

fn default_ledger_timeout_secs() -> u64 {
    30
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            relay_url: None,
            api_key_env: default_ledger_key_env(),
            network: default_network(),
            explorer_url: default_explorer_url(),
            orchestrator_address: None,
            timeout_secs: default_ledger_timeout_secs(),
            wallets: HashMap::new(),
        }
    }
}

/// [search] 段：Agent 执行端点使用的搜索服务（Firecrawl 兼容）
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSection {
    pub provider_url: Option<String>,
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
    /// 每条结果摘要的最大字符数
    #[serde(default = "default_max_result_chars")]
    pub max_result_chars: usize,
}

fn default_search_key_env() -> String {
    "FIRECRAWL_API_KEY".to_string()
}

fn default_search_timeout_secs() -> u64 {
    15
}

fn default_max_result_chars() -> usize {
    400
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            provider_url: None,
            api_key_env: default_search_key_env(),
            timeout_secs: default_search_timeout_secs(),
            max_result_chars: default_max_result_chars(),
        }
    }
}

/// [web] 段
#[derive(Debug, Clone, Deserialize)]
pub struct WebSection {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    3000
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, ignoring");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 读取名字由配置给出的环境变量；空值视为未设置
pub fn env_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
