//! 从配置组装编排器：LLM 后端、注册表、Planner、结算适配器、Invoker、Synthesizer
//!
//! CLI 与 hive-web 共用同一套组装逻辑。

use std::sync::Arc;
use std::time::Duration;

use crate::config::{env_key, AppConfig};
use crate::core::{HiveError, Orchestrator};
use crate::invoker::HttpCapabilityInvoker;
use crate::ledger::{HttpLedger, Ledger, SettlementAdapter, WalletBook};
use crate::llm::{create_deepseek_client, LlmClient, MockLlmClient, OpenAiClient};
use crate::planner::Planner;
use crate::registry::AgentRegistry;
use crate::synthesis::Synthesizer;

/// 根据配置与环境变量选择 LLM 后端（DeepSeek / OpenAI 兼容 / Mock）
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let deepseek_key = env_key("DEEPSEEK_API_KEY");
    let openai_key = env_key("OPENAI_API_KEY");
    // 有 DeepSeek Key，或配置为 deepseek 且仅有 OpenAI Key 时也走 DeepSeek 兼容端点
    let use_deepseek = deepseek_key.is_some() || (provider == "deepseek" && openai_key.is_some());
    let use_openai = openai_key.is_some() && provider != "deepseek";

    if use_deepseek {
        tracing::info!("Using DeepSeek LLM ({})", cfg.llm.model);
        Arc::new(create_deepseek_client(Some(&cfg.llm.model)))
    } else if use_openai {
        tracing::info!("Using OpenAI LLM ({})", cfg.llm.model);
        Arc::new(OpenAiClient::new(
            cfg.llm.base_url.as_deref(),
            &cfg.llm.model,
            openai_key.as_deref(),
        ))
    } else {
        tracing::warn!("No API key set or provider unknown, using Mock LLM");
        Arc::new(MockLlmClient)
    }
}

/// 配置了 relay_url 时返回 HTTP 中继账本
pub fn create_ledger_from_config(cfg: &AppConfig) -> Option<Arc<dyn Ledger>> {
    let relay = cfg.ledger.relay_url.as_deref()?.trim();
    if relay.is_empty() {
        return None;
    }
    let key = env_key(&cfg.ledger.api_key_env);
    if key.is_none() {
        tracing::warn!(env = %cfg.ledger.api_key_env, "ledger relay configured without a key");
    }
    Some(Arc::new(HttpLedger::new(relay, key, cfg.ledger.timeout_secs)))
}

pub fn create_settlement_from_config(cfg: &AppConfig) -> SettlementAdapter {
    let mut wallets = WalletBook::builtin().with_overrides(&cfg.ledger.wallets);
    if let Some(address) = &cfg.ledger.orchestrator_address {
        wallets.set_orchestrator(address.clone());
    }
    let ledger = create_ledger_from_config(cfg);
    if ledger.is_none() {
        tracing::info!("No ledger relay configured, hiring with simulated receipts");
    }
    SettlementAdapter::new(
        ledger,
        Arc::new(wallets),
        cfg.ledger.network.clone(),
        cfg.ledger.explorer_url.clone(),
    )
    .with_timeout(Duration::from_secs(cfg.ledger.timeout_secs))
}

/// 用给定的 LLM 组装编排器（测试可注入 ScriptedLlmClient）
pub fn build_orchestrator_with_llm(
    cfg: &AppConfig,
    llm: Arc<dyn LlmClient>,
) -> Result<Orchestrator, HiveError> {
    if !cfg.app.initial_allowance.is_positive() {
        return Err(HiveError::Config(format!(
            "initial_allowance must be positive, got {}",
            cfg.app.initial_allowance
        )));
    }
    let registry = Arc::new(AgentRegistry::builtin());
    let request_timeout = Duration::from_secs(cfg.llm.timeouts.request);

    let planner = Planner::new(llm.clone(), registry.clone(), cfg.planner.default_agent.clone())?
        .with_max_agents(cfg.planner.max_agents)
        .with_max_tokens(cfg.llm.planner_max_tokens)
        .with_timeout(request_timeout);

    let synthesizer = Synthesizer::new(llm)
        .with_per_agent_chars(cfg.synthesis.per_agent_chars)
        .with_max_tokens(cfg.llm.synthesis_max_tokens)
        .with_timeouts(request_timeout, Duration::from_secs(cfg.llm.timeouts.stream));

    let invoker = HttpCapabilityInvoker::new(
        cfg.app.agents_base_url.clone(),
        Duration::from_secs(cfg.agents.idle_secs),
    );

    Ok(Orchestrator::new(
        registry,
        planner,
        create_settlement_from_config(cfg),
        Arc::new(invoker),
        synthesizer,
    )
    .with_initial_allowance(cfg.app.initial_allowance)
    .with_agent_timeout(Duration::from_secs(cfg.agents.timeout_secs)))
}

pub fn build_orchestrator(cfg: &AppConfig) -> Result<Orchestrator, HiveError> {
    build_orchestrator_with_llm(cfg, create_llm_from_config(cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Amount;

    #[test]
    fn test_unknown_default_agent_is_config_error() {
        let mut cfg = AppConfig::default();
        cfg.planner.default_agent = "nope".into();
        let err = build_orchestrator_with_llm(&cfg, Arc::new(MockLlmClient)).err();
        assert!(matches!(err, Some(HiveError::Config(_))));
    }

    #[test]
    fn test_non_positive_allowance_rejected() {
        let mut cfg = AppConfig::default();
        cfg.app.initial_allowance = Amount::ZERO;
        assert!(build_orchestrator_with_llm(&cfg, Arc::new(MockLlmClient)).is_err());
    }

    #[test]
    fn test_no_relay_means_simulated_settlement() {
        let cfg = AppConfig::default();
        assert!(create_ledger_from_config(&cfg).is_none());
        let adapter = create_settlement_from_config(&cfg);
        assert!(adapter.ledger().is_none());
        assert_eq!(adapter.network(), "Base Sepolia");
    }

    #[tokio::test]
    async fn test_build_with_mock_llm() {
        let orch = build_orchestrator_with_llm(&AppConfig::default(), Arc::new(MockLlmClient)).unwrap();
        assert_eq!(orch.registry().len(), 6);
    }
}
