//! Planner：为任务挑选 1–3 个 Agent
//!
//! 推理服务的输出视为不可信文本：取第一个方括号子串，必须是字符串数组，
//! 再按注册表过滤（未知 id 丢弃、去重、截断到上限）。任何一步不满足都确定性地回退到默认 Agent，
//! 推理服务本身出错或超时也一样。plan() 永不失败。

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde::Serialize;

use crate::core::HiveError;
use crate::llm::{LlmClient, Message};
use crate::registry::{AgentRegistry, Amount};

/// 规划结果中最多的 Agent 数
pub const MAX_PLANNED_AGENTS: usize = 3;

/// 有序的 Agent id 列表，长度 1..=max，每个 id 都在注册表中
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanDecision {
    agents: Vec<String>,
    /// 是否经过回退（仅用于日志与测试，不对外报错）
    #[serde(skip)]
    degraded: bool,
}

impl PlanDecision {
    pub fn agents(&self) -> &[String] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// 预先计算的总价（所有计划 Agent 单价之和）
    pub fn total_cost(&self, registry: &AgentRegistry) -> Amount {
        registry.total_cost(self.agents.iter().map(String::as_str))
    }

    fn fallback(default_agent: &str) -> Self {
        Self {
            agents: vec![default_agent.to_string()],
            degraded: true,
        }
    }
}

static PLAN_ARRAY_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// 从自由文本中取出第一个方括号数组并解析为字符串列表
pub fn parse_plan(output: &str) -> Result<Vec<String>, HiveError> {
    let re = PLAN_ARRAY_RE
        .get_or_init(|| Regex::new(r"(?s)\[.*?\]").ok())
        .as_ref()
        .ok_or_else(|| HiveError::PlanningDegraded("plan extraction regex unavailable".to_string()))?;
    let found = re
        .find(output)
        .ok_or_else(|| HiveError::PlanningDegraded("no bracketed array in output".to_string()))?;
    serde_json::from_str::<Vec<String>>(found.as_str())
        .map_err(|e| HiveError::PlanningDegraded(format!("{}: {}", e, found.as_str())))
}

/// 按注册表过滤：丢弃未知 id（精确匹配，不做 trim）、去重（保留首次出现）、截断到 max
pub fn sanitize_plan(raw: Vec<String>, registry: &AgentRegistry, max: usize) -> Vec<String> {
    let mut agents: Vec<String> = Vec::with_capacity(max);
    for id in raw {
        if agents.len() >= max {
            break;
        }
        if registry.contains(&id) && !agents.contains(&id) {
            agents.push(id);
        }
    }
    agents
}

/// Planner：持有推理服务、注册表与回退配置
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    registry: Arc<AgentRegistry>,
    default_agent: String,
    max_agents: usize,
    max_tokens: u32,
    timeout: Duration,
}

impl Planner {
    /// default_agent 必须存在于注册表；max_agents 被钳制到 1..=3
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<AgentRegistry>,
        default_agent: impl Into<String>,
    ) -> Result<Self, HiveError> {
        let default_agent = default_agent.into();
        if !registry.contains(&default_agent) {
            return Err(HiveError::Config(format!(
                "default agent '{}' is not in the registry",
                default_agent
            )));
        }
        Ok(Self {
            llm,
            registry,
            default_agent,
            max_agents: MAX_PLANNED_AGENTS,
            max_tokens: 300,
            timeout: Duration::from_secs(60),
        })
    }

    pub fn with_max_agents(mut self, max_agents: usize) -> Self {
        self.max_agents = max_agents.clamp(1, MAX_PLANNED_AGENTS);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn default_agent(&self) -> &str {
        &self.default_agent
    }

    pub fn prompt(&self, task: &str) -> String {
        format!(
            r#"You are an AI orchestrator deciding which specialist agents to hire for a task.

Task: "{task}"

Available agents:
{catalog}

Pick 2-3 agents most relevant to this task. Order matters — foundational research first.
Return ONLY a JSON array. Example: ["web-research", "due-diligence"]"#,
            task = task,
            catalog = self.registry.catalog(),
        )
    }

    /// 规划；任何失败都回退到默认 Agent
    pub async fn plan(&self, task: &str) -> PlanDecision {
        match self.try_plan(task).await {
            Ok(agents) => {
                tracing::info!(agents = ?agents, "plan ready");
                PlanDecision {
                    agents,
                    degraded: false,
                }
            }
            Err(e) => {
                tracing::warn!(default_agent = %self.default_agent, "{}", e);
                PlanDecision::fallback(&self.default_agent)
            }
        }
    }

    async fn try_plan(&self, task: &str) -> Result<Vec<String>, HiveError> {
        let messages = vec![Message::user(self.prompt(task))];
        let output = tokio::time::timeout(self.timeout, self.llm.complete(&messages, self.max_tokens))
            .await
            .map_err(|_| {
                HiveError::PlanningDegraded(format!(
                    "reasoning service timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| HiveError::PlanningDegraded(format!("reasoning service: {e}")))?;

        let raw = parse_plan(&output)?;
        let agents = sanitize_plan(raw, &self.registry, self.max_agents);
        if agents.is_empty() {
            return Err(HiveError::PlanningDegraded(
                "no registry-valid agent ids in plan".to_string(),
            ));
        }
        Ok(agents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, Script, ScriptedLlmClient, TextStream};
    use crate::registry::DEFAULT_AGENT_ID;

    fn planner(scripts: Vec<Script>) -> Planner {
        Planner::new(
            Arc::new(ScriptedLlmClient::new(scripts)),
            Arc::new(AgentRegistry::builtin()),
            DEFAULT_AGENT_ID,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_plan_from_free_text() {
        let out = "Sure! Here you go:\n```json\n[\"due-diligence\",\n \"competitor-analysis\"]\n```";
        assert_eq!(
            parse_plan(out).unwrap(),
            vec!["due-diligence".to_string(), "competitor-analysis".to_string()]
        );
    }

    #[test]
    fn test_parse_plan_takes_first_array_only() {
        let out = r#"["web-research"] and also ["due-diligence"]"#;
        assert_eq!(parse_plan(out).unwrap(), vec!["web-research".to_string()]);
    }

    #[test]
    fn test_parse_plan_rejects_non_string_arrays() {
        assert!(matches!(parse_plan("[1, 2]"), Err(HiveError::PlanningDegraded(_))));
        assert!(matches!(parse_plan("no array here"), Err(HiveError::PlanningDegraded(_))));
        assert!(matches!(parse_plan("[web-research]"), Err(HiveError::PlanningDegraded(_))));
    }

    #[test]
    fn test_sanitize_drops_unknown_dedups_and_truncates() {
        let registry = AgentRegistry::builtin();
        let raw = vec![
            "ghost".to_string(),
            "due-diligence".to_string(),
            "due-diligence".to_string(),
            "web-research".to_string(),
            "lead-enrichment".to_string(),
            "startup-validator".to_string(),
        ];
        assert_eq!(
            sanitize_plan(raw, &registry, 3),
            vec!["due-diligence", "web-research", "lead-enrichment"]
        );
    }

    #[test]
    fn test_sanitize_requires_exact_ids() {
        let registry = AgentRegistry::builtin();
        let raw = vec![" due-diligence ".to_string(), "Web-Research".to_string()];
        assert!(sanitize_plan(raw, &registry, 3).is_empty());
    }

    /// complete 永不返回的推理服务
    struct HangingLlm;

    #[async_trait::async_trait]
    impl LlmClient for HangingLlm {
        async fn complete(&self, _messages: &[Message], _max_tokens: u32) -> Result<String, LlmError> {
            std::future::pending().await
        }

        async fn complete_stream(
            &self,
            _messages: &[Message],
            _max_tokens: u32,
        ) -> Result<TextStream, LlmError> {
            std::future::pending().await
        }

        fn model_name(&self) -> &str {
            "hanging"
        }
    }

    #[tokio::test]
    async fn test_plan_falls_back_when_service_hangs() {
        let p = Planner::new(
            Arc::new(HangingLlm),
            Arc::new(AgentRegistry::builtin()),
            DEFAULT_AGENT_ID,
        )
        .unwrap()
        .with_timeout(Duration::from_millis(50));
        let decision = p.plan("Perplexity AI").await;
        assert_eq!(decision.agents(), [DEFAULT_AGENT_ID]);
        assert!(decision.is_degraded());
    }

    #[tokio::test]
    async fn test_plan_keeps_model_order() {
        let p = planner(vec![Script::Reply(
            r#"["due-diligence", "competitor-analysis"]"#.into(),
        )]);
        let decision = p.plan("Perplexity AI").await;
        assert_eq!(decision.agents(), ["due-diligence", "competitor-analysis"]);
        assert!(!decision.is_degraded());
        assert_eq!(decision.total_cost(&AgentRegistry::builtin()).to_string(), "3.50");
    }

    #[tokio::test]
    async fn test_plan_falls_back_on_garbage_empty_and_unknown() {
        for reply in ["I cannot decide", "[]", r#"["ghost", "phantom"]"#, ""] {
            let p = planner(vec![Script::Reply(reply.into())]);
            let decision = p.plan("wefjk2309").await;
            assert_eq!(decision.agents(), [DEFAULT_AGENT_ID], "reply: {reply:?}");
            assert!(decision.is_degraded());
        }
    }

    #[tokio::test]
    async fn test_plan_falls_back_when_service_fails() {
        let p = planner(vec![Script::Fail("503".into())]);
        let decision = p.plan("anything").await;
        assert_eq!(decision.len(), 1);
        assert_eq!(decision.agents()[0], DEFAULT_AGENT_ID);
    }

    #[test]
    fn test_unknown_default_agent_is_config_error() {
        let err = Planner::new(
            Arc::new(ScriptedLlmClient::default()),
            Arc::new(AgentRegistry::builtin()),
            "nobody",
        )
        .err()
        .unwrap();
        assert!(matches!(err, HiveError::Config(_)));
    }

    #[test]
    fn test_prompt_lists_catalog() {
        let p = planner(vec![]);
        let prompt = p.prompt("Research Cursor");
        assert!(prompt.contains("Task: \"Research Cursor\""));
        assert!(prompt.contains("- startup-validator: startup idea feedback"));
        assert!(prompt.contains("Return ONLY a JSON array"));
    }
}
