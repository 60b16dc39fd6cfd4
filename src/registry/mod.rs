//! Agent 注册表
//!
//! 静态目录：id -> 显示名、图标、单价、一句话能力描述。进程启动时构建，之后只读，
//! 以 Arc 在所有编排会话间共享。目录顺序稳定，Planner 的 prompt 按此顺序列出 Agent。

pub mod amount;

use serde::Serialize;

pub use amount::{Amount, ParseAmountError};

/// 默认兜底 Agent（规划失败时只雇它一个）
pub const DEFAULT_AGENT_ID: &str = "web-research";

/// 单个 Agent 的描述（不可变）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescriptor {
    pub id: String,
    pub display_name: String,
    pub icon: String,
    pub unit_cost: Amount,
    pub capability_blurb: String,
}

impl AgentDescriptor {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        icon: impl Into<String>,
        unit_cost: Amount,
        capability_blurb: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            icon: icon.into(),
            unit_cost,
            capability_blurb: capability_blurb.into(),
        }
    }
}

/// 注册表：按目录顺序保存描述，按 id 查找
#[derive(Debug, Clone, Serialize)]
pub struct AgentRegistry {
    agents: Vec<AgentDescriptor>,
}

impl AgentRegistry {
    /// 内置六个专家 Agent
    pub fn builtin() -> Self {
        let agents = vec![
            AgentDescriptor::new(
                "web-research",
                "Web Research Agent",
                "🔍",
                Amount::from_cents(50),
                "general research, news, trends, market info",
            ),
            AgentDescriptor::new(
                "due-diligence",
                "Due Diligence Agent",
                "📊",
                Amount::from_cents(200),
                "deep company analysis, funding, founders, risks",
            ),
            AgentDescriptor::new(
                "competitor-analysis",
                "Competitor Analysis Agent",
                "⚔️",
                Amount::from_cents(150),
                "competitive landscape, who wins and why",
            ),
            AgentDescriptor::new(
                "investor-research",
                "Investor Research Agent",
                "💼",
                Amount::from_cents(100),
                "VC firm thesis, portfolio, what they fund",
            ),
            AgentDescriptor::new(
                "lead-enrichment",
                "Lead Enrichment Agent",
                "🎯",
                Amount::from_cents(25),
                "person background, outreach angles",
            ),
            AgentDescriptor::new(
                "startup-validator",
                "Startup Validator Agent",
                "🚀",
                Amount::from_cents(75),
                "startup idea feedback, market, risks",
            ),
        ];
        Self { agents }
    }

    pub fn get(&self, id: &str) -> Option<&AgentDescriptor> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentDescriptor> {
        self.agents.iter()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// 供 Planner prompt 使用的目录段落：每行 "- id: blurb"
    pub fn catalog(&self) -> String {
        self.agents
            .iter()
            .map(|a| format!("- {}: {}", a.id, a.capability_blurb))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 一组 id 的单价之和；未知 id 计 0
    pub fn total_cost<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Amount {
        ids.into_iter()
            .filter_map(|id| self.get(id))
            .map(|a| a.unit_cost)
            .sum()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog() {
        let registry = AgentRegistry::builtin();
        assert_eq!(registry.len(), 6);
        assert!(registry.contains(DEFAULT_AGENT_ID));
        let dd = registry.get("due-diligence").unwrap();
        assert_eq!(dd.unit_cost.to_string(), "2.00");
        assert_eq!(dd.display_name, "Due Diligence Agent");

        let catalog = registry.catalog();
        assert!(catalog.starts_with("- web-research: general research"));
        assert_eq!(catalog.lines().count(), 6);
    }

    #[test]
    fn test_builtin_ids_unique_and_costs_positive() {
        let registry = AgentRegistry::builtin();
        let agents: Vec<_> = registry.iter().collect();
        for (i, agent) in agents.iter().enumerate() {
            assert!(agent.unit_cost.is_positive(), "{}", agent.id);
            assert!(agents[..i].iter().all(|a| a.id != agent.id), "{}", agent.id);
        }
    }

    #[test]
    fn test_total_cost_ignores_unknown() {
        let registry = AgentRegistry::builtin();
        let total = registry.total_cost(["due-diligence", "competitor-analysis", "nope"]);
        assert_eq!(total.to_string(), "3.50");
    }
}
