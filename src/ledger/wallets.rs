//! Agent 钱包簿：每个 Agent 的收款账户与编排方付款账户
//!
//! 进程级只读，跨会话共享。配置中的 [ledger.wallets] 覆盖内置地址。

use std::collections::HashMap;

/// 未登记钱包的 Agent 在回执中使用零地址
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// 编排方默认付款地址（Base Sepolia 测试网）
pub const ORCHESTRATOR_ADDRESS: &str = "0x692705060b0E53348D6AE675E14093c7b4C76ca7";

#[derive(Debug, Clone)]
pub struct WalletBook {
    orchestrator: String,
    agents: HashMap<String, String>,
}

impl WalletBook {
    pub fn new(orchestrator: impl Into<String>) -> Self {
        Self {
            orchestrator: orchestrator.into(),
            agents: HashMap::new(),
        }
    }

    /// 内置测试网地址
    pub fn builtin() -> Self {
        let mut book = Self::new(ORCHESTRATOR_ADDRESS);
        for (id, address) in [
            ("web-research", "0xA66b832785E83992C03c463c98cE6CE41b38824B"),
            ("due-diligence", "0xbD9A63cECF233b758Db7E41e7E4795aC8E6FB22f"),
            ("competitor-analysis", "0xF8740753e7a8F89FaCf7B9C7ef9c596687e8aD53"),
            ("investor-research", "0x66620fB16E7DC40dda2b4deEBdf6c53b637dBA54"),
            ("lead-enrichment", "0xFa8aC89f935040aa7f5cCD1D9622bA0B7Ab429e9"),
            ("startup-validator", "0x02eDEb2b4316DD788A3BFd40c806Fe5A5d2e7617"),
            ("roast-startup", "0xbCfc95235B3b812b3C81C8bdE9Cee4aa53830230"),
        ] {
            book.insert(id, address);
        }
        book
    }

    pub fn insert(&mut self, agent_id: impl Into<String>, address: impl Into<String>) {
        self.agents.insert(agent_id.into(), address.into());
    }

    pub fn with_overrides<'a>(
        mut self,
        overrides: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Self {
        for (id, address) in overrides {
            self.insert(id.clone(), address.clone());
        }
        self
    }

    pub fn set_orchestrator(&mut self, address: impl Into<String>) {
        self.orchestrator = address.into();
    }

    pub fn orchestrator(&self) -> &str {
        &self.orchestrator
    }

    pub fn agent(&self, agent_id: &str) -> Option<&str> {
        self.agents.get(agent_id).map(String::as_str)
    }

    /// 收款地址；未登记时为零地址
    pub fn agent_or_zero(&self, agent_id: &str) -> &str {
        self.agent(agent_id).unwrap_or(ZERO_ADDRESS)
    }
}

impl Default for WalletBook {
    fn default() -> Self {
        Self::builtin()
    }
}
