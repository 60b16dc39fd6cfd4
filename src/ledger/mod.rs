//! 结算层：账本抽象、HTTP 签名中继、Agent 钱包簿、雇佣结算适配器
//!
//! 真实结算走可配置的 Ledger（HTTP 中继），任何失败或未配置都回退为格式正确的模拟回执，
//! 编排流程永远不会因支付通道不可用而阻塞。

pub mod relay;
pub mod settlement;
pub mod wallets;

use async_trait::async_trait;

use crate::core::HiveError;
use crate::registry::Amount;

pub use relay::HttpLedger;
pub use settlement::{synthetic_tx_hash, PaymentReceipt, SettlementAdapter};
pub use wallets::{WalletBook, ZERO_ADDRESS};

/// 账本接受的一笔转账
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTransfer {
    pub tx_hash: String,
    /// 区块浏览器链接；账本未提供时由适配器按模板拼出
    pub explorer_url: Option<String>,
}

/// 价值转移账本：给定目标账户与金额，返回交易 id 或失败
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn transfer(
        &self,
        agent_id: &str,
        to_account: &str,
        amount: Amount,
    ) -> Result<LedgerTransfer, HiveError>;

    /// 编排方账户余额
    async fn balance(&self) -> Result<Amount, HiveError>;
}
