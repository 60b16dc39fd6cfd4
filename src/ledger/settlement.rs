//! 雇佣结算适配器
//!
//! hire(agent, amount)：配置了账本时提交真实转账（isRealSettlement = true）；
//! 账本缺失、出错或超时都无条件回退为模拟回执（0x + 64 位十六进制，非链上），绝不中断编排。
//! 回执交给调用方记录并扣减余额；confirmed 初始为 false，由会话在消费端收到 hiring 事件后置为 true。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::Serialize;

use crate::core::HiveError;
use crate::ledger::{Ledger, LedgerTransfer, WalletBook};
use crate::registry::{AgentDescriptor, Amount};

/// 一次雇佣的支付回执
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub agent_id: String,
    pub from_account: String,
    pub to_account: String,
    pub amount: Amount,
    pub transaction_reference: String,
    pub explorer_url: String,
    /// 账本名（如 "Base Sepolia"）
    pub ledger_label: String,
    pub confirmed: bool,
    pub is_real_settlement: bool,
    pub created_at: DateTime<Utc>,
}

/// 模拟交易 id：0x + 32 个随机字节的小写十六进制
pub fn synthetic_tx_hash() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("0x{}", hex::encode(bytes))
}

/// 结算适配器：可选账本 + 钱包簿 + 浏览器链接模板
pub struct SettlementAdapter {
    ledger: Option<Arc<dyn Ledger>>,
    wallets: Arc<WalletBook>,
    network: String,
    explorer_url: String,
    timeout: Duration,
}

impl SettlementAdapter {
    pub fn new(
        ledger: Option<Arc<dyn Ledger>>,
        wallets: Arc<WalletBook>,
        network: impl Into<String>,
        explorer_url: impl Into<String>,
    ) -> Self {
        Self {
            ledger,
            wallets,
            network: network.into(),
            explorer_url: explorer_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// 无账本：只产出模拟回执
    pub fn simulated() -> Self {
        Self::new(
            None,
            Arc::new(WalletBook::builtin()),
            "Base Sepolia",
            "https://sepolia.basescan.org",
        )
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn ledger(&self) -> Option<&Arc<dyn Ledger>> {
        self.ledger.as_ref()
    }

    pub fn wallets(&self) -> &WalletBook {
        &self.wallets
    }

    fn explorer_link(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url, tx_hash)
    }

    /// 雇佣付款；永不失败
    pub async fn hire(&self, agent: &AgentDescriptor, amount: Amount) -> PaymentReceipt {
        debug_assert!(amount.is_positive(), "hire amount must be positive");
        let to_account = self.wallets.agent_or_zero(&agent.id).to_string();

        let settled = match &self.ledger {
            Some(ledger) => match self.try_transfer(ledger.as_ref(), &agent.id, &to_account, amount).await {
                Ok(transfer) => Some(transfer),
                Err(e) => {
                    tracing::warn!(agent_id = %agent.id, "{}, falling back to simulated receipt", e);
                    None
                }
            },
            None => None,
        };

        let (tx_hash, explorer_url, real) = match settled {
            Some(LedgerTransfer { tx_hash, explorer_url }) => {
                let url = explorer_url.unwrap_or_else(|| self.explorer_link(&tx_hash));
                (tx_hash, url, true)
            }
            None => {
                let tx_hash = synthetic_tx_hash();
                let url = self.explorer_link(&tx_hash);
                (tx_hash, url, false)
            }
        };

        tracing::info!(
            agent_id = %agent.id,
            cost = %amount,
            real = real,
            tx = %tx_hash,
            "agent hired"
        );

        PaymentReceipt {
            agent_id: agent.id.clone(),
            from_account: self.wallets.orchestrator().to_string(),
            to_account,
            amount,
            transaction_reference: tx_hash,
            explorer_url,
            ledger_label: self.network.clone(),
            confirmed: false,
            is_real_settlement: real,
            created_at: Utc::now(),
        }
    }

    async fn try_transfer(
        &self,
        ledger: &dyn Ledger,
        agent_id: &str,
        to_account: &str,
        amount: Amount,
    ) -> Result<LedgerTransfer, HiveError> {
        if self.wallets.agent(agent_id).is_none() {
            return Err(HiveError::SettlementUnavailable(format!(
                "no wallet for agent: {agent_id}"
            )));
        }
        tokio::time::timeout(self.timeout, ledger.transfer(agent_id, to_account, amount))
            .await
            .map_err(|_| {
                HiveError::SettlementUnavailable(format!(
                    "ledger timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
    }
}
