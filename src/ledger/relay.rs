//! HTTP 签名中继账本
//!
//! 私钥不进入本进程：真实转账交给一个签名中继服务（测试网 USDC 转账）。
//! - POST {relay}/transfer  Bearer 鉴权，body {agentId, to, amount}，返回 {txHash, basescanUrl?}（也接受 explorerUrl）
//! - GET  {relay}/balance   返回 {address, balance}
//! 非 2xx 或响应体不合法都视为失败，由 SettlementAdapter 回退为模拟回执。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::HiveError;
use crate::ledger::{Ledger, LedgerTransfer};
use crate::registry::Amount;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransferRequest<'a> {
    agent_id: &'a str,
    to: &'a str,
    amount: Amount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferResponse {
    tx_hash: String,
    #[serde(default, alias = "basescanUrl")]
    explorer_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: Amount,
}

/// 通过 HTTP 中继提交转账的账本
pub struct HttpLedger {
    client: Client,
    relay_url: String,
    api_key: Option<String>,
}

impl HttpLedger {
    pub fn new(relay_url: impl Into<String>, api_key: Option<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            relay_url: relay_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn transfer(
        &self,
        agent_id: &str,
        to_account: &str,
        amount: Amount,
    ) -> Result<LedgerTransfer, HiveError> {
        let url = format!("{}/transfer", self.relay_url);
        let body = TransferRequest {
            agent_id,
            to: to_account,
            amount,
        };
        let resp = self
            .authorized(self.client.post(&url).json(&body))
            .send()
            .await
            .map_err(|e| HiveError::SettlementUnavailable(format!("relay request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(HiveError::SettlementUnavailable(format!(
                "relay returned HTTP {}",
                resp.status()
            )));
        }

        let parsed: TransferResponse = resp
            .json()
            .await
            .map_err(|e| HiveError::SettlementUnavailable(format!("relay body: {e}")))?;
        if parsed.tx_hash.trim().is_empty() {
            return Err(HiveError::SettlementUnavailable(
                "relay returned empty txHash".to_string(),
            ));
        }

        Ok(LedgerTransfer {
            tx_hash: parsed.tx_hash,
            explorer_url: parsed.explorer_url,
        })
    }

    async fn balance(&self) -> Result<Amount, HiveError> {
        let url = format!("{}/balance", self.relay_url);
        let resp = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| HiveError::SettlementUnavailable(format!("relay request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(HiveError::SettlementUnavailable(format!(
                "relay returned HTTP {}",
                resp.status()
            )));
        }
        let parsed: BalanceResponse = resp
            .json()
            .await
            .map_err(|e| HiveError::SettlementUnavailable(format!("relay body: {e}")))?;
        Ok(parsed.balance)
    }
}
