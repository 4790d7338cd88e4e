//! JSON-RPC 账本客户端（EVM 兼容链）
//!
//! 读操作走 `eth_call` / `eth_getBalance`。写操作分两步：提交后立即返回交易哈希，
//! `confirm` 再轮询 `eth_getTransactionReceipt` 直到上链。
//! 配置了私钥时在本地签名（nonce、gasPrice、gas、chainId 均从节点获取），经 `eth_sendRawTransaction` 广播；
//! 否则通过 `eth_sendTransaction` 交给端点签名。
//! 确认等待不设总超时，单次 HTTP 请求受 `request_timeout_secs` 限制。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{Mutex, OnceCell};

use crate::config::{AppConfig, AssetsSection};
use crate::ledger::signer::LegacyTx;
use crate::ledger::{
    abi, AccountSnapshot, Allowance, Amount, Asset, Confirmation, ExchangeRequest, GrantOutcome,
    LedgerClient, LedgerError, LocalSigner, TxRef,
};

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// 基于 reqwest 的 JSON-RPC 客户端
pub struct RpcLedger {
    client: Client,
    url: String,
    account: Option<String>,
    signer: Option<LocalSigner>,
    assets: AssetsSection,
    router: String,
    network: String,
    receipt_poll: Duration,
    next_id: AtomicU64,
    chain_id: OnceCell<u64>,
    /// 本地签名时串行化 nonce 获取与广播
    submit_lock: Mutex<()>,
}

impl RpcLedger {
    pub fn new(url: &str, cfg: &AppConfig) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.network.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        let signer = match cfg.account.private_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Some(LocalSigner::from_hex(key)?),
            _ => None,
        };
        let configured = cfg
            .account
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| crate::ledger::is_valid_address(a))
            .map(str::to_string);
        let account = match &signer {
            Some(signer) => {
                if let Some(addr) = &configured {
                    if !addr.eq_ignore_ascii_case(signer.address()) {
                        tracing::warn!(
                            configured = %addr,
                            derived = %signer.address(),
                            "account.address does not match private key; using the derived address"
                        );
                    }
                }
                Some(signer.address().to_string())
            }
            None => configured,
        };
        if account.is_none() {
            tracing::warn!("account.address missing or invalid; remote operations will be rejected");
        }
        Ok(Self {
            client,
            url: url.to_string(),
            account,
            signer,
            assets: cfg.assets.clone(),
            router: cfg.swap.router.trim().to_string(),
            network: cfg.network.name.clone(),
            receipt_poll: Duration::from_millis(cfg.network.receipt_poll_ms.max(100)),
            next_id: AtomicU64::new(1),
            chain_id: OnceCell::new(),
            submit_lock: Mutex::new(()),
        })
    }

    fn require_account(&self) -> Result<&str, LedgerError> {
        self.account.as_deref().ok_or(LedgerError::NotInitialized)
    }

    fn token(&self, asset: Asset) -> Result<&str, LedgerError> {
        let address = self.assets.address(asset).trim();
        if address.is_empty() {
            return Err(LedgerError::Rejected(format!("token address for {:?} not configured", asset)));
        }
        Ok(address)
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        let resp = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(format!("{}: {}", method, e)))?;
        if !resp.status().is_success() {
            return Err(LedgerError::Transport(format!("{}: HTTP {}", method, resp.status())));
        }
        let body: RpcResponse = resp
            .json()
            .await
            .map_err(|e| LedgerError::Decode(format!("{}: {}", method, e)))?;
        if let Some(err) = body.error {
            return Err(LedgerError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(body.result.unwrap_or(Value::Null))
    }

    async fn quantity(&self, method: &str, params: Value) -> Result<u128, LedgerError> {
        let value = self.call(method, params).await?;
        abi::decode_u128(&as_str(&value, method)?)
    }

    async fn eth_call(&self, to: &str, data: String) -> Result<String, LedgerError> {
        let result = self
            .call("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await?;
        as_str(&result, "eth_call")
    }

    async fn token_balance(&self, token: &str, owner: &str) -> Result<Amount, LedgerError> {
        let raw = self.eth_call(token, abi::balance_of(owner)?).await?;
        Ok(Amount::from_base_units(abi::decode_u128(&raw)?))
    }

    async fn chain_id(&self) -> Result<u64, LedgerError> {
        let id = self
            .chain_id
            .get_or_try_init(|| async {
                let id = self.quantity("eth_chainId", json!([])).await?;
                u64::try_from(id).map_err(|_| LedgerError::Decode(format!("chain id out of range: {}", id)))
            })
            .await?;
        Ok(*id)
    }

    /// 提交交易，返回交易哈希（不等待确认）
    async fn submit(&self, to: &str, data: Option<String>, value: u128) -> Result<TxRef, LedgerError> {
        let from = self.require_account()?;
        let mut tx = json!({ "from": from, "to": to, "value": abi::encode_quantity(value) });
        if let Some(data) = &data {
            tx["data"] = Value::String(data.clone());
        }

        let hash = match &self.signer {
            Some(signer) => {
                // 持锁直到广播完成，两笔交易不会拿到同一个 pending nonce
                let _guard = self.submit_lock.lock().await;
                let raw = self.sign_local(signer, tx, to, data.as_deref(), value).await?;
                self.call("eth_sendRawTransaction", json!([raw])).await?
            }
            None => self.call("eth_sendTransaction", json!([tx])).await?,
        };
        let tx_ref = TxRef(as_str(&hash, "send transaction")?);
        tracing::info!(tx = %tx_ref, "transaction submitted");
        Ok(tx_ref)
    }

    async fn sign_local(
        &self,
        signer: &LocalSigner,
        call: Value,
        to: &str,
        data: Option<&str>,
        value: u128,
    ) -> Result<String, LedgerError> {
        let chain_id = self.chain_id().await?;
        let gas_price = self.quantity("eth_gasPrice", json!([])).await?;
        let estimate = self.quantity("eth_estimateGas", json!([call])).await?;
        let to = decode_hex(to)?;
        let data = match data {
            Some(data) => decode_hex(data)?,
            None => Vec::new(),
        };
        let nonce = self
            .quantity("eth_getTransactionCount", json!([signer.address(), "pending"]))
            .await?;
        let tx = LegacyTx {
            nonce,
            gas_price,
            gas_limit: estimate.saturating_mul(6) / 5,
            to,
            value,
            data,
        };
        let raw = signer.sign_legacy(&tx, chain_id)?;
        Ok(format!("0x{}", hex::encode(raw)))
    }

    async fn wait_for_receipt(&self, tx: &TxRef) -> Result<Value, LedgerError> {
        loop {
            let receipt = self
                .call("eth_getTransactionReceipt", json!([tx.0]))
                .await?;
            if !receipt.is_null() {
                return Ok(receipt);
            }
            tokio::time::sleep(self.receipt_poll).await;
        }
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>, LedgerError> {
    hex::decode(abi::strip_0x(s.trim()))
        .map_err(|e| LedgerError::Rejected(format!("invalid hex {}: {}", s, e)))
}

fn as_str(value: &Value, method: &str) -> Result<String, LedgerError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| LedgerError::Decode(format!("{}: expected hex string, got {}", method, value)))
}

/// 回执 status 必须为 0x1
fn check_status(receipt: &Value, tx: &TxRef) -> Result<(), LedgerError> {
    match receipt.get("status").and_then(Value::as_str) {
        Some(status) if abi::decode_u128(status)? == 1 => Ok(()),
        Some(_) => Err(LedgerError::Reverted(tx.short())),
        None => Err(LedgerError::Decode(format!("receipt for {} has no status", tx.short()))),
    }
}

/// 从回执日志中找出 token 转给 recipient 的 Transfer 金额
fn transfer_amount_from_receipt(receipt: &Value, token: &str, recipient: &str) -> Option<Amount> {
    let logs = receipt.get("logs")?.as_array()?;
    logs.iter().find_map(|log| {
        let address = log.get("address")?.as_str()?;
        if !address.eq_ignore_ascii_case(token) {
            return None;
        }
        let topics = log.get("topics")?.as_array()?;
        let event = topics.first()?.as_str()?;
        let to = topics.get(2)?.as_str()?;
        if !event.eq_ignore_ascii_case(abi::TRANSFER_TOPIC) || !abi::topic_matches_address(to, recipient) {
            return None;
        }
        let data = log.get("data")?.as_str()?;
        abi::decode_u128(data).ok().map(Amount::from_base_units)
    })
}

#[async_trait]
impl LedgerClient for RpcLedger {
    fn account(&self) -> Option<String> {
        self.account.clone()
    }

    async fn grant_if_eligible(&self, asset: Asset) -> Result<GrantOutcome, LedgerError> {
        let account = self.require_account()?;
        let token = self.token(asset)?;
        let raw = self.eth_call(token, abi::is_minter(account)?).await?;
        if abi::decode_bool(&raw)? {
            return Ok(GrantOutcome::AlreadyGranted);
        }
        let tx = self.submit(token, Some(abi::mint()), 0).await?;
        Ok(GrantOutcome::Submitted(tx))
    }

    async fn authorize_spend(
        &self,
        asset: Asset,
        spender: &str,
        allowance: Allowance,
    ) -> Result<TxRef, LedgerError> {
        let token = self.token(asset)?;
        self.submit(token, Some(abi::approve(spender, allowance)?), 0)
            .await
    }

    async fn exchange(&self, request: &ExchangeRequest) -> Result<TxRef, LedgerError> {
        let token_in = self.token(request.asset_in)?;
        let token_out = self.token(request.asset_out)?;
        let data = abi::exact_input_single(
            token_in,
            token_out,
            request.fee_tier,
            &request.recipient,
            request.amount_in,
        )?;
        self.submit(&self.router, Some(data), 0).await
    }

    async fn transfer_native(&self, to: &str, amount: Amount) -> Result<TxRef, LedgerError> {
        if !crate::ledger::is_valid_address(to) {
            return Err(LedgerError::Rejected(format!("invalid address: {}", to)));
        }
        self.submit(to, None, amount.base_units()).await
    }

    async fn confirm(&self, tx: &TxRef, receive: Option<Asset>) -> Result<Confirmation, LedgerError> {
        let receipt = self.wait_for_receipt(tx).await?;
        check_status(&receipt, tx)?;
        let received = match (receive, self.account.as_deref()) {
            (Some(asset), Some(account)) => {
                let token = self.token(asset)?;
                transfer_amount_from_receipt(&receipt, token, account)
            }
            _ => None,
        };
        Ok(Confirmation {
            tx: tx.clone(),
            received,
        })
    }

    async fn refresh_snapshot(&self) -> Result<AccountSnapshot, LedgerError> {
        let account = self.require_account()?;
        let native = self
            .quantity("eth_getBalance", json!([account, "latest"]))
            .await?;
        let asset_a = match self.token(Asset::A) {
            Ok(token) => self.token_balance(token, account).await?,
            Err(_) => Amount::ZERO,
        };
        let asset_b = match self.token(Asset::B) {
            Ok(token) => self.token_balance(token, account).await?,
            Err(_) => Amount::ZERO,
        };
        Ok(AccountSnapshot {
            address: account.to_string(),
            native: Amount::from_base_units(native),
            asset_a,
            asset_b,
            network: self.network.clone(),
        })
    }
}
