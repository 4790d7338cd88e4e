//! Mock 账本（离线演示与测试用，无需 RPC 端点）
//!
//! 在内存中维护余额与领取标记，交易哈希按计数器生成；兑换按固定 0.3% 手续费结算。
//! 提交时立即结算并记下结果，`confirm` 经过模拟延迟后交出该结果（回滚在此时才暴露）。

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::ledger::{
    AccountSnapshot, Allowance, Amount, Asset, Confirmation, ExchangeRequest, GrantOutcome,
    LedgerClient, LedgerError, TxRef,
};

/// 每次领取得到的代币数量
const GRANT_UNITS: u64 = 1_000;

/// 已提交交易的结算结果：转入的资产与金额，或回滚原因
type Settlement = Result<Option<(Asset, Amount)>, LedgerError>;

#[derive(Debug)]
struct Balances {
    native: u128,
    a: u128,
    b: u128,
    granted: HashSet<Asset>,
    approved: HashSet<Asset>,
    pending: HashMap<TxRef, Settlement>,
}

impl Balances {
    fn token_mut(&mut self, asset: Asset) -> &mut u128 {
        match asset {
            Asset::A => &mut self.a,
            Asset::B => &mut self.b,
        }
    }
}

/// 内存模拟账本
#[derive(Debug)]
pub struct MockLedger {
    account: String,
    network: String,
    latency: Duration,
    state: Mutex<Balances>,
    nonce: AtomicU64,
}

impl MockLedger {
    pub fn new(account: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            network: network.into(),
            latency: Duration::ZERO,
            state: Mutex::new(Balances {
                native: Amount::from_whole(1).base_units(),
                a: 0,
                b: 0,
                granted: HashSet::new(),
                approved: HashSet::new(),
                pending: HashMap::new(),
            }),
            nonce: AtomicU64::new(0),
        }
    }

    /// 模拟每笔交易的确认耗时
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn submit(&self, state: &mut Balances, settlement: Settlement) -> TxRef {
        let n = self.nonce.fetch_add(1, Ordering::Relaxed) + 1;
        let tx = TxRef(format!("0x{:064x}", n));
        state.pending.insert(tx.clone(), settlement);
        tx
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Balances> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    fn account(&self) -> Option<String> {
        Some(self.account.clone())
    }

    async fn grant_if_eligible(&self, asset: Asset) -> Result<GrantOutcome, LedgerError> {
        let mut state = self.lock();
        if !state.granted.insert(asset) {
            return Ok(GrantOutcome::AlreadyGranted);
        }
        let units = Amount::from_whole(GRANT_UNITS);
        *state.token_mut(asset) += units.base_units();
        Ok(GrantOutcome::Submitted(self.submit(&mut state, Ok(Some((asset, units))))))
    }

    async fn authorize_spend(
        &self,
        asset: Asset,
        _spender: &str,
        allowance: Allowance,
    ) -> Result<TxRef, LedgerError> {
        let mut state = self.lock();
        if allowance == Allowance::Exact(Amount::ZERO) {
            state.approved.remove(&asset);
        } else {
            state.approved.insert(asset);
        }
        Ok(self.submit(&mut state, Ok(None)))
    }

    async fn exchange(&self, request: &ExchangeRequest) -> Result<TxRef, LedgerError> {
        let mut state = self.lock();
        let amount_in = request.amount_in.base_units();
        let settlement = if !state.approved.contains(&request.asset_in) {
            Err(LedgerError::Reverted("STF: allowance not set".to_string()))
        } else if *state.token_mut(request.asset_in) < amount_in {
            Err(LedgerError::Reverted("STF: insufficient balance".to_string()))
        } else {
            *state.token_mut(request.asset_in) -= amount_in;
            let amount_out = amount_in / 1000 * 997;
            *state.token_mut(request.asset_out) += amount_out;
            Ok(Some((request.asset_out, Amount::from_base_units(amount_out))))
        };
        Ok(self.submit(&mut state, settlement))
    }

    async fn transfer_native(&self, to: &str, amount: Amount) -> Result<TxRef, LedgerError> {
        if !crate::ledger::is_valid_address(to) {
            return Err(LedgerError::Rejected(format!("invalid address: {}", to)));
        }
        let mut state = self.lock();
        if state.native < amount.base_units() {
            return Err(LedgerError::Rpc {
                code: -32000,
                message: "insufficient funds for transfer".to_string(),
            });
        }
        state.native -= amount.base_units();
        Ok(self.submit(&mut state, Ok(None)))
    }

    async fn confirm(&self, tx: &TxRef, receive: Option<Asset>) -> Result<Confirmation, LedgerError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let settlement = self
            .lock()
            .pending
            .remove(tx)
            .ok_or_else(|| LedgerError::Rejected(format!("unknown transaction {}", tx.short())))?;
        let received = settlement?
            .filter(|(asset, _)| Some(*asset) == receive)
            .map(|(_, amount)| amount);
        Ok(Confirmation {
            tx: tx.clone(),
            received,
        })
    }

    async fn refresh_snapshot(&self) -> Result<AccountSnapshot, LedgerError> {
        let state = self.lock();
        Ok(AccountSnapshot {
            address: self.account.clone(),
            native: Amount::from_base_units(state.native),
            asset_a: Amount::from_base_units(state.a),
            asset_b: Amount::from_base_units(state.b),
            network: self.network.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ME: &str = "0x00000000000000000000000000000000000000aa";
    const PEER: &str = "0x00000000000000000000000000000000000000bb";

    #[tokio::test]
    async fn test_grant_once() {
        let ledger = MockLedger::new(ME, "devnet");
        let tx = match ledger.grant_if_eligible(Asset::A).await.unwrap() {
            GrantOutcome::Submitted(tx) => tx,
            other => panic!("unexpected {:?}", other),
        };
        let confirmed = ledger.confirm(&tx, Some(Asset::A)).await.unwrap();
        assert_eq!(confirmed.received, Some(Amount::from_whole(GRANT_UNITS)));
        assert_eq!(
            ledger.grant_if_eligible(Asset::A).await.unwrap(),
            GrantOutcome::AlreadyGranted
        );
        let snap = ledger.refresh_snapshot().await.unwrap();
        assert_eq!(snap.asset_a, Amount::from_whole(GRANT_UNITS));
        assert_eq!(snap.asset_b, Amount::ZERO);
    }

    #[tokio::test]
    async fn test_exchange_without_approval_reverts_on_confirm() {
        let ledger = MockLedger::new(ME, "devnet");
        ledger.grant_if_eligible(Asset::A).await.unwrap();
        let req = ExchangeRequest {
            asset_in: Asset::A,
            asset_out: Asset::B,
            amount_in: Amount::from_whole(100),
            fee_tier: 500,
            recipient: ME.to_string(),
        };
        let tx = ledger.exchange(&req).await.unwrap();
        assert!(matches!(ledger.confirm(&tx, Some(Asset::B)).await, Err(LedgerError::Reverted(_))));

        ledger
            .authorize_spend(Asset::A, PEER, Allowance::Unlimited)
            .await
            .unwrap();
        let tx = ledger.exchange(&req).await.unwrap();
        let confirmed = ledger.confirm(&tx, Some(Asset::B)).await.unwrap();
        assert_eq!(
            confirmed.received,
            Some(Amount::from_base_units(Amount::from_whole(100).0 / 1000 * 997))
        );
    }

    #[tokio::test]
    async fn test_transfer_checks_funds_and_address() {
        let ledger = MockLedger::new(ME, "devnet");
        assert!(ledger.transfer_native("nope", Amount::from_whole(0)).await.is_err());
        let tx = ledger.transfer_native(PEER, Amount::parse("0.5").unwrap()).await.unwrap();
        assert_eq!(ledger.confirm(&tx, None).await.unwrap().received, None);
        assert!(matches!(
            ledger.transfer_native(PEER, Amount::from_whole(1)).await,
            Err(LedgerError::Rpc { .. })
        ));
        let snap = ledger.refresh_snapshot().await.unwrap();
        assert_eq!(snap.native, Amount::parse("0.5").unwrap());
    }

    #[tokio::test]
    async fn test_confirm_unknown_or_twice_is_rejected() {
        let ledger = MockLedger::new(ME, "devnet");
        let tx = ledger.authorize_spend(Asset::A, PEER, Allowance::Unlimited).await.unwrap();
        assert!(ledger.confirm(&tx, None).await.is_ok());
        assert!(matches!(ledger.confirm(&tx, None).await, Err(LedgerError::Rejected(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_delays_confirmation() {
        let ledger = MockLedger::new(ME, "devnet").with_latency(Duration::from_secs(3));
        let tx = ledger.authorize_spend(Asset::B, PEER, Allowance::Unlimited).await.unwrap();
        let started = tokio::time::Instant::now();
        ledger.confirm(&tx, None).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_tx_hashes_are_unique() {
        let ledger = MockLedger::new(ME, "devnet");
        let a = ledger.authorize_spend(Asset::A, PEER, Allowance::Unlimited).await.unwrap();
        let b = ledger.authorize_spend(Asset::B, PEER, Allowance::Unlimited).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(a.0.len(), 66);
    }
}
