//! 编排器：Claim / Swap-Cycle / Send-Batch
//!
//! 每个编排器是一个普通的 async 函数，接收共享的 `TaskContext` 与本次运行的取消令牌，
//! 返回 `RunOutcome`。忙碌闸门由调用方（Controller）持有，编排器只负责步骤本身。

pub mod claim;
pub mod send;
pub mod swap;

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::AppConfig;
use crate::core::log_sink::LogSink;
use crate::ledger::{AccountSnapshot, Asset, LedgerClient};
use crate::recipients::RecipientSource;

pub use claim::run_claim;
pub use send::{run_send_chosen, run_send_random};
pub use swap::{run_swap_cycle, SwapDirection};

/// 编排器共享的依赖
pub struct TaskContext {
    pub ledger: Arc<dyn LedgerClient>,
    pub log: LogSink,
    pub config: Arc<AppConfig>,
    pub recipients: Arc<dyn RecipientSource>,
    snapshot: watch::Sender<AccountSnapshot>,
}

impl TaskContext {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        log: LogSink,
        config: Arc<AppConfig>,
        recipients: Arc<dyn RecipientSource>,
    ) -> Self {
        let initial = AccountSnapshot {
            address: ledger.account().unwrap_or_default(),
            ..AccountSnapshot::empty(config.network.name.clone())
        };
        let (snapshot, _) = watch::channel(initial);
        Self {
            ledger,
            log,
            config,
            recipients,
            snapshot,
        }
    }

    pub fn symbol(&self, asset: Asset) -> &str {
        self.config.assets.symbol(asset)
    }

    pub fn native_symbol(&self) -> &str {
        &self.config.assets.native_symbol
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<AccountSnapshot> {
        self.snapshot.subscribe()
    }

    /// 刷新余额快照；失败只记录日志
    pub async fn refresh(&self) {
        match self.ledger.refresh_snapshot().await {
            Ok(snapshot) => {
                self.snapshot.send_replace(snapshot);
                self.log.append("Balance & Wallet Updated!!");
            }
            Err(e) => {
                tracing::warn!("snapshot refresh failed: {}", e);
                self.log.append(format!("Failed to fetch wallet data: {}", e));
            }
        }
    }
}
