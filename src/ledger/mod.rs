//! 账本层：远程操作门面与实现（JSON-RPC / Mock）
//!
//! 编排器只依赖 `LedgerClient`。写操作分两步：提交返回交易哈希，`confirm` 等待上链确认。
//! 调用方在两步之间记录 "TX sent"，确认可能要等很久且不设总超时。

pub mod abi;
pub mod mock;
pub mod rpc;
pub mod signer;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use mock::MockLedger;
pub use rpc::RpcLedger;
pub use signer::LocalSigner;
pub use types::{
    is_valid_address, short_hex, AccountSnapshot, Allowance, Amount, AmountError, Asset,
    Confirmation, ExchangeRequest, GrantOutcome, TxRef, DECIMALS,
};

/// 远程调用错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("account not initialized")]
    NotInitialized,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("rejected: {0}")]
    Rejected(String),
}

/// 远程操作门面：领取、授权、兑换、转账、确认、刷新余额
///
/// 写操作只负责签名与提交，返回交易哈希；`confirm` 等待回执并检查状态。
/// 同一账户上的提交由实现方串行化（nonce 顺序）。
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// 当前账户地址；None 表示未初始化
    fn account(&self) -> Option<String>;

    /// 先查询是否已领取，未领取则提交 mint。两次往返之间存在竞态，竞态在确认时以 Err 呈现
    async fn grant_if_eligible(&self, asset: Asset) -> Result<GrantOutcome, LedgerError>;

    async fn authorize_spend(
        &self,
        asset: Asset,
        spender: &str,
        allowance: Allowance,
    ) -> Result<TxRef, LedgerError>;

    async fn exchange(&self, request: &ExchangeRequest) -> Result<TxRef, LedgerError>;

    async fn transfer_native(&self, to: &str, amount: Amount) -> Result<TxRef, LedgerError>;

    /// 等待交易确认；回滚返回 Reverted。`receive` 指定时解析该资产转入本账户的金额
    async fn confirm(&self, tx: &TxRef, receive: Option<Asset>) -> Result<Confirmation, LedgerError>;

    /// 重新读取余额；失败不应中断调用方
    async fn refresh_snapshot(&self) -> Result<AccountSnapshot, LedgerError>;
}
