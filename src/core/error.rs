//! 任务错误类型
//!
//! 所有错误都在编排器边界被捕获并写入交易日志，不会向上传播导致进程退出。
//! 取消不是错误，由 `RunOutcome::Cancelled` 表示。

use thiserror::Error;

use crate::core::state::TaskFamily;
use crate::ledger::LedgerError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// 未初始化、地址列表为空、用户输入不合法等；不会发起任何远程调用
    #[error("{0}")]
    PreconditionFailed(String),

    /// 同一任务族（或与之互斥的任务族）正在运行
    #[error("{} transaction is currently running", .0.label())]
    AlreadyInFlight(TaskFamily),

    #[error("remote call failed: {0}")]
    RemoteCallFailed(#[from] LedgerError),
}

/// 一次运行的终态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
    /// 整个运行因错误中止；对应的日志行已写入
    Aborted(TaskError),
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}
