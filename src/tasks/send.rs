//! 原生币发送：随机地址批量发送 / 指定地址单次发送
//!
//! 与兑换循环不同，批量发送中任何一次转账失败都会中止整个运行。

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::core::delay;
use crate::core::error::{RunOutcome, TaskError};
use crate::ledger::{Amount, LedgerError, TxRef};
use crate::tasks::TaskContext;

/// 从地址列表中有放回地随机抽取 `count` 次，每次发送 `amount`
///
/// 地址列表由调用方在启动前加载并校验非空。
pub async fn run_send_random(
    ctx: &TaskContext,
    cancel: &CancellationToken,
    recipients: Vec<String>,
    count: u32,
    amount: Amount,
) -> RunOutcome {
    if ctx.ledger.account().is_none() {
        let reason = "Wallet not initialized.".to_string();
        ctx.log.append(format!("Error in Auto Send Token: {}", reason));
        return RunOutcome::Aborted(TaskError::PreconditionFailed(reason));
    }
    if recipients.is_empty() {
        ctx.log.append("Address list is empty.");
        return RunOutcome::Aborted(TaskError::PreconditionFailed("Address list is empty.".to_string()));
    }

    let native = ctx.native_symbol().to_string();
    ctx.log.append(format!(
        "Starting Auto Send Token to random addresses for {} times.",
        count
    ));

    for n in 1..=count {
        if cancel.is_cancelled() {
            ctx.log.append("Auto Send Token cancelled.");
            return RunOutcome::Cancelled;
        }
        let target = recipients[rand::thread_rng().gen_range(0..recipients.len())].clone();
        ctx.log.append(format!("Auto Send: Sending {} {} to {}", amount, native, target));
        let label = format!("Auto Send {}/{}", n, count);
        if let Err(e) = transfer(ctx, &target, amount, |tx| format!("{} TX sent: {}", label, tx.short())).await {
            ctx.log.append(format!("Error in Auto Send Token: {}", e));
            return RunOutcome::Aborted(e.into());
        }
        ctx.log.append(format!("{} successful to {}.", label, target));
        ctx.refresh().await;

        if n < count {
            let pause = delay::jitter(ctx.config.send.delay());
            ctx.log.append(format!(
                "Waiting {} seconds before the next send...",
                pause.as_secs_f64()
            ));
            delay::wait(pause, cancel).await;
        }
    }

    ctx.log.append("Auto Send Token completed.");
    RunOutcome::Completed
}

/// 单次发送到指定地址
pub async fn run_send_chosen(
    ctx: &TaskContext,
    _cancel: &CancellationToken,
    target: &str,
    amount: Amount,
) -> RunOutcome {
    if ctx.ledger.account().is_none() {
        let reason = "Wallet not initialized.".to_string();
        ctx.log.append(format!("Error in Send Token: {}", reason));
        return RunOutcome::Aborted(TaskError::PreconditionFailed(reason));
    }

    let native = ctx.native_symbol();
    ctx.log.append(format!("Sending {} {} to address {}", amount, native, target));
    match transfer(ctx, target, amount, |tx| format!("Transaction sent. Tx Hash: {}", tx.short())).await {
        Ok(_) => {
            ctx.log.append(format!("Token sent to {} successfully.", target));
            ctx.refresh().await;
            RunOutcome::Completed
        }
        Err(e) => {
            ctx.log.append(format!("Error in Send Token: {}", e));
            RunOutcome::Aborted(e.into())
        }
    }
}

/// 提交转账并等待确认；提交成功后立即记录 `sent` 生成的日志行
async fn transfer(
    ctx: &TaskContext,
    target: &str,
    amount: Amount,
    sent: impl FnOnce(&TxRef) -> String,
) -> Result<TxRef, LedgerError> {
    let tx = ctx.ledger.transfer_native(target, amount).await?;
    ctx.log.append(sent(&tx));
    ctx.ledger.confirm(&tx, None).await?;
    Ok(tx)
}
