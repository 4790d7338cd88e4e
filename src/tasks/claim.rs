//! 水龙头领取：单次尝试，不重试

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::delay;
use crate::core::error::{RunOutcome, TaskError};
use crate::ledger::{Asset, GrantOutcome};
use crate::tasks::TaskContext;

/// 领取一次：已领取则直接结束；成功后等待结算间隔再刷新余额
pub async fn run_claim(ctx: &TaskContext, cancel: &CancellationToken, asset: Asset) -> RunOutcome {
    let symbol = ctx.symbol(asset).to_string();

    if cancel.is_cancelled() {
        ctx.log.append(format!("Claim Faucet {} cancelled.", symbol));
        return RunOutcome::Cancelled;
    }

    if ctx.ledger.account().is_none() {
        let reason = "Wallet not initialized.".to_string();
        ctx.log.append(format!("Claim Faucet {} failed: {}", symbol, reason));
        return RunOutcome::Aborted(TaskError::PreconditionFailed(reason));
    }

    ctx.log.append(format!("Claiming Faucet {}...", symbol));
    let tx = match ctx.ledger.grant_if_eligible(asset).await {
        Ok(GrantOutcome::AlreadyGranted) => {
            ctx.log.append(format!("{} Faucet has already been claimed.", symbol));
            return RunOutcome::Completed;
        }
        Ok(GrantOutcome::Submitted(tx)) => tx,
        Err(e) => {
            ctx.log.append(format!("Claim Faucet {} failed: {}", symbol, e));
            return RunOutcome::Aborted(e.into());
        }
    };

    ctx.log.append(format!("Transaction sent. Tx Hash: {}", tx.short()));
    if let Err(e) = ctx.ledger.confirm(&tx, Some(asset)).await {
        ctx.log.append(format!("Claim Faucet {} failed: {}", symbol, e));
        return RunOutcome::Aborted(e.into());
    }
    ctx.log.append(format!(
        "Claim Faucet {} successful! Tx Hash: {}",
        symbol,
        tx.short()
    ));

    let settle = Duration::from_millis(ctx.config.claim.settle_ms);
    if delay::wait(settle, cancel).await.is_cancelled() {
        tracing::info!(%symbol, "claim settle interrupted by cancel");
    }
    // 领取已确认，无论是否取消都刷新一次余额
    ctx.refresh().await;
    RunOutcome::Completed
}
