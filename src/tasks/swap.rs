//! 自动兑换循环
//!
//! 每轮随机选择方向与金额；单轮失败只记录并继续下一轮，取消在每轮开头与授权之后生效。
//! 默认每次运行每种资产只授权一次无限额度，`reauthorize_every_iteration` 可恢复逐轮授权。

use std::collections::HashSet;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::core::delay;
use crate::core::error::{RunOutcome, TaskError};
use crate::ledger::{Allowance, Amount, Asset, ExchangeRequest};
use crate::tasks::TaskContext;

/// 兑换方向，每轮均匀随机
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDirection {
    AtoB,
    BtoA,
}

impl SwapDirection {
    pub fn random() -> Self {
        if rand::thread_rng().gen_bool(0.5) {
            SwapDirection::AtoB
        } else {
            SwapDirection::BtoA
        }
    }

    /// (输入资产, 输出资产)
    pub fn assets(self) -> (Asset, Asset) {
        match self {
            SwapDirection::AtoB => (Asset::A, Asset::B),
            SwapDirection::BtoA => (Asset::B, Asset::A),
        }
    }
}

/// 单轮被取消打断
struct Interrupted;

struct SwapCycle<'a> {
    ctx: &'a TaskContext,
    cancel: &'a CancellationToken,
    account: String,
    authorized: HashSet<Asset>,
}

pub async fn run_swap_cycle(ctx: &TaskContext, cancel: &CancellationToken, iterations: u32) -> RunOutcome {
    let Some(account) = ctx.ledger.account() else {
        let reason = "Wallet not initialized.".to_string();
        ctx.log.append(format!("Error in Auto Swap: {}", reason));
        return RunOutcome::Aborted(TaskError::PreconditionFailed(reason));
    };

    ctx.log.append(format!("Starting Auto Swap for {} times.", iterations));
    let mut cycle = SwapCycle {
        ctx,
        cancel,
        account,
        authorized: HashSet::new(),
    };

    for n in 1..=iterations {
        if cancel.is_cancelled() {
            ctx.log.append("Auto Swap cancelled.");
            return RunOutcome::Cancelled;
        }
        if cycle.iteration(n).await.is_err() {
            ctx.log.append("Auto Swap cancelled.");
            return RunOutcome::Cancelled;
        }
        if n < iterations {
            let pause = delay::jitter(ctx.config.swap.delay());
            ctx.log.append(format!(
                "Waiting {} seconds before the next swap...",
                pause.as_secs_f64()
            ));
            // 取消在下一轮开头处理
            delay::wait(pause, cancel).await;
        }
    }

    ctx.log.append("Auto Swap completed.");
    RunOutcome::Completed
}

impl SwapCycle<'_> {
    async fn iteration(&mut self, n: u32) -> Result<(), Interrupted> {
        let ctx = self.ctx;
        let swap_cfg = &ctx.config.swap;
        let (asset_in, asset_out) = SwapDirection::random().assets();
        let whole = {
            let (lo, hi) = (swap_cfg.amount_min.min(swap_cfg.amount_max), swap_cfg.amount_min.max(swap_cfg.amount_max));
            rand::thread_rng().gen_range(lo..=hi)
        };
        let symbol_in = ctx.symbol(asset_in).to_string();
        let symbol_out = ctx.symbol(asset_out).to_string();

        if swap_cfg.reauthorize_every_iteration || !self.authorized.contains(&asset_in) {
            ctx.log.append(format!("Swap {}: Approving token {}...", n, symbol_in));
            let approved = match ctx
                .ledger
                .authorize_spend(asset_in, &swap_cfg.router, Allowance::Unlimited)
                .await
            {
                Ok(tx) => {
                    ctx.log.append(format!("Approval TX sent: {}", tx.short()));
                    ctx.ledger.confirm(&tx, None).await
                }
                Err(e) => Err(e),
            };
            match approved {
                Ok(_) => {
                    ctx.log.append("Approval successful.");
                    self.authorized.insert(asset_in);
                }
                Err(e) => {
                    ctx.log.append(format!("Swap {} failed: approval error: {}", n, e));
                    return Ok(());
                }
            }
            if self.cancel.is_cancelled() {
                return Err(Interrupted);
            }
        }

        ctx.log.append(format!(
            "Swap {}: Swapping from {} -> {} with amount {}",
            n, symbol_in, symbol_out, whole
        ));
        let request = ExchangeRequest {
            asset_in,
            asset_out,
            amount_in: Amount::from_whole(whole),
            fee_tier: swap_cfg.fee_tier,
            recipient: self.account.clone(),
        };
        let tx = match ctx.ledger.exchange(&request).await {
            Ok(tx) => tx,
            Err(e) => {
                ctx.log.append(format!("Swap {} failed: {}", n, e));
                return Ok(());
            }
        };
        ctx.log.append(format!("Swap {} TX sent: {}", n, tx.short()));
        match ctx.ledger.confirm(&tx, Some(asset_out)).await {
            Ok(confirmation) => {
                match confirmation.received {
                    Some(out) => ctx.log.append(format!(
                        "Swap {} successful. Received {} {}.",
                        n, out, symbol_out
                    )),
                    None => ctx.log.append(format!("Swap {} successful.", n)),
                }
                ctx.refresh().await;
            }
            Err(e) => {
                ctx.log.append(format!("Swap {} failed: {}", n, e));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_assets_are_opposite() {
        for dir in [SwapDirection::AtoB, SwapDirection::BtoA] {
            let (i, o) = dir.assets();
            assert_eq!(i.other(), o);
        }
    }

    #[test]
    fn test_random_direction_hits_both() {
        let mut seen = HashSet::new();
        for _ in 0..200 {
            seen.insert(SwapDirection::random().assets().0);
        }
        assert_eq!(seen.len(), 2);
    }
}
