//! 可取消的随机延迟
//!
//! `wait` 让计时器与取消令牌在同一个 `select!` 中竞争：时间到返回 Completed，
//! 令牌被取消立即返回 Cancelled。`jitter` 在闭区间内均匀抽取等待时长。

use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// 一次等待的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Completed,
    Cancelled,
}

impl WaitOutcome {
    pub fn is_cancelled(self) -> bool {
        matches!(self, WaitOutcome::Cancelled)
    }
}

/// 毫秒闭区间 [min_ms, max_ms]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// 零延迟（测试与离线模式用）
    pub const fn zero() -> Self {
        Self::new(0, 0)
    }
}

/// 等待 `duration`，或在 `cancel` 被触发时提前返回
pub async fn wait(duration: Duration, cancel: &CancellationToken) -> WaitOutcome {
    if cancel.is_cancelled() {
        return WaitOutcome::Cancelled;
    }
    if duration.is_zero() {
        return WaitOutcome::Completed;
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => WaitOutcome::Cancelled,
        _ = tokio::time::sleep(duration) => WaitOutcome::Completed,
    }
}

/// 在区间内均匀取一个时长；min > max 时两端互换
pub fn jitter(range: DelayRange) -> Duration {
    let (lo, hi) = if range.min_ms <= range.max_ms {
        (range.min_ms, range.max_ms)
    } else {
        (range.max_ms, range.min_ms)
    };
    let ms = if lo == hi {
        lo
    } else {
        rand::thread_rng().gen_range(lo..=hi)
    };
    Duration::from_millis(ms)
}
