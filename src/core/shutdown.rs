//! 进程关闭信号
//!
//! 关闭令牌是所有运行令牌的根：触发关闭后，正在等待随机延迟的编排器立即返回，
//! 命令循环停止。已提交的远程操作不会被撤回。

use std::future::Future;
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

/// 关闭原因；只记录第一次触发
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// 菜单 Exit / q / Ctrl+C
    UserInitiated,
    /// SIGTERM
    Signal,
    FatalError(String),
}

#[derive(Default)]
pub struct ShutdownManager {
    root: CancellationToken,
    reason: OnceLock<ShutdownReason>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 根令牌；TaskBoard 从它派生每次运行的子令牌
    pub fn token(&self) -> CancellationToken {
        self.root.clone()
    }

    pub fn shutdown(&self, reason: ShutdownReason) {
        if self.reason.set(reason.clone()).is_ok() {
            tracing::info!(?reason, "shutdown requested");
        }
        self.root.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.root.is_cancelled()
    }

    pub fn reason(&self) -> Option<&ShutdownReason> {
        self.reason.get()
    }

    /// 监听 Ctrl+C 与 SIGTERM（终端处于原始模式时 Ctrl+C 以按键形式交给 TUI）
    fn watch_signals(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let reason = tokio::select! {
                _ = manager.root.cancelled() => return,
                Ok(()) = tokio::signal::ctrl_c() => ShutdownReason::UserInitiated,
                _ = terminate() => ShutdownReason::Signal,
            };
            manager.shutdown(reason);
        });
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!("SIGTERM handler unavailable: {}", e);
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await
}

/// 运行 app 直到其结束或收到关闭信号；两种情况都会触发根令牌，使运行中的任务尽快停下
///
/// app 返回错误时关闭原因记为 FatalError。
pub async fn run_until_shutdown<F, T>(shutdown: Arc<ShutdownManager>, app: F) -> Option<anyhow::Result<T>>
where
    F: Future<Output = anyhow::Result<T>>,
{
    shutdown.watch_signals();

    let result = tokio::select! {
        out = app => Some(out),
        _ = shutdown.root.cancelled() => None,
    };

    if let Some(Err(e)) = &result {
        tracing::error!("app failed: {:#}", e);
        shutdown.shutdown(ShutdownReason::FatalError(format!("{:#}", e)));
    }
    shutdown.shutdown(ShutdownReason::UserInitiated);
    result
}
