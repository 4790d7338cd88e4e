//! 编排管理器：任务入口、取消与命令循环
//!
//! `Controller` 持有 TaskBoard（忙碌闸门 + 取消令牌）与 TaskContext（账本、日志、配置）。
//! 每个 start_* 入口立即返回：忙碌时返回 AlreadyInFlight，否则 spawn 编排器并返回 JoinHandle。
//! 随机发送在启动前先加载地址列表，列表为空时直接拒绝，不占用忙碌闸门。
//! UI 通过 `Command` 通道驱动 Controller，通过 watch 通道读取 TaskState 与账户快照。

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::error::{RunOutcome, TaskError};
use crate::core::log_sink::LogSink;
use crate::core::menu::{derive_available_actions, Action};
use crate::core::state::{ExclusionPolicy, Lane, TaskBoard, TaskFamily, TaskState};
use crate::ledger::{
    is_valid_address, AccountSnapshot, Amount, Asset, LedgerClient, LocalSigner, MockLedger, RpcLedger,
};
use crate::recipients::{FileRecipients, RecipientSource};
use crate::tasks::{self, TaskContext};

/// 离线模式下使用的演示账户
const DEMO_ACCOUNT: &str = "0x000000000000000000000000000000000000dEaD";

/// 从 UI 发往编排器的用户命令（数量/金额/地址为原始输入，由 Controller 校验）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartClaim(Asset),
    StartSwapCycle { count: String },
    StartSendRandom { count: String, amount: String },
    StartSendChosen { address: String, amount: String },
    Cancel(TaskFamily),
    ClearLog,
    Refresh,
    Quit,
}

/// 编排管理器
pub struct Controller {
    board: Arc<TaskBoard>,
    ctx: Arc<TaskContext>,
}

impl Controller {
    pub fn new(
        config: Arc<AppConfig>,
        ledger: Arc<dyn LedgerClient>,
        recipients: Arc<dyn RecipientSource>,
        log: LogSink,
        shutdown: CancellationToken,
    ) -> Self {
        let policy = ExclusionPolicy::new(config.tasks.exclusion, config.claim.lock);
        let board = TaskBoard::new(policy, shutdown);
        let ctx = Arc::new(TaskContext::new(ledger, log, config, recipients));
        Self { board, ctx }
    }

    pub fn log(&self) -> &LogSink {
        &self.ctx.log
    }

    pub fn config(&self) -> &AppConfig {
        &self.ctx.config
    }

    pub fn task_state(&self) -> TaskState {
        self.board.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<TaskState> {
        self.board.subscribe()
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        self.ctx.snapshot()
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<AccountSnapshot> {
        self.ctx.subscribe_snapshot()
    }

    pub fn policy(&self) -> ExclusionPolicy {
        self.board.policy()
    }

    pub fn available_actions(&self) -> BTreeSet<Action> {
        derive_available_actions(&self.board.state(), self.board.policy())
    }

    pub fn start_claim(&self, asset: Asset) -> Result<JoinHandle<RunOutcome>, TaskError> {
        self.launch(Lane::claim(asset), move |ctx, cancel| async move {
            tasks::run_claim(&ctx, &cancel, asset).await
        })
    }

    pub fn start_swap_cycle(&self, iterations: u32) -> Result<JoinHandle<RunOutcome>, TaskError> {
        if iterations == 0 {
            return Err(self.reject(TaskError::PreconditionFailed(
                "Invalid number of swaps.".to_string(),
            )));
        }
        self.launch(Lane::Swap, move |ctx, cancel| async move {
            tasks::run_swap_cycle(&ctx, &cancel, iterations).await
        })
    }

    pub async fn start_send_random(&self, count: u32, amount: &str) -> Result<JoinHandle<RunOutcome>, TaskError> {
        if count == 0 {
            return Err(self.reject(TaskError::PreconditionFailed(
                "Invalid number of sends.".to_string(),
            )));
        }
        let amount = self.parse_amount(amount)?;
        let (min, max) = self.ctx.config.send.amount_bounds();
        if amount < min || amount > max {
            return Err(self.reject(TaskError::PreconditionFailed(format!(
                "Token amount must be between {} and {} {}.",
                min,
                max,
                self.ctx.native_symbol()
            ))));
        }
        if let Some(blocker) = self.board.policy().blocker(Lane::Send, &self.board.state()) {
            return Err(self.busy(TaskError::AlreadyInFlight(blocker.family())));
        }
        let recipients = self.ctx.recipients.load(&self.ctx.log).await;
        if recipients.is_empty() {
            return Err(self.reject(TaskError::PreconditionFailed(
                "Address list is empty.".to_string(),
            )));
        }
        self.launch(Lane::Send, move |ctx, cancel| async move {
            tasks::run_send_random(&ctx, &cancel, recipients, count, amount).await
        })
    }

    pub fn start_send_chosen(&self, address: &str, amount: &str) -> Result<JoinHandle<RunOutcome>, TaskError> {
        let address = address.trim().to_string();
        if !is_valid_address(&address) {
            return Err(self.reject(TaskError::PreconditionFailed(format!(
                "Invalid target address: {}",
                address
            ))));
        }
        let amount = self.parse_amount(amount)?;
        if amount.is_zero() {
            return Err(self.reject(TaskError::PreconditionFailed(
                "Token amount must be greater than 0.".to_string(),
            )));
        }
        self.launch(Lane::Send, move |ctx, cancel| async move {
            tasks::run_send_chosen(&ctx, &cancel, &address, amount).await
        })
    }

    /// 请求取消；没有运行中的实例时返回 false
    pub fn request_cancel(&self, family: TaskFamily) -> bool {
        if self.board.request_cancel(family) {
            self.ctx
                .log
                .append(format!("Stop Transaction command received ({}).", family.label()));
            true
        } else {
            self.ctx.log.append("No transaction is currently running.");
            false
        }
    }

    pub fn clear_log(&self) {
        self.ctx.log.clear();
    }

    /// 后台刷新余额快照
    pub fn refresh(&self) -> JoinHandle<()> {
        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move { ctx.refresh().await })
    }

    /// 处理一条 UI 命令；返回 false 表示退出
    pub async fn dispatch(&self, command: Command) -> bool {
        // 拒绝已写入交易日志，这里无需再处理 Err
        match command {
            Command::StartClaim(asset) => {
                let _ = self.start_claim(asset);
            }
            Command::StartSwapCycle { count } => {
                if let Ok(n) = self.parse_count(&count, "swaps") {
                    let _ = self.start_swap_cycle(n);
                }
            }
            Command::StartSendRandom { count, amount } => {
                if let Ok(n) = self.parse_count(&count, "sends") {
                    let _ = self.start_send_random(n, &amount).await;
                }
            }
            Command::StartSendChosen { address, amount } => {
                let _ = self.start_send_chosen(&address, &amount);
            }
            Command::Cancel(family) => {
                self.request_cancel(family);
            }
            Command::ClearLog => self.clear_log(),
            Command::Refresh => {
                let _ = self.refresh();
            }
            Command::Quit => return false,
        }
        true
    }

    fn launch<F, Fut>(&self, lane: Lane, body: F) -> Result<JoinHandle<RunOutcome>, TaskError>
    where
        F: FnOnce(Arc<TaskContext>, CancellationToken) -> Fut,
        Fut: Future<Output = RunOutcome> + Send + 'static,
    {
        let guard = self.board.try_acquire(lane).map_err(|e| self.busy(e))?;
        let run = body(Arc::clone(&self.ctx), guard.token().clone());
        Ok(tokio::spawn(async move {
            let outcome = run.await;
            tracing::info!(lane = ?guard.lane(), ?outcome, "run finished");
            drop(guard);
            outcome
        }))
    }

    fn parse_count(&self, input: &str, what: &str) -> Result<u32, TaskError> {
        match input.trim().parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(self.reject(TaskError::PreconditionFailed(format!(
                "Invalid number of {}.",
                what
            )))),
        }
    }

    fn parse_amount(&self, input: &str) -> Result<Amount, TaskError> {
        Amount::parse(input).map_err(|e| {
            self.reject(TaskError::PreconditionFailed(format!(
                "Token amount must be a number: {}",
                e
            )))
        })
    }

    fn busy(&self, err: TaskError) -> TaskError {
        self.ctx.log.append(format!(
            "{}. Please stop the transaction first before starting a new one.",
            err
        ));
        err
    }

    fn reject(&self, err: TaskError) -> TaskError {
        self.ctx.log.append(err.to_string());
        err
    }
}

/// 根据配置选择账本实现：配置了 rpc_url 时用 JSON-RPC，否则用离线 Mock
pub fn create_ledger_from_config(cfg: &AppConfig) -> anyhow::Result<Arc<dyn LedgerClient>> {
    match cfg.network.rpc_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => {
            tracing::info!("Using JSON-RPC ledger at {}", url);
            Ok(Arc::new(RpcLedger::new(url, cfg)?))
        }
        _ => {
            tracing::warn!("No rpc_url configured, using offline Mock ledger");
            let derived = match cfg.account.private_key.as_deref() {
                Some(key) if !key.trim().is_empty() => Some(LocalSigner::from_hex(key)?.address().to_string()),
                _ => None,
            };
            let account = derived
                .or_else(|| cfg.account.address.clone().filter(|a| is_valid_address(a)))
                .unwrap_or_else(|| DEMO_ACCOUNT.to_string());
            Ok(Arc::new(
                MockLedger::new(account, cfg.network.name.clone())
                    .with_latency(Duration::from_millis(cfg.network.mock_latency_ms)),
            ))
        }
    }
}

/// 创建 Controller 并启动命令循环：返回命令发送端与 Controller 句柄
pub fn create_controller(
    cfg: AppConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<(mpsc::UnboundedSender<Command>, Arc<Controller>)> {
    let ledger = create_ledger_from_config(&cfg)?;
    let recipients: Arc<dyn RecipientSource> =
        Arc::new(FileRecipients::new(cfg.send.recipients_file.clone()));
    let log = LogSink::new(cfg.log.capacity);
    let controller = Arc::new(Controller::new(
        Arc::new(cfg),
        ledger,
        recipients,
        log,
        shutdown.clone(),
    ));

    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
    let worker = Arc::clone(&controller);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(cmd) = cmd_rx.recv() => {
                    tracing::debug!(?cmd, "command received");
                    if !worker.dispatch(cmd).await {
                        break;
                    }
                }
                _ = shutdown.cancelled() => break,
                else => break,  // cmd_tx 已关闭，退出循环
            }
        }
        tracing::info!("command loop stopped");
    });

    Ok((cmd_tx, controller))
}
