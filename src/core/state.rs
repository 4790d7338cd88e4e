//! 任务状态：每个任务族的运行/取消标志与忙碌闸门
//!
//! `TaskBoard` 是唯一的写入方：`try_acquire` 在一个短临界区内检查冲突并占用通道，
//! 返回的 `RunGuard` 在 drop 时释放通道并重新发布 `TaskState`。
//! 因此正常完成、取消、出错甚至 panic 都以同样方式清除忙碌标志。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::core::error::TaskError;
use crate::ledger::Asset;

/// 任务族：每个族同一时刻只能有一个实例在运行
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize)]
pub enum TaskFamily {
    Claim,
    SwapCycle,
    SendBatch,
}

impl TaskFamily {
    pub fn label(self) -> &'static str {
        match self {
            TaskFamily::Claim => "Claim Faucet",
            TaskFamily::SwapCycle => "Auto Swap",
            TaskFamily::SendBatch => "Auto Send",
        }
    }

    fn lanes(self) -> &'static [Lane] {
        match self {
            TaskFamily::Claim => &[Lane::ClaimA, Lane::ClaimB],
            TaskFamily::SwapCycle => &[Lane::Swap],
            TaskFamily::SendBatch => &[Lane::Send],
        }
    }
}

/// 忙碌闸门的最小单位；Claim 族按资产拆成两条
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub enum Lane {
    ClaimA,
    ClaimB,
    Swap,
    Send,
}

impl Lane {
    const ALL: [Lane; 4] = [Lane::ClaimA, Lane::ClaimB, Lane::Swap, Lane::Send];

    pub fn claim(asset: Asset) -> Self {
        match asset {
            Asset::A => Lane::ClaimA,
            Asset::B => Lane::ClaimB,
        }
    }

    pub fn family(self) -> TaskFamily {
        match self {
            Lane::ClaimA | Lane::ClaimB => TaskFamily::Claim,
            Lane::Swap => TaskFamily::SwapCycle,
            Lane::Send => TaskFamily::SendBatch,
        }
    }

    fn index(self) -> usize {
        match self {
            Lane::ClaimA => 0,
            Lane::ClaimB => 1,
            Lane::Swap => 2,
            Lane::Send => 3,
        }
    }
}

/// 任务族之间的互斥范围
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionScope {
    /// 各族独立
    #[default]
    PerFamily,
    /// 领取与兑换互相阻塞
    ClaimSwapCoupled,
}

/// 两种资产的领取是否共用一把锁
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimLock {
    #[default]
    Shared,
    PerAsset,
}

/// 互斥策略：给定通道，哪些通道被占用时不能启动
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ExclusionPolicy {
    pub scope: ExclusionScope,
    pub claim_lock: ClaimLock,
}

impl ExclusionPolicy {
    pub fn new(scope: ExclusionScope, claim_lock: ClaimLock) -> Self {
        Self { scope, claim_lock }
    }

    pub fn conflicts(&self, lane: Lane) -> Vec<Lane> {
        let coupled = self.scope == ExclusionScope::ClaimSwapCoupled;
        let mut out = vec![lane];
        match lane {
            Lane::ClaimA | Lane::ClaimB => {
                if self.claim_lock == ClaimLock::Shared {
                    let sibling = if lane == Lane::ClaimA { Lane::ClaimB } else { Lane::ClaimA };
                    out.push(sibling);
                }
                if coupled {
                    out.push(Lane::Swap);
                }
            }
            Lane::Swap => {
                if coupled {
                    out.extend([Lane::ClaimA, Lane::ClaimB]);
                }
            }
            Lane::Send => {}
        }
        out
    }

    /// 若不可启动，返回占用中的冲突通道
    pub fn blocker(&self, lane: Lane, state: &TaskState) -> Option<Lane> {
        self.conflicts(lane)
            .into_iter()
            .find(|l| state.lane(*l).running)
    }
}

/// 单个任务族（或通道）的对外状态
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize)]
pub struct FamilyState {
    pub running: bool,
    pub cancel_requested: bool,
}

/// 发布给 UI 的任务状态投影
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize)]
pub struct TaskState {
    lanes: [FamilyState; 4],
}

impl TaskState {
    pub fn lane(&self, lane: Lane) -> FamilyState {
        self.lanes[lane.index()]
    }

    pub fn family(&self, family: TaskFamily) -> FamilyState {
        family
            .lanes()
            .iter()
            .map(|l| self.lane(*l))
            .fold(FamilyState::default(), |acc, s| FamilyState {
                running: acc.running || s.running,
                cancel_requested: acc.cancel_requested || s.cancel_requested,
            })
    }

    pub fn is_running(&self, family: TaskFamily) -> bool {
        self.family(family).running
    }

    pub fn any_running(&self) -> bool {
        self.lanes.iter().any(|s| s.running)
    }
}

struct Slot {
    run_id: u64,
    token: CancellationToken,
    cancel_requested: bool,
}

/// 忙碌闸门 + 取消令牌的持有者
pub struct TaskBoard {
    slots: Mutex<[Option<Slot>; 4]>,
    policy: ExclusionPolicy,
    root: CancellationToken,
    state_tx: watch::Sender<TaskState>,
    next_run_id: AtomicU64,
}

impl TaskBoard {
    /// `root` 通常为进程关闭令牌；每次运行的令牌都是它的子令牌
    pub fn new(policy: ExclusionPolicy, root: CancellationToken) -> Arc<Self> {
        let (state_tx, _) = watch::channel(TaskState::default());
        Arc::new(Self {
            slots: Mutex::new([None, None, None, None]),
            policy,
            root,
            state_tx,
            next_run_id: AtomicU64::new(1),
        })
    }

    pub fn policy(&self) -> ExclusionPolicy {
        self.policy
    }

    pub fn state(&self) -> TaskState {
        *self.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskState> {
        self.state_tx.subscribe()
    }

    /// 占用通道；冲突通道忙碌时返回 AlreadyInFlight，状态不变
    pub fn try_acquire(self: &Arc<Self>, lane: Lane) -> Result<RunGuard, TaskError> {
        let mut slots = self.lock();
        let current = Self::project(&slots);
        if let Some(blocker) = self.policy.blocker(lane, &current) {
            return Err(TaskError::AlreadyInFlight(blocker.family()));
        }
        let run_id = self.next_run_id.fetch_add(1, Ordering::Relaxed);
        let token = self.root.child_token();
        slots[lane.index()] = Some(Slot {
            run_id,
            token: token.clone(),
            cancel_requested: false,
        });
        self.publish(&slots);
        drop(slots);
        tracing::debug!(?lane, run_id, "lane acquired");
        Ok(RunGuard {
            board: Arc::clone(self),
            lane,
            run_id,
            token,
        })
    }

    /// 请求取消某个任务族的所有运行中通道；没有运行中的实例时返回 false
    pub fn request_cancel(&self, family: TaskFamily) -> bool {
        let mut slots = self.lock();
        let mut hit = false;
        for lane in family.lanes() {
            if let Some(slot) = slots[lane.index()].as_mut() {
                slot.cancel_requested = true;
                slot.token.cancel();
                hit = true;
            }
        }
        if hit {
            self.publish(&slots);
        }
        hit
    }

    fn release(&self, lane: Lane, run_id: u64) {
        let mut slots = self.lock();
        let owned = slots[lane.index()]
            .as_ref()
            .is_some_and(|s| s.run_id == run_id);
        if owned {
            slots[lane.index()] = None;
            self.publish(&slots);
            tracing::debug!(?lane, run_id, "lane released");
        }
    }

    fn project(slots: &[Option<Slot>; 4]) -> TaskState {
        let mut state = TaskState::default();
        for lane in Lane::ALL {
            if let Some(slot) = &slots[lane.index()] {
                state.lanes[lane.index()] = FamilyState {
                    running: true,
                    cancel_requested: slot.cancel_requested,
                };
            }
        }
        state
    }

    fn publish(&self, slots: &[Option<Slot>; 4]) {
        let state = Self::project(slots);
        self.state_tx.send_replace(state);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, [Option<Slot>; 4]> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 一次运行的占用凭证；drop 时释放通道
pub struct RunGuard {
    board: Arc<TaskBoard>,
    lane: Lane,
    run_id: u64,
    token: CancellationToken,
}

impl RunGuard {
    pub fn lane(&self) -> Lane {
        self.lane
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.board.release(self.lane, self.run_id);
    }
}
