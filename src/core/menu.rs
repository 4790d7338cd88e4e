//! 菜单投影：由 TaskState 纯函数地推导当前可用的操作集合
//!
//! UI 在 TaskState 变化时调用 `derive_available_actions`，不在集合中的启动项显示为 "(disabled)"。

use std::collections::BTreeSet;

use crate::core::state::{ExclusionPolicy, Lane, TaskFamily, TaskState};
use crate::ledger::Asset;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub enum Action {
    Claim(Asset),
    StartSwapCycle,
    SendRandom,
    SendChosen,
    Stop(TaskFamily),
    ClearLog,
    Refresh,
}

pub fn derive_available_actions(state: &TaskState, policy: ExclusionPolicy) -> BTreeSet<Action> {
    let mut actions = BTreeSet::new();
    actions.insert(Action::ClearLog);
    actions.insert(Action::Refresh);

    for asset in [Asset::A, Asset::B] {
        if policy.blocker(Lane::claim(asset), state).is_none() {
            actions.insert(Action::Claim(asset));
        }
    }
    if policy.blocker(Lane::Swap, state).is_none() {
        actions.insert(Action::StartSwapCycle);
    }
    if policy.blocker(Lane::Send, state).is_none() {
        actions.insert(Action::SendRandom);
        actions.insert(Action::SendChosen);
    }
    for family in [TaskFamily::Claim, TaskFamily::SwapCycle, TaskFamily::SendBatch] {
        if state.is_running(family) {
            actions.insert(Action::Stop(family));
        }
    }
    actions
}
