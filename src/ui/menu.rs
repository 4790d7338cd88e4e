//! 菜单与输入框模型（纯数据，不涉及终端）
//!
//! 菜单项由当前视图与 `derive_available_actions` 的结果生成；忙碌时启动项带 "(disabled)" 后缀，
//! 运行中才出现 "Stop Transaction"。输入框按步骤收集数量、金额与地址，最终产出一条 Command。

use std::collections::BTreeSet;

use crate::core::{Action, Command, TaskFamily};
use crate::ledger::Asset;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuView {
    Main,
    Swap,
    Faucet,
    Send,
}

impl MenuView {
    pub fn title(self) -> &'static str {
        match self {
            MenuView::Main => " Menu ",
            MenuView::Swap => " Auto Swap Menu ",
            MenuView::Faucet => " Claim Faucet Menu ",
            MenuView::Send => " Auto Send Token Menu ",
        }
    }
}

/// 选中菜单项后的去向
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuTarget {
    Open(MenuView),
    Dispatch(Command),
    Prompt(PromptKind),
    Back,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub label: String,
    pub target: MenuTarget,
    pub enabled: bool,
}

impl MenuItem {
    fn new(label: impl Into<String>, target: MenuTarget) -> Self {
        Self {
            label: label.into(),
            target,
            enabled: true,
        }
    }

    fn gated(label: impl Into<String>, target: MenuTarget, enabled: bool) -> Self {
        let label = label.into();
        Self {
            label: if enabled { label } else { format!("{} (disabled)", label) },
            target,
            enabled,
        }
    }
}

/// 显示用的资产符号与随机发送的金额上下限
pub struct Symbols<'a> {
    pub a: &'a str,
    pub b: &'a str,
    pub native: &'a str,
    pub send_min: &'a str,
    pub send_max: &'a str,
}

pub fn menu_items(view: MenuView, actions: &BTreeSet<Action>, symbols: &Symbols<'_>) -> Vec<MenuItem> {
    let clear = || MenuItem::new("Clear Transaction Logs", MenuTarget::Dispatch(Command::ClearLog));
    let back = || MenuItem::new("Back To Main Menu", MenuTarget::Back);
    let exit = || MenuItem::new("Exit", MenuTarget::Exit);
    let stop = |family: TaskFamily, items: &mut Vec<MenuItem>| {
        if actions.contains(&Action::Stop(family)) {
            items.push(MenuItem::new(
                "Stop Transaction",
                MenuTarget::Dispatch(Command::Cancel(family)),
            ));
        }
    };

    let mut items = Vec::new();
    match view {
        MenuView::Main => {
            items.push(MenuItem::new(
                format!("Auto Swap {} & {}", symbols.a, symbols.b),
                MenuTarget::Open(MenuView::Swap),
            ));
            items.push(MenuItem::new("Claim Faucet", MenuTarget::Open(MenuView::Faucet)));
            items.push(MenuItem::new("Auto Send Token", MenuTarget::Open(MenuView::Send)));
            items.push(clear());
            items.push(MenuItem::new("Refresh", MenuTarget::Dispatch(Command::Refresh)));
            items.push(exit());
        }
        MenuView::Swap => {
            items.push(MenuItem::gated(
                format!("Auto Swap {} & {}", symbols.a, symbols.b),
                MenuTarget::Prompt(PromptKind::SwapCount),
                actions.contains(&Action::StartSwapCycle),
            ));
            stop(TaskFamily::SwapCycle, &mut items);
            items.extend([clear(), back(), exit()]);
        }
        MenuView::Faucet => {
            for (asset, symbol) in [(Asset::A, symbols.a), (Asset::B, symbols.b)] {
                items.push(MenuItem::gated(
                    format!("Claim Faucet {}", symbol),
                    MenuTarget::Dispatch(Command::StartClaim(asset)),
                    actions.contains(&Action::Claim(asset)),
                ));
            }
            stop(TaskFamily::Claim, &mut items);
            items.extend([clear(), back(), exit()]);
        }
        MenuView::Send => {
            items.push(MenuItem::gated(
                "Auto Send Random Address",
                MenuTarget::Prompt(PromptKind::SendRandomCount),
                actions.contains(&Action::SendRandom),
            ));
            items.push(MenuItem::gated(
                "Send To Chosen Address",
                MenuTarget::Prompt(PromptKind::SendChosenAddress),
                actions.contains(&Action::SendChosen),
            ));
            stop(TaskFamily::SendBatch, &mut items);
            items.extend([clear(), back(), exit()]);
        }
    }
    items
}

/// 多步输入框
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptKind {
    SwapCount,
    SendRandomCount,
    SendRandomAmount { count: String },
    SendChosenAddress,
    SendChosenAmount { address: String },
}

/// 提交一步输入后的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptStep {
    Next(PromptKind),
    Done(Command),
}

impl PromptKind {
    pub fn question(&self, symbols: &Symbols<'_>) -> String {
        match self {
            PromptKind::SwapCount => "Enter the number of swaps:".to_string(),
            PromptKind::SendRandomCount => "Enter the number of sends:".to_string(),
            PromptKind::SendRandomAmount { .. } => format!(
                "Enter the token amount ({}) to send (min {}, max {}):",
                symbols.native, symbols.send_min, symbols.send_max
            ),
            PromptKind::SendChosenAddress => "Enter the target address:".to_string(),
            PromptKind::SendChosenAmount { .. } => {
                format!("Enter the token amount ({}) to send:", symbols.native)
            }
        }
    }

    pub fn submit(self, input: &str) -> PromptStep {
        let input = input.trim().to_string();
        match self {
            PromptKind::SwapCount => PromptStep::Done(Command::StartSwapCycle { count: input }),
            PromptKind::SendRandomCount => {
                PromptStep::Next(PromptKind::SendRandomAmount { count: input })
            }
            PromptKind::SendRandomAmount { count } => {
                PromptStep::Done(Command::StartSendRandom { count, amount: input })
            }
            PromptKind::SendChosenAddress => {
                PromptStep::Next(PromptKind::SendChosenAmount { address: input })
            }
            PromptKind::SendChosenAmount { address } => {
                PromptStep::Done(Command::StartSendChosen { address, amount: input })
            }
        }
    }
}
