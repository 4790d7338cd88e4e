//! TUI 应用主循环
//!
//! 进入全屏/原始模式，将按键交给 `UiModel` 转为 Command 发送给命令循环。
//! 只有在按键、终端尺寸变化或 Controller 的 watch 通道（任务状态、日志、账户快照）有更新时才重绘。

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::{mpsc, watch};

use crate::core::{Command, Controller};
use crate::ui::event::{AppEvent, EventHandler};
use crate::ui::menu::{menu_items, MenuItem, MenuTarget, MenuView, PromptKind, PromptStep, Symbols};
use crate::ui::render::{draw, Screen};

const TICK: Duration = Duration::from_millis(100);
const PAGE: usize = 10;

/// 处理一个按键后 UI 需要做的事
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    None,
    Send(Command),
    Quit,
}

/// 菜单导航、输入框与日志滚动状态
#[derive(Debug)]
pub struct UiModel {
    pub view: MenuView,
    pub selected: usize,
    pub prompt: Option<PromptKind>,
    pub input: String,
    pub log_scroll: usize,
}

impl Default for UiModel {
    fn default() -> Self {
        Self {
            view: MenuView::Main,
            selected: 0,
            prompt: None,
            input: String::new(),
            log_scroll: 0,
        }
    }
}

impl UiModel {
    pub fn handle(&mut self, ev: AppEvent, items: &[MenuItem]) -> UiAction {
        match ev {
            AppEvent::Quit => return UiAction::Quit,
            AppEvent::ScrollUp => self.log_scroll = self.log_scroll.saturating_add(1),
            AppEvent::ScrollDown => self.log_scroll = self.log_scroll.saturating_sub(1),
            AppEvent::PageUp => self.log_scroll = self.log_scroll.saturating_add(PAGE),
            AppEvent::PageDown => self.log_scroll = self.log_scroll.saturating_sub(PAGE),
            _ if self.prompt.is_some() => return self.handle_prompt(ev),
            AppEvent::Up => self.selected = self.selected.saturating_sub(1),
            AppEvent::Down => {
                self.selected = (self.selected + 1).min(items.len().saturating_sub(1));
            }
            AppEvent::Back => self.open(MenuView::Main),
            AppEvent::Char('q') => return UiAction::Quit,
            AppEvent::Enter => {
                if let Some(item) = items.get(self.selected) {
                    return self.activate(item);
                }
            }
            _ => {}
        }
        UiAction::None
    }

    fn activate(&mut self, item: &MenuItem) -> UiAction {
        match &item.target {
            MenuTarget::Open(view) => self.open(*view),
            MenuTarget::Back => self.open(MenuView::Main),
            MenuTarget::Exit => return UiAction::Quit,
            MenuTarget::Dispatch(cmd) => return UiAction::Send(cmd.clone()),
            MenuTarget::Prompt(kind) => {
                // 禁用的启动项不弹输入框
                if item.enabled {
                    self.prompt = Some(kind.clone());
                    self.input.clear();
                }
            }
        }
        UiAction::None
    }

    fn handle_prompt(&mut self, ev: AppEvent) -> UiAction {
        match ev {
            AppEvent::Back => {
                self.prompt = None;
                self.input.clear();
            }
            AppEvent::Backspace => {
                self.input.pop();
            }
            AppEvent::Char(c) => self.input.push(c),
            AppEvent::Enter => {
                if let Some(kind) = self.prompt.take() {
                    let input = std::mem::take(&mut self.input);
                    match kind.submit(&input) {
                        PromptStep::Next(next) => self.prompt = Some(next),
                        PromptStep::Done(cmd) => return UiAction::Send(cmd),
                    }
                }
            }
            _ => {}
        }
        UiAction::None
    }

    fn open(&mut self, view: MenuView) {
        self.view = view;
        self.selected = 0;
    }
}

/// 运行 TUI：启用原始模式与全屏，循环 poll 事件 + 渲染，退出时恢复终端
pub async fn run_app(
    controller: Arc<Controller>,
    cmd_tx: mpsc::UnboundedSender<Command>,
) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &controller, &cmd_tx).await;

    restore_terminal(&mut terminal)?;
    result
}

/// 消费一次 watch 更新；有新值时返回 true
fn take_change<T>(rx: &mut watch::Receiver<T>) -> bool {
    match rx.has_changed() {
        Ok(true) => {
            rx.borrow_and_update();
            true
        }
        _ => false,
    }
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    controller: &Controller,
    cmd_tx: &mpsc::UnboundedSender<Command>,
) -> anyhow::Result<()> {
    let events = EventHandler::new(TICK);
    let mut model = UiModel::default();
    let mut state_rx = controller.subscribe_state();
    let mut log_rx = controller.log().subscribe();
    let mut snapshot_rx = controller.subscribe_snapshot();

    let assets = &controller.config().assets;
    let (send_min, send_max) = controller.config().send.amount_bounds();
    let (send_min, send_max) = (send_min.to_string(), send_max.to_string());
    let symbols = Symbols {
        a: &assets.a_symbol,
        b: &assets.b_symbol,
        native: &assets.native_symbol,
        send_min: &send_min,
        send_max: &send_max,
    };

    let mut dirty = true;
    loop {
        // 三个通道都要消费，不能短路
        let state_changed = take_change(&mut state_rx);
        let log_changed = take_change(&mut log_rx);
        let snapshot_changed = take_change(&mut snapshot_rx);
        dirty |= state_changed || log_changed || snapshot_changed;

        if dirty {
            let items = menu_items(model.view, &controller.available_actions(), &symbols);
            model.selected = model.selected.min(items.len().saturating_sub(1));
            let log_lines: Vec<String> = controller.log().entries().iter().map(|e| e.render()).collect();
            let snapshot = controller.snapshot();
            let question = model.prompt.as_ref().map(|p| p.question(&symbols));

            let mut scroll_info = (0usize, 0usize);
            terminal.draw(|f| {
                let screen = Screen {
                    menu_title: model.view.title(),
                    items: &items,
                    selected: model.selected,
                    log_lines: &log_lines,
                    log_scroll: model.log_scroll,
                    snapshot: &snapshot,
                    symbols: &symbols,
                    prompt: question.as_deref().map(|q| (q, model.input.as_str())),
                };
                scroll_info = draw(f, &screen);
            })?;
            let (total_lines, viewport_height) = scroll_info;
            model.log_scroll = model.log_scroll.min(total_lines.saturating_sub(viewport_height));
            dirty = false;
        }

        if let Some(ev) = events.poll()? {
            dirty = true;
            let items = menu_items(model.view, &controller.available_actions(), &symbols);
            model.selected = model.selected.min(items.len().saturating_sub(1));
            match model.handle(ev, &items) {
                UiAction::None => {}
                UiAction::Send(cmd) => {
                    if cmd_tx.send(cmd).is_err() {
                        tracing::warn!("command loop is gone, leaving UI");
                        break;
                    }
                }
                UiAction::Quit => {
                    let _ = cmd_tx.send(Command::Quit);
                    break;
                }
            }
        }

        tokio::task::yield_now().await;
    }
    Ok(())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
