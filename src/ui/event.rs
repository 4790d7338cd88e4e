//! 事件处理
//!
//! 轮询 crossterm 键盘事件，转换为与界面状态无关的 AppEvent；
//! 具体含义（菜单导航、输入框编辑）由 run_app 根据当前是否有输入框决定。

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// 应用事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Quit,
    Up,
    Down,
    Enter,
    Back,
    ScrollUp,
    ScrollDown,
    PageUp,
    PageDown,
    Backspace,
    Char(char),
    /// 终端尺寸变化，只需重绘
    Redraw,
}

pub struct EventHandler {
    tick: Duration,
}

impl EventHandler {
    pub fn new(tick: Duration) -> Self {
        Self { tick }
    }

    /// 最多等待一个 tick；无事件时返回 None
    pub fn poll(&self) -> anyhow::Result<Option<AppEvent>> {
        if event::poll(self.tick)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => return Ok(map_key(key)),
                Event::Resize(..) => return Ok(Some(AppEvent::Redraw)),
                _ => {}
            }
        }
        Ok(None)
    }
}

pub fn map_key(key: KeyEvent) -> Option<AppEvent> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let ev = match key.code {
        KeyCode::Char('c') if ctrl => AppEvent::Quit,
        KeyCode::Up if ctrl => AppEvent::ScrollUp,
        KeyCode::Down if ctrl => AppEvent::ScrollDown,
        KeyCode::Up => AppEvent::Up,
        KeyCode::Down => AppEvent::Down,
        KeyCode::PageUp => AppEvent::PageUp,
        KeyCode::PageDown => AppEvent::PageDown,
        KeyCode::Enter => AppEvent::Enter,
        KeyCode::Esc => AppEvent::Back,
        KeyCode::Backspace => AppEvent::Backspace,
        KeyCode::Char(c) => AppEvent::Char(c),
        _ => return None,
    };
    Some(ev)
}
