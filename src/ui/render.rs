//! 界面渲染
//!
//! 顶部标题栏，左侧为交易日志（可滚动），右侧上方为钱包信息、下方为当前菜单；
//! 有输入框时在中央弹出覆盖层。

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Clear, List, ListItem, ListState, Paragraph, Scrollbar,
        ScrollbarOrientation, ScrollbarState, Wrap,
    },
    Frame,
};

use crate::ledger::AccountSnapshot;
use crate::ui::menu::{MenuItem, Symbols};

/// 一帧所需的全部数据
pub struct Screen<'a> {
    pub menu_title: &'a str,
    pub items: &'a [MenuItem],
    pub selected: usize,
    pub log_lines: &'a [String],
    /// 距底部的滚动偏移；0 表示跟随最新
    pub log_scroll: usize,
    pub snapshot: &'a AccountSnapshot,
    pub symbols: &'a Symbols<'a>,
    /// (问题, 当前输入)
    pub prompt: Option<(&'a str, &'a str)>,
}

/// 按字符数换行，避免在 UTF-8 中间截断
fn wrap_text(s: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![s.to_string()];
    }
    let mut lines = Vec::new();
    let mut line = String::new();
    for ch in s.chars() {
        if line.chars().count() >= width {
            lines.push(std::mem::take(&mut line));
        }
        line.push(ch);
    }
    lines.push(line);
    lines
}

fn log_color(message: &str) -> Color {
    let lower = message.to_lowercase();
    if lower.contains("fail") || lower.contains("error") || lower.contains("invalid") {
        Color::Red
    } else if lower.contains("success") || lower.contains("completed") || lower.contains("updated") {
        Color::Green
    } else if lower.contains("cancel") || lower.contains("stop") || lower.contains("waiting") {
        Color::Yellow
    } else {
        Color::White
    }
}

/// 绘制一帧；返回日志区 (总行数, 可视高度) 供外部 clamp 滚动
pub fn draw(f: &mut Frame, screen: &Screen<'_>) -> (usize, usize) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(8)])
        .split(f.area());

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            " AUTO SWAP ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("│ {} & {} │ {}", screen.symbols.a, screen.symbols.b, screen.snapshot.network),
            Style::default().fg(Color::Gray),
        ),
    ]))
    .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));
    f.render_widget(header, rows[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(rows[1]);

    let scroll_info = draw_logs(f, columns[0], screen);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(5)])
        .split(columns[1]);
    draw_wallet(f, right[0], screen);
    draw_menu(f, right[1], screen);

    if let Some((question, input)) = screen.prompt {
        draw_prompt(f, question, input);
    }

    scroll_info
}

fn draw_logs(f: &mut Frame, area: Rect, screen: &Screen<'_>) -> (usize, usize) {
    let block = Block::default()
        .title(" Transaction Logs ")
        .title_bottom(Line::from(Span::styled(
            " Ctrl+↑↓ PgUp/PgDn 滚动 ",
            Style::default().fg(Color::DarkGray),
        )))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));
    let inner = block.inner(area);
    let width = inner.width.saturating_sub(1) as usize; // 滚动条

    let mut lines: Vec<Line> = Vec::new();
    for message in screen.log_lines {
        let style = Style::default().fg(log_color(message));
        for part in wrap_text(message, width.max(20)) {
            lines.push(Line::from(Span::styled(part, style)));
        }
    }

    let height = inner.height as usize;
    let total = lines.len();
    let max_scroll = total.saturating_sub(height);
    let offset = max_scroll.saturating_sub(screen.log_scroll.min(max_scroll));

    f.render_widget(block, area);
    let paragraph = Paragraph::new(Text::from(lines))
        .wrap(Wrap { trim: false })
        .scroll((offset as u16, 0));
    f.render_widget(paragraph, inner);

    if total > height {
        let mut state = ScrollbarState::new(total)
            .position(offset)
            .viewport_content_length(height);
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .thumb_symbol("█")
            .track_symbol(Some("░"));
        f.render_stateful_widget(scrollbar, inner, &mut state);
    }

    (total, height)
}

fn draw_wallet(f: &mut Frame, area: Rect, screen: &Screen<'_>) {
    let snap = screen.snapshot;
    let label = Style::default().fg(Color::Cyan);
    let row = |name: String, value: String| {
        Line::from(vec![Span::styled(format!("{:<9}", name), label), Span::raw(value)])
    };
    let lines = vec![
        row("Address".into(), snap.short_address()),
        row(screen.symbols.native.to_string(), snap.native.to_string()),
        row(screen.symbols.a.to_string(), snap.asset_a.to_string()),
        row(screen.symbols.b.to_string(), snap.asset_b.to_string()),
        row("Network".into(), snap.network.clone()),
    ];
    let wallet = Paragraph::new(Text::from(lines)).block(
        Block::default()
            .title(" Wallet Information ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)),
    );
    f.render_widget(wallet, area);
}

fn draw_menu(f: &mut Frame, area: Rect, screen: &Screen<'_>) {
    let items: Vec<ListItem> = screen
        .items
        .iter()
        .map(|item| {
            let style = if item.enabled {
                Style::default()
            } else {
                Style::default().fg(Color::DarkGray)
            };
            ListItem::new(Span::styled(item.label.clone(), style))
        })
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .title(screen.menu_title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Green)),
        )
        .highlight_style(Style::default().fg(Color::Black).bg(Color::Green))
        .highlight_symbol("› ");
    let mut state = ListState::default();
    state.select(Some(screen.selected.min(screen.items.len().saturating_sub(1))));
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_prompt(f: &mut Frame, question: &str, input: &str) {
    let area = centered(f.area(), 50, 5);
    let block = Block::default()
        .title(" Prompt ")
        .title_bottom(Line::from(Span::styled(
            " Enter 确认 │ Esc 取消 ",
            Style::default().fg(Color::DarkGray),
        )))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));
    let body = Paragraph::new(Text::from(vec![
        Line::from(question.to_string()),
        Line::from(Span::styled(
            format!("> {}", input),
            Style::default().add_modifier(Modifier::BOLD),
        )),
    ]))
    .block(block)
    .wrap(Wrap { trim: false });
    f.render_widget(Clear, area);
    f.render_widget(body, area);
}

fn centered(area: Rect, percent_x: u16, height: u16) -> Rect {
    let width = area.width * percent_x / 100;
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height: height.min(area.height),
    }
}
