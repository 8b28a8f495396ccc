use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use runbar_types::NotifyLevel;

pub mod components;

use crate::app::{App, AppState, PickerState, ViewerState};
use crate::ui::components::session_list::{SessionList, SessionListState};

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(f.area());

    draw_header(f, app, chunks[0]);
    draw_sessions(f, app, chunks[1]);
    draw_status_bar(f, app, chunks[2]);

    match &app.state {
        AppState::Launcher => {}
        AppState::Picker(picker) => draw_picker(f, picker),
        AppState::Viewer(viewer) => draw_viewer(f, viewer),
    }
    draw_toasts(f, app);
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let title = Paragraph::new(Line::from(vec![
        Span::styled(
            "runbar",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  {}", app.root_label),
            Style::default().fg(Color::Gray),
        ),
    ]))
    .alignment(Alignment::Left)
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, area);
}

fn draw_sessions(f: &mut Frame, app: &App, area: Rect) {
    let mut state = SessionListState {
        selected_index: app.selected_session_index,
    };
    let list = SessionList::new(&app.sessions)
        .block(Block::default().borders(Borders::ALL).title(" Terminals "))
        .spinner_frame(app.tick_count);
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let running = app.running_count();
    let last = match &app.last_record {
        Some(record) if record.outcome.is_success() => format!("last: {} ok", record.task_name),
        Some(record) => format!("last: {} failed", record.task_name),
        None => "last: none".to_string(),
    };
    let hints = match app.state {
        AppState::Launcher => "Enter menu  l last result  o output  x close  q quit",
        AppState::Picker(_) => "Enter confirm  Space toggle  Esc dismiss",
        AppState::Viewer(_) => "j/k scroll  Esc close",
    };
    let status_text = format!(" ▶ Run task | {running} running | {last} | {hints} ");
    let status_widget = Paragraph::new(status_text)
        .style(
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Left);
    f.render_widget(status_widget, area);
}

fn draw_picker(f: &mut Frame, picker: &PickerState) {
    let area = centered_rect(70, 60, f.area());
    f.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(format!(" {} ", picker.options.placeholder));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut lines = Vec::with_capacity(picker.items.len() * 2);
    let mut cursor_line = 0usize;
    for (idx, item) in picker.items.iter().enumerate() {
        if item.is_separator() {
            lines.push(Line::from(Span::styled(
                "─".repeat(inner.width as usize),
                Style::default().fg(Color::DarkGray),
            )));
            continue;
        }
        if idx == picker.cursor {
            cursor_line = lines.len();
        }
        let label_style = if idx == picker.cursor {
            Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };
        let mut spans = Vec::new();
        if picker.options.multi_select {
            let mark = if picker.checked[idx] { "[x] " } else { "[ ] " };
            spans.push(Span::styled(mark, Style::default().fg(Color::Cyan)));
        }
        spans.push(Span::styled(item.label.as_str(), label_style));
        if let Some(description) = &item.description {
            spans.push(Span::styled(
                format!("  {description}"),
                Style::default().fg(Color::Gray),
            ));
        }
        lines.push(Line::from(spans));
        if let Some(detail) = &item.detail {
            lines.push(Line::from(Span::styled(
                format!("    {detail}"),
                Style::default().fg(Color::DarkGray),
            )));
        }
    }

    let height = inner.height as usize;
    let offset = (cursor_line + 2).saturating_sub(height);
    let widget = Paragraph::new(lines).scroll((u16::try_from(offset).unwrap_or(0), 0));
    f.render_widget(widget, inner);
}

fn draw_viewer(f: &mut Frame, viewer: &ViewerState) {
    let area = centered_rect(90, 85, f.area());
    f.render_widget(Clear, area);
    let widget = Paragraph::new(viewer.content.as_str())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(format!(" {} ", viewer.title)),
        )
        .wrap(Wrap { trim: false })
        .scroll((viewer.scroll, 0));
    f.render_widget(widget, area);
}

fn draw_toasts(f: &mut Frame, app: &App) {
    let area = f.area();
    let width = area.width.min(60);
    for (row, toast) in app.toasts.iter().rev().enumerate() {
        let y = area.y + 1 + (row as u16) * 3;
        if y + 3 > area.height {
            break;
        }
        let rect = Rect::new(area.x + area.width - width, y, width, 3);
        let color = match toast.level {
            NotifyLevel::Info => Color::Green,
            NotifyLevel::Error => Color::Red,
        };
        f.render_widget(Clear, rect);
        let widget = Paragraph::new(toast.message.as_str()).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        );
        f.render_widget(widget, rect);
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
