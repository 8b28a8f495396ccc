use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, StatefulWidget, Widget},
};
use runbar_runtime::{SessionSnapshot, SessionStatus};

#[derive(Default)]
pub struct SessionListState {
    pub selected_index: usize,
}

/// Open task terminals with a live status marker.
pub struct SessionList<'a> {
    sessions: &'a [SessionSnapshot],
    block: Option<Block<'a>>,
    spinner_frame: usize,
}

impl<'a> SessionList<'a> {
    pub fn new(sessions: &'a [SessionSnapshot]) -> Self {
        Self {
            sessions,
            block: None,
            spinner_frame: 0,
        }
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    pub fn spinner_frame(mut self, frame: usize) -> Self {
        self.spinner_frame = frame;
        self
    }
}

impl<'a> StatefulWidget for SessionList<'a> {
    type State = SessionListState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let area = if let Some(block) = self.block {
            let inner_area = block.inner(area);
            block.render(area, buf);
            inner_area
        } else {
            area
        };

        if area.height == 0 || area.width == 0 {
            return;
        }

        if self.sessions.is_empty() {
            let hint = Line::from(Span::styled(
                "No task terminals. Press Enter to open the menu.",
                Style::default().fg(Color::DarkGray),
            ));
            buf.set_line(area.x, area.y, &hint, area.width);
            return;
        }

        let spinners = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
        let spinner = spinners[self.spinner_frame % spinners.len()];

        let visible = area.height as usize;
        let offset = state.selected_index.saturating_sub(visible.saturating_sub(1));

        for (row, (i, session)) in self.sessions.iter().enumerate().skip(offset).enumerate() {
            if row >= visible {
                break;
            }

            let y = area.y + row as u16;

            let (symbol, style) = match session.status {
                SessionStatus::Running => (spinner, Style::default().fg(Color::Yellow)),
                SessionStatus::Succeeded => ("●", Style::default().fg(Color::Green)),
                SessionStatus::Failed => ("✖", Style::default().fg(Color::Red)),
            };

            let name_style = if i == state.selected_index {
                Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED)
            } else {
                Style::default()
            };

            let mut spans = vec![
                Span::styled(format!("{} ", symbol), style),
                Span::styled(session.display_name.as_str(), name_style),
                Span::styled(
                    format!("  {}", session.command_line),
                    Style::default().fg(Color::DarkGray),
                ),
            ];
            if let Some(code) = session.exit_code {
                spans.push(Span::styled(format!("  (exit {code})"), style));
            }

            buf.set_line(area.x, y, &Line::from(spans), area.width);
        }
    }
}
