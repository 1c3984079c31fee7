//! Reusable TUI components

use ratatui::{
    layout::Rect,
    style::{Color, Style, Stylize},
    text::Span,
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::models::Severity;
use crate::watch::Toast;

/// Colored dot with a status label
pub struct StatusIndicator<'a> {
    label: &'a str,
    severity: Severity,
    resolved: bool,
}

impl<'a> StatusIndicator<'a> {
    pub fn new(label: &'a str, severity: Severity, resolved: bool) -> Self {
        Self {
            label,
            severity,
            resolved,
        }
    }

    pub fn to_span(&self) -> Span<'a> {
        let (symbol, color) = if self.resolved {
            ("●", Color::Green)
        } else {
            match self.severity {
                Severity::Critical => ("●", Color::Red),
                Severity::Warning => ("●", Color::Yellow),
                Severity::Normal => ("○", Color::DarkGray),
            }
        };

        Span::styled(
            format!("{} {}", symbol, self.label),
            Style::default().fg(color),
        )
    }
}

/// A transient notification card
pub struct ToastCard<'a> {
    toast: &'a Toast,
}

impl<'a> ToastCard<'a> {
    pub fn new(toast: &'a Toast) -> Self {
        Self { toast }
    }

    pub fn render(self, frame: &mut Frame, area: Rect) {
        let (title, color) = match self.toast.severity {
            Severity::Critical => ("Critical", Color::Red),
            Severity::Warning => ("Warning", Color::Yellow),
            Severity::Normal => ("Notice", Color::Cyan),
        };

        frame.render_widget(Clear, area);

        let card = Paragraph::new(self.toast.message.as_str())
            .style(Style::default().fg(Color::White))
            .block(
                Block::default()
                    .title(title)
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(color).bold()),
            );

        frame.render_widget(card, area);
    }
}
