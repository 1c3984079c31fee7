//! UI rendering for the TUI

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols,
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Table, Tabs, Wrap},
    Frame,
};

use crate::models::Severity;

use super::app::{ActiveTab, AckDialog, App, Overlay};
use super::components::{StatusIndicator, ToastCard};

/// Main colors
const PRIMARY: Color = Color::Cyan;
const SUCCESS: Color = Color::Green;
const ERROR: Color = Color::Red;
const MUTED: Color = Color::DarkGray;

/// Draw the entire UI
pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // Header + tabs
            Constraint::Min(10),    // Main content
            Constraint::Length(1),  // Status bar
        ])
        .split(frame.size());

    draw_header(frame, app, chunks[0]);
    draw_content(frame, app, chunks[1]);
    draw_status_bar(frame, app, chunks[2]);

    match &app.overlay {
        Overlay::Bell => draw_bell_panel(frame, app),
        Overlay::Ack(dialog) => draw_ack_dialog(frame, dialog),
        Overlay::Help => draw_help_overlay(frame),
        Overlay::None => {}
    }

    // Toasts render on top of everything else
    draw_toasts(frame, app);
}

fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(16),
            Constraint::Min(30),
            Constraint::Length(26),
        ])
        .split(area);

    // Logo
    let logo = Paragraph::new("📡 nodewatch")
        .style(Style::default().fg(PRIMARY).bold())
        .block(Block::default().borders(Borders::NONE));
    frame.render_widget(logo, chunks[0]);

    // Tabs
    let tabs = ["Alerts", "Profile"];
    let tab_titles: Vec<Line> = tabs
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let style = if i == app.active_tab.index() {
                Style::default().fg(PRIMARY).bold()
            } else {
                Style::default().fg(MUTED)
            };
            Line::from(Span::styled(format!(" {} {} ", i + 1, t), style))
        })
        .collect();

    let tabs_widget = Tabs::new(tab_titles)
        .select(app.active_tab.index())
        .highlight_style(Style::default().fg(PRIMARY))
        .divider(symbols::line::VERTICAL);

    frame.render_widget(tabs_widget, chunks[1]);

    // Notification bell and connection status
    let bell = if app.unread > 0 {
        Span::styled(format!("🔔 {}", app.unread), Style::default().fg(ERROR).bold())
    } else {
        Span::styled("🔔 0", Style::default().fg(MUTED))
    };
    let status = if app.connected {
        Span::styled("  ● Connected", Style::default().fg(SUCCESS))
    } else {
        Span::styled("  ○ Connecting", Style::default().fg(MUTED))
    };
    let right = Paragraph::new(Line::from(vec![bell, status]))
        .alignment(Alignment::Right)
        .block(Block::default().borders(Borders::NONE));
    frame.render_widget(right, chunks[2]);
}

fn draw_content(frame: &mut Frame, app: &App, area: Rect) {
    match app.active_tab {
        ActiveTab::Alerts => draw_alerts(frame, app, area),
        ActiveTab::Profile => draw_profile(frame, app, area),
    }
}

fn draw_alerts(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(5)])
        .split(area);

    let displayed = app.displayed();

    // Summary line, doubling as the fetch-failure banner
    let summary_text = if let Some(banner) = &app.error_banner {
        Line::from(Span::styled(
            banner.clone(),
            Style::default().fg(ERROR).bold(),
        ))
    } else {
        Line::from(vec![
            Span::styled(
                format!("{} {}", displayed.len(), app.filter.label().to_lowercase()),
                Style::default().fg(PRIMARY).bold(),
            ),
            Span::styled(
                format!(" of {} total  (f toggles filter)", app.history.len()),
                Style::default().fg(MUTED),
            ),
        ])
    };

    let summary = Paragraph::new(summary_text).block(
        Block::default()
            .title("Detection Log")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(MUTED)),
    );
    frame.render_widget(summary, chunks[0]);

    if displayed.is_empty() {
        let empty = Paragraph::new("No anomalies detected — everything is within tolerance")
            .style(Style::default().fg(MUTED).italic())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(MUTED)),
            );
        frame.render_widget(empty, chunks[1]);
        return;
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(MUTED));

    let header = Row::new(vec!["Machine", "Status", "Ratio", "Triggered", "Resolved by", "Note"])
        .style(Style::default().fg(PRIMARY).bold())
        .height(1);

    let rows: Vec<Row> = displayed
        .iter()
        .map(|view| {
            let status =
                StatusIndicator::new(view.status_label(), view.severity, view.is_resolved());

            let mut row = Row::new(vec![
                Cell::from(truncate(&view.machine_name, 18)),
                Cell::from(status.to_span()),
                Cell::from(view.ratio.map_or("-".to_string(), |r| format!("{r:.3}"))),
                Cell::from(
                    view.triggered_at
                        .map_or("-".to_string(), |t| t.format("%m-%d %H:%M:%S").to_string()),
                ),
                Cell::from(view.resolver_name.clone().unwrap_or_else(|| "-".to_string())),
                Cell::from(
                    view.comments
                        .as_deref()
                        .map_or("-".to_string(), |c| truncate(c, 28)),
                ),
            ]);

            // Deep-linked alert from the notification panel
            if app.highlight.as_deref() == Some(view.fingerprint.as_str()) {
                row = row.style(
                    Style::default()
                        .bg(Color::Blue)
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                );
            }
            row
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(20),
            Constraint::Percentage(13),
            Constraint::Percentage(10),
            Constraint::Percentage(17),
            Constraint::Percentage(15),
            Constraint::Percentage(25),
        ],
    )
    .header(header)
    .block(block)
    .highlight_style(Style::default().bg(Color::DarkGray));

    frame.render_stateful_widget(table, chunks[1], &mut app.alerts_state.clone());
}

fn draw_profile(frame: &mut Frame, app: &App, area: Rect) {
    let viewer = app.viewer();
    let capability = viewer.capability();

    let scope = if capability.full_visibility() {
        "All machines".to_string()
    } else {
        viewer
            .assigned_machine()
            .map_or("Unassigned".to_string(), |id| format!("Node {id}"))
    };

    let field = |label: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{label:<14}"), Style::default().fg(MUTED)),
            Span::styled(value, Style::default().fg(Color::White).bold()),
        ])
    };

    let lines = vec![
        Line::from(""),
        field("Name", viewer.name.clone().unwrap_or_else(|| "-".to_string())),
        field(
            "Role",
            viewer.role.clone().unwrap_or_else(|| "Field Operator".to_string()),
        ),
        field("Login", viewer.login.clone().unwrap_or_else(|| "-".to_string())),
        field(
            "Designation",
            viewer.designation.clone().unwrap_or_else(|| "Specialist".to_string()),
        ),
        field(
            "ID Card",
            viewer.cnic.clone().unwrap_or_else(|| "Verified".to_string()),
        ),
        field("Employee UID", format!("#{}", viewer.id)),
        field("Clearance", format!("Level {}", viewer.rights.unwrap_or_default())),
        field("Scope", scope),
        Line::from(""),
        Line::from(Span::styled(
            "Access is monitored for security compliance. Notify administration",
            Style::default().fg(MUTED),
        )),
        Line::from(Span::styled(
            "if you suspect your credentials are compromised.",
            Style::default().fg(MUTED),
        )),
    ];

    let profile = Paragraph::new(lines)
        .block(
            Block::default()
                .title("Operator Profile")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(MUTED)),
        )
        .wrap(Wrap { trim: true });

    frame.render_widget(profile, area);
}

fn draw_bell_panel(frame: &mut Frame, app: &App) {
    let size = frame.size();
    let width = size.width.min(46);
    let shown = app.feed.len().min(app.panel_limit) as u16;
    let height = (shown.max(1) + 2).min(size.height.saturating_sub(4));
    let area = Rect {
        x: size.width.saturating_sub(width.saturating_add(1)),
        y: 2,
        width,
        height,
    };

    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(format!("Active Stream — {} events", app.feed.len()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(PRIMARY));

    if app.feed.is_empty() {
        let empty = Paragraph::new("No unresolved anomalies")
            .style(Style::default().fg(MUTED).italic())
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = app
        .feed
        .iter()
        .take(app.panel_limit)
        .map(|view| {
            let time = view
                .triggered_at
                .map_or("--:--".to_string(), |t| t.format("%H:%M").to_string());
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<18}", truncate(&view.machine_name, 17)),
                    Style::default().fg(Color::White).bold(),
                ),
                Span::styled(
                    format!("{:<8}", view.ratio.map_or("-".to_string(), |r| format!("{r:.3}"))),
                    Style::default().fg(severity_color(view.severity)),
                ),
                Span::styled(time, Style::default().fg(MUTED)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("▶ ");

    frame.render_stateful_widget(list, area, &mut app.bell_state.clone());
}

fn draw_ack_dialog(frame: &mut Frame, dialog: &AckDialog) {
    let area = centered_rect(55, 40, frame.size());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(format!("Resolve Alert — {}", dialog.machine_name))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(PRIMARY));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner);

    let label = Paragraph::new("Resolution notes (required):").style(Style::default().fg(MUTED));
    frame.render_widget(label, chunks[0]);

    frame.render_widget(dialog.input.widget(), chunks[1]);

    if let Some(error) = &dialog.error {
        let error_line =
            Paragraph::new(error.as_str()).style(Style::default().fg(ERROR).bold());
        frame.render_widget(error_line, chunks[2]);
    }

    let hint = Paragraph::new("Enter submit · Esc cancel").style(Style::default().fg(MUTED));
    frame.render_widget(hint, chunks[3]);
}

fn draw_toasts(frame: &mut Frame, app: &App) {
    let size = frame.size();
    let width = size.width.min(42);
    let x = size.width.saturating_sub(width.saturating_add(1));
    let mut y = 1u16;

    // Newest first, stacked downward from the top-right corner
    for active in app.toasts.iter().rev() {
        if y.saturating_add(3) > size.height {
            break;
        }
        let area = Rect {
            x,
            y,
            width,
            height: 3,
        };
        ToastCard::new(&active.toast).render(frame, area);
        y += 3;
    }
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    // Status message or default help
    let left_text = app
        .get_status()
        .unwrap_or("? Help | Tab Switch | n Notifications | a Resolve | q Quit");
    let left = Paragraph::new(left_text).style(Style::default().fg(MUTED));
    frame.render_widget(left, chunks[0]);

    // Poll cadence and freshness
    let last = if app.connected {
        format_elapsed(app.last_update.elapsed())
    } else {
        "never".to_string()
    };
    let right_text = format!(
        "Poll: {} | Last: {}",
        humantime::format_duration(app.poll_interval),
        last
    );
    let right = Paragraph::new(right_text)
        .style(Style::default().fg(MUTED))
        .alignment(Alignment::Right);
    frame.render_widget(right, chunks[1]);
}

fn draw_help_overlay(frame: &mut Frame) {
    let area = centered_rect(60, 60, frame.size());
    frame.render_widget(Clear, area);

    let section = |text: &'static str| Line::from(Span::styled(text, Style::default().fg(PRIMARY)));
    let help_text = vec![
        Line::from(Span::styled(
            "Keyboard Shortcuts",
            Style::default().fg(PRIMARY).bold(),
        )),
        Line::from(""),
        section("Navigation:"),
        Line::from("  Tab / Shift+Tab    Switch between tabs"),
        Line::from("  1-2                Jump to specific tab"),
        Line::from("  j/k or ↑/↓         Navigate lists"),
        Line::from(""),
        section("Notifications:"),
        Line::from("  n                  Open/close the notification panel"),
        Line::from("  Enter              Jump to the selected alert"),
        Line::from(""),
        section("Alerts:"),
        Line::from("  f                  Toggle active/resolved filter"),
        Line::from("  a                  Resolve the selected alert"),
        Line::from(""),
        section("General:"),
        Line::from("  ?                  Toggle this help"),
        Line::from("  q / Ctrl+C         Quit"),
        Line::from(""),
        Line::from(Span::styled(
            "Press any key to close",
            Style::default().fg(MUTED).italic(),
        )),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .title("Help")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(PRIMARY)),
        )
        .wrap(Wrap { trim: true });

    frame.render_widget(help, area);
}

// Helper functions

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Critical => ERROR,
        Severity::Warning => Color::Yellow,
        Severity::Normal => MUTED,
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

fn format_elapsed(elapsed: std::time::Duration) -> String {
    let secs = elapsed.as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else {
        format!("{}m ago", secs / 60)
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
