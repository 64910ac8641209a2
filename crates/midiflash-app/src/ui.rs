//! TUI rendering
//!
//! Layout: status line, flash panel, event log beside the port list, and a
//! help line at the bottom.

use crate::app::App;
use crate::screen::Screen;
use midiflash_core::{Rgba, SessionState};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};

fn to_color(c: Rgba) -> Color {
    Color::Rgb(c.r, c.g, c.b)
}

/// Draw the whole application.
pub fn draw(frame: &mut Frame, app: &App, screen: &Screen) {
    let [status_area, flash_area, lower_area, help_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(5),
        Constraint::Percentage(45),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    render_status(frame, status_area, app);
    render_flash(frame, flash_area, screen);

    let [log_area, ports_area] =
        Layout::horizontal([Constraint::Percentage(65), Constraint::Percentage(35)]).areas(lower_area);
    render_log(frame, log_area, screen);
    render_ports(frame, ports_area, app);
    render_help(frame, help_area);
}

fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let status = app.session_status();
    let policy = app.policy();

    let state_style = match status.state {
        SessionState::Listening => Style::default().fg(Color::Green),
        SessionState::Idle => Style::default().fg(Color::DarkGray),
        _ => Style::default().fg(Color::Yellow),
    };
    let source = status.active.as_deref().unwrap_or("-");

    let mut spans = vec![
        Span::styled(format!(" {} ", status.state), state_style.add_modifier(Modifier::BOLD)),
        Span::raw(format!("{} | ", source)),
        Span::raw(format!(
            "{} ms x{} gap {} ms ",
            policy.on_duration_ms, policy.repetitions, policy.gap_ms
        )),
        Span::styled("  ", Style::default().bg(to_color(policy.color))),
        Span::raw(format!(" {} ", policy.color)),
    ];

    let dropped = app.coordinator().relay_stats().dropped();
    if dropped > 0 {
        spans.push(Span::styled(
            format!("| {} dropped ", dropped),
            Style::default().fg(Color::Yellow),
        ));
    }
    if !app.status_message().is_empty() {
        spans.push(Span::styled(
            format!("| {}", app.status_message()),
            Style::default().fg(Color::Gray),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_flash(frame: &mut Frame, area: Rect, screen: &Screen) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Flash ")
        .style(Style::default().bg(to_color(screen.painted)));
    frame.render_widget(block, area);
}

fn render_log(frame: &mut Frame, area: Rect, screen: &Screen) {
    let visible = area.height.saturating_sub(2) as usize;
    let skip = screen.log_len().saturating_sub(visible);
    let items: Vec<ListItem> = screen
        .log_lines()
        .skip(skip)
        .map(|line| {
            let style = if line.starts_with("[WARN]") || line.starts_with("[ERROR]") {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };
            ListItem::new(line.to_string()).style(style)
        })
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(" Events "));
    frame.render_widget(list, area);
}

fn render_ports(frame: &mut Frame, area: Rect, app: &App) {
    let ports = app.ports();
    let selected = app.selected();

    let mut items: Vec<ListItem> = Vec::new();
    items.push(ListItem::new("Inputs").style(Style::default().add_modifier(Modifier::BOLD)));
    if ports.inputs.is_empty() {
        items.push(ListItem::new("  (none)").style(Style::default().fg(Color::DarkGray)));
    }
    for (i, port) in ports.inputs.iter().enumerate() {
        if Some(i) == selected {
            items.push(
                ListItem::new(format!("> {}", port.id))
                    .style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
            );
        } else {
            items.push(ListItem::new(format!("  {}", port.id)));
        }
    }

    items.push(ListItem::new("Outputs").style(Style::default().add_modifier(Modifier::BOLD)));
    if ports.outputs.is_empty() {
        items.push(ListItem::new("  (none)").style(Style::default().fg(Color::DarkGray)));
    }
    for port in &ports.outputs {
        items.push(ListItem::new(format!("  {}", port.id)).style(Style::default().fg(Color::DarkGray)));
    }

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(" Ports "));
    frame.render_widget(list, area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let help =
        "Tab input  r refresh  space flash  c color  [ ] time  - = gap  < > reps  s save  l clear  q quit";
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}
