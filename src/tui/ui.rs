use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};
use crate::commands::kind_label;
use crate::schedule::{
    calculate_progress, days_remaining, expected_progress, format_remaining_time, next_reminder,
};
use super::app::{App, InputMode};

pub fn ui(f: &mut Frame, app: &mut App) {
    let banner = app.banner();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(if banner.is_some() { 3 } else { 0 }), // Reminder banner
            Constraint::Min(0),     // Table
            Constraint::Length(9),  // Details
            Constraint::Length(3),  // Help / status
        ].as_ref())
        .split(f.area());

    if let Some(text) = banner {
        let banner = Paragraph::new(format!("{}  (x: dismiss)", text))
            .style(Style::default().fg(Color::Cyan))
            .block(Block::default().borders(Borders::ALL).title("Reminder"));
        f.render_widget(banner, chunks[0]);
    }

    let today = app.today;
    let rows: Vec<Row> = app
        .tasks
        .iter()
        .map(|t| {
            let progress = calculate_progress(t, today);
            let overdue = days_remaining(t, today).is_some_and(|d| d < 0);
            let style = if t.completed {
                Style::default().fg(Color::DarkGray)
            } else if overdue || progress >= 80 {
                Style::default().fg(Color::Red)
            } else if progress >= 50 {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::Green)
            };
            let pending = if app.dispatcher.is_pending(t.id) { " …" } else { "" };

            Row::new(vec![
                Cell::from(format!("{}{}", t.title, pending)),
                Cell::from(kind_label(t)),
                Cell::from(progress_bar(progress)),
                Cell::from(format_remaining_time(t, today)),
                Cell::from(next_reminder(t, today)),
                Cell::from(if t.completed { "Done" } else { "Pending" }),
            ]).style(style)
        })
        .collect();

    let widths = [
        Constraint::Min(20),
        Constraint::Length(22),
        Constraint::Length(17),
        Constraint::Length(10),
        Constraint::Length(14),
        Constraint::Length(8),
    ];

    let title = if app.show_completed { "Progress Pulse - All Tasks" } else { "Progress Pulse - Tasks" };
    let table = Table::new(rows, widths)
        .header(Row::new(vec!["Title", "Schedule", "Progress", "Time Left", "Next Reminder", "Status"])
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .bottom_margin(1))
        .block(Block::default().borders(Borders::ALL).title(title))
        .row_highlight_style(Style::default().add_modifier(Modifier::BOLD).bg(Color::DarkGray))
        .highlight_symbol(">> ");

    f.render_stateful_widget(table, chunks[1], &mut app.state);

    let details = match app.selected() {
        Some(t) => {
            let mut lines = Vec::new();
            if let Some(d) = &t.description {
                lines.push(Line::from(d.clone()));
            }
            lines.push(Line::from(format!("Expected: {}", expected_progress(t, today))));
            lines.push(Line::from(format!(
                "Progress made: {}",
                t.progress_made.as_deref().unwrap_or("-")
            )));
            lines.push(Line::from(format!(
                "Still to go: {}",
                t.progress_to_go.as_deref().unwrap_or("-")
            )));
            for (i, s) in t.steps.iter().enumerate() {
                lines.push(Line::from(format!("{}. [{}] {}", i + 1, if s.completed { "x" } else { " " }, s.text)));
            }
            Paragraph::new(lines)
        }
        None => Paragraph::new("No tasks. Press 'a' to add one."),
    };
    f.render_widget(
        details
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Details")),
        chunks[2],
    );

    let help_text = match app.input_mode {
        InputMode::Normal => "q: Quit | a: Add | Space: Done | d: Del | u: Update progress | s: Add step | c: Toggle done | x: Dismiss banner",
        InputMode::Adding => "Enter: Next Step | Esc: Cancel",
        InputMode::Updating | InputMode::AddingStep => "Enter: Send | Esc: Cancel",
    };
    let footer = match &app.status {
        Some(status) if app.input_mode == InputMode::Normal => format!("{}  |  {}", status, help_text),
        _ => help_text.to_string(),
    };

    let help = Paragraph::new(footer)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));

    f.render_widget(help, chunks[3]);

    // Render Input Box if needed
    if app.input_mode != InputMode::Normal {
        let height = if app.add_state.error.is_some() && app.input_mode == InputMode::Adding { 4 } else { 3 };
        let area = centered_rect(60, height, f.area());
        f.render_widget(Clear, area); // Clear the area first

        let title = match app.input_mode {
            InputMode::Adding => match app.add_state.step {
                0 => "Add Task: Enter Title",
                1 => "Add Task: Enter Description (Optional)",
                2 => "Add Task: Schedule (14 | 2 weeks | daily | weekly mon,wed)",
                3 => "Add Task: Reminder (2 | 1 week | on mon,fri | 07:30)",
                _ => "Add Task",
            },
            InputMode::Updating => "Update Progress: What did you do? (Optional)",
            InputMode::AddingStep => "Add Step",
            InputMode::Normal => "",
        };

        let mut lines = vec![Line::from(app.input_buffer.as_str())];
        if let (InputMode::Adding, Some(error)) = (&app.input_mode, &app.add_state.error) {
            lines.push(Line::styled(error.as_str(), Style::default().fg(Color::Red)));
        }
        let input = Paragraph::new(lines)
            .style(Style::default().fg(Color::Yellow))
            .block(Block::default().borders(Borders::ALL).title(title));

        f.render_widget(input, area);
    }
}

/// `[#####     ]  50%`
fn progress_bar(percent: u8) -> String {
    let filled = usize::from(percent) / 10;
    format!("[{}{}] {:>3}%", "#".repeat(filled), " ".repeat(10 - filled), percent)
}

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(r.height.saturating_sub(height) / 2),
            Constraint::Length(height),
            Constraint::Length(r.height.saturating_sub(height) / 2),
        ].as_ref())
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ].as_ref())
        .split(popup_layout[1])[1]
}
