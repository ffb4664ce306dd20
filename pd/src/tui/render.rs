//! TUI rendering

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Wrap};

use super::app::App;
use super::views::{
    DashboardView, DraftView, FormView, HelpChatView, MenuAction, Pending, ProjectListView, Selection, TaskListView,
    View,
};
use crate::format;
use crate::services::DraftStatus;

const TRANSCRIPT_ROWS: u16 = 8;

/// Main render function
pub fn render(app: &App, frame: &mut Frame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),                   // Header
            Constraint::Min(0),                      // Active view
            Constraint::Length(TRANSCRIPT_ROWS + 2), // Transcript
            Constraint::Length(3),                   // Command bar
        ])
        .split(frame.area());

    render_header(app, frame, chunks[0]);
    render_view(app.navigator().active(), frame, chunks[1]);
    render_transcript(app, frame, chunks[2]);
    render_bar(app, frame, chunks[3]);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let session = app.session();
    let project = session.active_code().unwrap_or("-").to_string();
    let mut spans = vec![
        Span::styled("plandeck ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::styled(app.navigator().active().title(), Style::default().fg(Color::Yellow)),
        Span::raw(" │ project: "),
        Span::styled(project, Style::default().fg(Color::Green)),
    ];
    if let Some(work) = &session.active_work {
        spans.push(Span::raw(" │ working on: "));
        spans.push(Span::styled(work.title.clone(), Style::default().fg(Color::Magenta)));
    }
    if app.navigator().len() > 1 {
        spans.push(Span::styled(
            format!(" │ depth {}", app.navigator().len()),
            Style::default().fg(Color::DarkGray),
        ));
    }
    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, area);
}

fn block(title: String, pending: Option<&Pending>) -> Block<'static> {
    let title = match pending {
        Some(p) => format!(" {} ({}...) ", title, p.word),
        None => format!(" {} ", title),
    };
    Block::default().borders(Borders::ALL).title(title)
}

fn render_view(view: &View, frame: &mut Frame, area: Rect) {
    match view {
        View::Dashboard(v) => render_dashboard(v, view, frame, area),
        View::ProjectList(v) => render_projects(v, view, frame, area),
        View::TaskList(v) => render_tasks(v, view, frame, area),
        View::ActionMenu(v) => {
            let rows: Vec<String> = MenuAction::ALL.iter().map(|a| a.label().to_string()).collect();
            render_rows(rows, &v.selection, block(view.title(), None), frame, area);
        }
        View::Recommendation(v) => {
            let text = match (&v.error, &v.text) {
                (Some(e), _) => format!("error: {}", e),
                (None, Some(text)) => text.clone(),
                (None, None) => String::new(),
            };
            let paragraph = Paragraph::new(text)
                .block(block(view.title(), view.pending()))
                .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        View::Form(v) => render_form(v, view, frame, area),
        View::Draft(v) => render_draft(v, view, frame, area),
        View::HelpChat(v) => render_help_chat(v, view, frame, area),
    }
}

/// A list with the selected row highlighted and kept on screen
fn render_rows(rows: Vec<String>, selection: &Selection, block: Block<'static>, frame: &mut Frame, area: Rect) {
    let offset = selection.offset();
    let items: Vec<ListItem> = rows
        .into_iter()
        .enumerate()
        .skip(offset)
        .map(|(i, row)| {
            if i == selection.index {
                ListItem::new(row).style(Style::default().bg(Color::DarkGray).fg(Color::White))
            } else {
                ListItem::new(row)
            }
        })
        .collect();
    frame.render_widget(List::new(items).block(block), area);
}

fn empty_or_error(error: &Option<String>, empty: &str, frame: &mut Frame, area: Rect, block: Block<'static>) {
    let (text, style) = match error {
        Some(e) => (format!("error: {}", e), Style::default().fg(Color::Red)),
        None => (empty.to_string(), Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(Paragraph::new(Span::styled(text, style)).block(block), area);
}

fn render_dashboard(v: &DashboardView, view: &View, frame: &mut Frame, area: Rect) {
    let block = block(view.title(), view.pending());
    if v.summaries.is_empty() || v.error.is_some() {
        empty_or_error(&v.error, "No projects yet. Try :project init", frame, area, block);
        return;
    }
    let rows = v
        .summaries
        .iter()
        .map(|s| {
            format!(
                "{:<6} {:<28} {:>9} {:>9} {:>4}%  {}",
                s.short_code,
                s.name,
                format::minutes(s.planned_min),
                format::minutes(s.logged_min),
                s.progress_pct(),
                s.risk
            )
        })
        .collect();
    render_rows(rows, &v.selection, block, frame, area);
}

fn render_projects(v: &ProjectListView, view: &View, frame: &mut Frame, area: Rect) {
    let block = block(view.title(), view.pending());
    if v.projects.is_empty() || v.error.is_some() {
        empty_or_error(&v.error, "No projects", frame, area, block);
        return;
    }
    let rows = v
        .projects
        .iter()
        .map(|p| {
            let target = p.target_date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
            format!("{:<6} {:<32} {:<8} {}", p.short_code, p.name, p.status.as_str(), target)
        })
        .collect();
    render_rows(rows, &v.selection, block, frame, area);
}

fn render_tasks(v: &TaskListView, view: &View, frame: &mut Frame, area: Rect) {
    let block = block(view.title(), view.pending());
    if v.items.is_empty() || v.error.is_some() {
        empty_or_error(&v.error, "No work items", frame, area, block);
        return;
    }
    let rows = v
        .items
        .iter()
        .map(|w| {
            format!(
                "{:<12} {:<36} {:<10} {:>8} / {}",
                w.status.to_string(),
                w.title,
                w.item_type.as_str(),
                format::minutes(w.logged_min),
                format::minutes(w.planned_min)
            )
        })
        .collect();
    render_rows(rows, &v.selection, block, frame, area);
}

fn input_line(prompt: String, input: &str) -> Vec<Line<'static>> {
    vec![
        Line::from(Span::styled(prompt, Style::default().fg(Color::Yellow))),
        Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Green)),
            Span::raw(input.to_string()),
            Span::styled("█", Style::default().fg(Color::DarkGray)),
        ]),
    ]
}

fn notice_lines(notices: &[String]) -> impl Iterator<Item = Line<'static>> + '_ {
    notices
        .iter()
        .map(|n| Line::from(Span::styled(format!("! {}", n), Style::default().fg(Color::Yellow))))
}

fn render_form(v: &FormView, view: &View, frame: &mut Frame, area: Rect) {
    let mut lines: Vec<Line> = v.flow.detail().into_iter().map(Line::from).collect();
    if !lines.is_empty() {
        lines.push(Line::from(""));
    }
    lines.extend(notice_lines(&v.notices));
    if let crate::wizard::Flow::Confirm(step) = &v.flow
        && v.input.is_empty()
    {
        let (yes, no) = if step.selected_yes {
            (Style::default().bg(Color::Green).fg(Color::Black), Style::default())
        } else {
            (Style::default(), Style::default().bg(Color::Red).fg(Color::Black))
        };
        lines.push(Line::from(Span::styled(step.prompt(), Style::default().fg(Color::Yellow))));
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled(" Yes ", yes),
            Span::raw("   "),
            Span::styled(" No ", no),
        ]));
    } else {
        lines.extend(input_line(v.flow.prompt(), &v.input));
    }
    let paragraph = Paragraph::new(lines)
        .block(block(view.title(), None))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_draft(v: &DraftView, view: &View, frame: &mut Frame, area: Rect) {
    let mut lines: Vec<Line> = v
        .bridge
        .transcript()
        .iter()
        .map(|l| {
            if l.starts_with("you: ") {
                Line::from(Span::styled(l.clone(), Style::default().fg(Color::Cyan)))
            } else {
                Line::from(l.clone())
            }
        })
        .collect();
    lines.extend(notice_lines(&v.notices));
    lines.push(Line::from(""));
    let prompt = match v.bridge.state() {
        DraftStatus::Ready => format!("Draft ready: {}", v.bridge.prompt()),
        DraftStatus::Gathering => v.bridge.prompt(),
    };
    lines.extend(input_line(prompt, &v.input));
    render_scrolled(lines, block(view.title(), view.pending()), frame, area);
}

fn render_help_chat(v: &HelpChatView, view: &View, frame: &mut Frame, area: Rect) {
    let mut lines = Vec::new();
    for (question, answer) in &v.exchanges {
        lines.push(Line::from(Span::styled(format!("? {}", question), Style::default().fg(Color::Cyan))));
        lines.extend(answer.lines().map(|l| Line::from(l.to_string())));
        lines.push(Line::from(""));
    }
    lines.extend(input_line("Ask how to do something".to_string(), &v.input));
    render_scrolled(lines, block(view.title(), view.pending()), frame, area);
}

/// Show the tail of a long conversation
fn render_scrolled(lines: Vec<Line<'static>>, block: Block<'static>, frame: &mut Frame, area: Rect) {
    let visible = area.height.saturating_sub(2);
    let total = u16::try_from(lines.len()).unwrap_or(u16::MAX);
    let scroll = total.saturating_sub(visible);
    let paragraph = Paragraph::new(lines).block(block).scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

fn render_transcript(app: &App, frame: &mut Frame, area: Rect) {
    let transcript = app.transcript();
    let start = transcript.len().saturating_sub(usize::from(TRANSCRIPT_ROWS));
    let lines: Vec<Line> = transcript[start..]
        .iter()
        .map(|l| {
            if l.starts_with("> ") {
                Line::from(Span::styled(l.clone(), Style::default().fg(Color::Cyan)))
            } else if l.starts_with("error:") {
                Line::from(Span::styled(l.clone(), Style::default().fg(Color::Red)))
            } else {
                Line::from(l.clone())
            }
        })
        .collect();
    let title = match app.bar_pending() {
        Some(p) => format!(" Output ({}...) ", p.word),
        None => " Output ".to_string(),
    };
    let paragraph = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(paragraph, area);
}

fn render_bar(app: &App, frame: &mut Frame, area: Rect) {
    let bar = app.bar();
    let line = if bar.focused {
        Line::from(vec![
            Span::styled(":", Style::default().fg(Color::Yellow)),
            Span::raw(bar.input.clone()),
            Span::styled("█", Style::default().fg(Color::DarkGray)),
        ])
    } else if let Some(status) = app.status() {
        Line::from(Span::styled(status.to_string(), Style::default().fg(Color::Yellow)))
    } else {
        Line::from(Span::styled(
            app.navigator().active().short_help(),
            Style::default().fg(Color::DarkGray),
        ))
    };
    frame.render_widget(Paragraph::new(line).block(Block::default().borders(Borders::ALL)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::History;
    use crate::services::testing::{add_project, temp_services};
    use crate::session::SessionState;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use std::time::Duration;

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        terminal.backend().buffer().content().iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn test_render_shows_header_and_loading_dashboard() {
        let (_dir, services) = temp_services();
        add_project(&services, "Garden");
        let app = App::new(services, SessionState::new(Duration::from_secs(5)), History::ephemeral(10));
        let text = screen(&app);
        assert!(text.contains("plandeck"));
        assert!(text.contains("project: -"));
        assert!(text.contains("Output"));
    }
}
