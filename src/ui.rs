use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use crate::app::{App, View};
use crate::models::ReviewStatus;
use crate::scoring;

pub fn render(app: &App, f: &mut Frame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // stats header
            Constraint::Min(5),    // main view
            Constraint::Length(2), // footer
        ])
        .split(f.area());

    draw_header(f, app, chunks[0]);
    match app.view {
        View::Disciplines => draw_disciplines(f, app, chunks[1]),
        View::WeakTopics => draw_weak_topics(f, app, chunks[1]),
        View::History => draw_history(f, app, chunks[1]),
    }
    draw_footer(f, app, chunks[2]);
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let line = Line::from(vec![
        Span::styled(
            format!(" Progress {}% ", app.overall_progress()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw("| "),
        Span::styled(
            format!("Due today {} ", app.due_today()),
            Style::default().fg(Color::Yellow),
        ),
        Span::raw("| "),
        Span::styled(
            format!(
                "Reviews {}/{} ",
                app.reviews_today(),
                app.data.settings.daily_goal
            ),
            Style::default().fg(Color::Magenta),
        ),
        Span::raw("| "),
        Span::styled(
            format!("Mastered {} ", app.mastered_count()),
            Style::default().fg(Color::Green),
        ),
        Span::raw("| "),
        Span::styled(
            format!("High priority {} ", app.high_priority_count()),
            Style::default().fg(Color::Red),
        ),
    ]);

    let p = Paragraph::new(line)
        .block(Block::default().title(" Exam Tutor ").borders(Borders::ALL))
        .alignment(Alignment::Left);
    f.render_widget(p, area);
}

fn status_span(status: ReviewStatus) -> Span<'static> {
    match status {
        ReviewStatus::Overdue => Span::styled("overdue", Style::default().fg(Color::Red)),
        ReviewStatus::DueToday => Span::styled("due today", Style::default().fg(Color::Yellow)),
        ReviewStatus::Scheduled => Span::styled("scheduled", Style::default().fg(Color::Green)),
    }
}

fn draw_disciplines(f: &mut Frame, app: &App, area: Rect) {
    let show_weights = app.data.settings.show_weights;

    let mut titles = vec!["Discipline"];
    if show_weights {
        titles.push("Weight");
    }
    titles.extend(["Avg", "Weak", "Priority", "Next review", "Status"]);
    let header = Row::new(titles).style(Style::default().add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = app
        .ranked()
        .into_iter()
        .enumerate()
        .map(|(i, d)| {
            let avg = match scoring::discipline_average(d) {
                Some(avg) => format!("{avg}%"),
                None => "--".to_string(),
            };
            let next = d
                .next_review
                .map(|n| n.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "--".to_string());

            let mut cells = vec![Cell::from(d.name.clone())];
            if show_weights {
                cells.push(Cell::from(d.weight.to_string()));
            }
            cells.extend([
                Cell::from(avg),
                Cell::from(scoring::weak_topics(d).len().to_string()),
                Cell::from(format!("{:.0}", scoring::priority_score(d))),
                Cell::from(next),
                Cell::from(status_span(app.status_of(d))),
            ]);

            let row = Row::new(cells);
            if i == app.selected {
                row.style(Style::default().add_modifier(Modifier::REVERSED))
            } else {
                row
            }
        })
        .collect();

    let mut widths = vec![Constraint::Min(20)];
    if show_weights {
        widths.push(Constraint::Length(6));
    }
    widths.extend([
        Constraint::Length(5),
        Constraint::Length(5),
        Constraint::Length(8),
        Constraint::Length(12),
        Constraint::Length(10),
    ]);

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(" Disciplines by priority ")
                .borders(Borders::ALL),
        );

    f.render_widget(table, area);
}

fn draw_weak_topics(f: &mut Frame, app: &App, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();
    for discipline in app.ranked() {
        let weak = scoring::weak_topics(discipline);
        if weak.is_empty() {
            continue;
        }
        lines.push(Line::from(Span::styled(
            format!("{} (weight {})", discipline.name, discipline.weight),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for topic in weak {
            lines.push(Line::from(format!(
                "  {} - {}% over {} questions",
                topic.text, topic.performance.average_score, topic.performance.total_questions
            )));
        }
    }
    if lines.is_empty() {
        lines.push(Line::from("No weak topics. Keep practicing to find them."));
    }

    let p = Paragraph::new(lines).block(
        Block::default()
            .title(" Weak topics ")
            .borders(Borders::ALL),
    );
    f.render_widget(p, area);
}

fn draw_history(f: &mut Frame, app: &App, area: Rect) {
    let mut lines: Vec<Line> = app
        .data
        .review_history
        .iter()
        .rev()
        .take(20)
        .map(|e| {
            Line::from(format!(
                "{}  reviewed {}",
                e.date.format("%Y-%m-%d %H:%M"),
                e.discipline_name
            ))
        })
        .collect();
    if lines.is_empty() {
        lines.push(Line::from("No reviews recorded yet."));
    }

    let p = Paragraph::new(lines).block(
        Block::default()
            .title(" Review history ")
            .borders(Borders::ALL),
    );
    f.render_widget(p, area);
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    let text = match &app.notice {
        Some(notice) => Line::from(Span::styled(
            notice.clone(),
            Style::default().fg(Color::Green),
        )),
        None => Line::from(Span::styled(
            "Up/Down select | r review | a auto-schedule | Tab view | q quit",
            Style::default().fg(Color::Gray),
        )),
    };
    f.render_widget(Paragraph::new(text), area);
}
