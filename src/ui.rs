pub mod screen;

use std::time::Instant;

use pomonotes::{
    controller::NoticeLevel,
    history::{self, HistoryEntry, HistoryStatus},
    notes::SaveStatus,
    timer::{format_clock, Phase},
};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Widget, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::{App, Focus, Prompt};

const HORIZONTAL_MARGIN: u16 = 2;

/// Timer screen: phase, clock, progress, pomodoro dots and the notes pane.
impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let now = Instant::now();
        let controller = &self.controller;
        let timer = controller.timer();

        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);
        let phase_color = match timer.phase() {
            Phase::Idle => Color::Gray,
            Phase::Work => Color::Red,
            Phase::ShortBreak => Color::Green,
            Phase::LongBreak => Color::Blue,
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Length(1), // session title
                Constraint::Length(6), // clock
                Constraint::Length(1), // progress
                Constraint::Length(1), // pomodoro dots
                Constraint::Length(1), // status line
                Constraint::Min(5),    // notes
                Constraint::Length(1), // legend
            ])
            .split(area);

        let title = match controller.lifecycle().active() {
            Some(active) => Line::from(vec![
                Span::styled("Studying: ", italic_style),
                Span::styled(active.name.clone(), bold_style),
            ]),
            None => Line::from(Span::styled("Pomonotes", bold_style)),
        };
        Paragraph::new(title)
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        let mut clock_style = Style::default().fg(phase_color).patch(bold_style);
        if controller.cue_active(now) {
            clock_style = clock_style.add_modifier(Modifier::REVERSED);
        }
        let clock = Paragraph::new(vec![
            Line::from(Span::styled(timer.phase().to_string(), clock_style)),
            Line::from(""),
            Line::from(Span::styled(
                format_clock(timer.time_remaining()),
                Style::default().patch(bold_style),
            )),
        ])
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
        clock.render(chunks[1], buf);

        Gauge::default()
            .gauge_style(Style::default().fg(phase_color))
            .ratio(timer.progress().clamp(0.0, 1.0))
            .label("")
            .render(chunks[2], buf);

        let every = timer.durations().long_break_every.max(1);
        let completed = timer.completed_pomodoros();
        let filled = match completed % every {
            0 if completed > 0 => every,
            n => n,
        };
        let dots: Vec<Span> = (0..every)
            .map(|i| {
                if i < filled {
                    Span::styled("● ", Style::default().fg(Color::Red))
                } else {
                    Span::styled("○ ", Style::default().add_modifier(Modifier::DIM))
                }
            })
            .chain([Span::styled(
                format!(
                    " {} completed / {} interrupted",
                    completed,
                    timer.interrupted_pomodoros()
                ),
                italic_style,
            )])
            .collect();
        Paragraph::new(Line::from(dots))
            .alignment(Alignment::Center)
            .render(chunks[3], buf);

        Paragraph::new(Span::styled(controller.status_line(), italic_style))
            .alignment(Alignment::Center)
            .render(chunks[4], buf);

        render_notes(self, chunks[5], buf, now);

        let legend = if self.focus == Focus::Notes {
            "(ctrl+s) save / (esc) back"
        } else {
            "(n)ew / (space) start-pause / (s)kip / (i)nterrupt / (e)nd / (tab) notes / (h)istory / (q)uit"
        };
        Paragraph::new(Span::styled(legend, italic_style)).render(chunks[6], buf);
    }
}

fn render_notes(app: &App, area: Rect, buf: &mut Buffer, now: Instant) {
    let notes = app.controller.notes();

    let (indicator, indicator_style) = match notes.status(now) {
        SaveStatus::Idle => ("", Style::default()),
        SaveStatus::Saving => ("Saving...", Style::default().fg(Color::Yellow)),
        SaveStatus::Saved => ("Saved", Style::default().fg(Color::Green)),
        SaveStatus::Error => (
            "Save failed",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
    };
    let title = Line::from(vec![
        Span::raw(format!(" Notes ({} chars) ", notes.char_count())),
        Span::styled(indicator, indicator_style),
    ]);

    let border_style = match (app.focus, notes.is_enabled()) {
        (Focus::Notes, true) => Style::default().fg(Color::Cyan),
        (_, false) => Style::default().add_modifier(Modifier::DIM),
        _ => Style::default(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title);

    let body = if notes.is_enabled() {
        let mut text = notes.text().to_string();
        if app.focus == Focus::Notes {
            text.push('▏');
        }
        text
    } else {
        "Start a session to take notes.".to_string()
    };

    // Keep the end of long notes in view, counting wrapped rows.
    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2) as usize;
    let paragraph = Paragraph::new(body).wrap(Wrap { trim: false });
    let scroll = paragraph
        .line_count(inner_width)
        .saturating_sub(inner_height) as u16;

    paragraph
        .block(block)
        .scroll((scroll, 0))
        .render(area, buf);
}

pub fn render_history(app: &App, f: &mut Frame) {
    let area = f.area();
    let browser = app.controller.history();
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Study History ");

    let message = match browser.status() {
        HistoryStatus::NotLoaded | HistoryStatus::Loading => Some("Loading sessions..."),
        HistoryStatus::Empty => Some(history::EMPTY_HISTORY_MESSAGE),
        HistoryStatus::Failed(message) => Some(message.as_str()),
        HistoryStatus::Loaded => None,
    };

    match message {
        Some(message) => {
            let style = if matches!(browser.status(), HistoryStatus::Failed(_)) {
                Style::default().fg(Color::Red)
            } else {
                italic_style
            };
            f.render_widget(
                Paragraph::new(Span::styled(message, style))
                    .block(block)
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true }),
                chunks[0],
            );
        }
        None => {
            let items: Vec<ListItem> = browser.entries().iter().map(history_item).collect();
            let list = List::new(items)
                .block(block)
                .highlight_style(Style::default().bg(Color::DarkGray));
            let mut state = ListState::default().with_selected(Some(browser.selected()));
            f.render_stateful_widget(list, chunks[0], &mut state);
        }
    }

    let legend = if browser.detail().is_some() {
        "(d)elete / e(x)port / (esc) close"
    } else {
        "(↑/↓) select / (enter) details / (r)eload / (t)imer"
    };
    f.render_widget(Paragraph::new(Span::styled(legend, italic_style)), chunks[1]);

    if let Some(session) = browser.detail() {
        let modal = centered_rect(70, 70, area);
        let date = session
            .created_at
            .map(history::format_detail_date)
            .unwrap_or_default();
        let date = if session.is_completed() {
            date
        } else {
            format!("{date}  (in progress)")
        };
        let mut lines = vec![
            Line::from(Span::styled(
                date,
                Style::default().add_modifier(Modifier::ITALIC),
            )),
            Line::from(format!(
                "{} min   {} Pomodoros   {} interrupted",
                session.total_duration, session.pomodoros_completed, session.pomodoros_interrupted
            )),
            Line::from(""),
        ];
        lines.extend(history::detail_notes(session).lines().map(Line::from));

        f.render_widget(Clear, modal);
        f.render_widget(
            Paragraph::new(lines)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(format!(" {} ", session.session_name)),
                )
                .wrap(Wrap { trim: false }),
            modal,
        );
    }
}

fn history_item(entry: &HistoryEntry) -> ListItem<'static> {
    ListItem::new(vec![
        Line::from(vec![
            Span::styled(
                entry.name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("  {}  {}", entry.duration, entry.pomodoros)),
            Span::styled(
                format!("  {}", entry.date),
                Style::default().add_modifier(Modifier::DIM),
            ),
        ]),
        Line::from(Span::styled(
            format!("  {}", entry.preview.replace('\n', " ")),
            Style::default().add_modifier(Modifier::ITALIC),
        )),
    ])
}

/// Prompt modal and the transient notice bar, drawn over any screen.
pub fn render_overlays(app: &App, f: &mut Frame, now: Instant) {
    let area = f.area();

    if let Some(notice) = app.controller.notice(now) {
        let style = match notice.level {
            NoticeLevel::Info => Style::default().fg(Color::Black).bg(Color::Green),
            NoticeLevel::Error => Style::default().fg(Color::White).bg(Color::Red),
        };
        let bar = Rect {
            y: area.y + area.height.saturating_sub(1),
            height: area.height.min(1),
            ..area
        };
        f.render_widget(Clear, bar);
        f.render_widget(
            Paragraph::new(Span::styled(notice.message.as_str(), style))
                .alignment(Alignment::Center)
                .style(style),
            bar,
        );
    }

    let Some(prompt) = &app.prompt else {
        return;
    };
    let (title, body) = match prompt {
        Prompt::SessionName(name) => (
            " New study session ",
            format!("What are you studying?\n\n> {name}▏\n\n(enter) start / (esc) cancel"),
        ),
        Prompt::Confirm(confirm) => (
            " Confirm ",
            format!("{}\n\n(y)es / (n)o", confirm.question()),
        ),
    };

    let widest = body.lines().map(UnicodeWidthStr::width).max().unwrap_or(0) as u16;
    let width = (widest + 4).max(30).min(area.width);
    let height = (body.lines().count() as u16 + 2).min(area.height);
    let modal = Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    };

    f.render_widget(Clear, modal);
    f.render_widget(
        Paragraph::new(body)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow))
                    .title(title),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: false }),
        modal,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
