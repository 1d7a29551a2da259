use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use time::{macros::format_description, OffsetDateTime};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::state::{BlogViewState, NoticeLevel, OverlayState, Row};
use crate::posts::PostRecord;
use crate::providers::ReadStateProvider;

pub fn draw_app(
    frame: &mut Frame,
    state: &BlogViewState,
    reads: &dyn ReadStateProvider,
    list_state: &mut ListState,
) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(frame.size());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(vertical[0]);

    let list_width = columns[0].width.saturating_sub(8) as usize;
    let mut items = Vec::new();
    if state.is_loading() {
        items.push(ListItem::new("Loading..."));
    } else if state.grouped().is_empty() {
        items.push(ListItem::new("No posts yet"));
    } else {
        for row in state.rows() {
            items.push(match row {
                Row::Header { label, count, .. } => ListItem::new(Line::from(vec![
                    Span::styled(
                        label.to_string(),
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(format!(" ({count})"), Style::default().fg(Color::Gray)),
                ])),
                Row::Post(post) => ListItem::new(post_line(state, reads, post, list_width)),
            });
        }
    }

    let list_title = if state.is_editing() {
        format!("Posts by {} [EDIT]", state.display_mode().title())
    } else {
        format!("Posts by {}", state.display_mode().title())
    };
    let list_border = if state.is_editing() {
        Style::default().fg(Color::Magenta)
    } else {
        Style::default().fg(Color::Cyan)
    };
    let list = List::new(items)
        .block(
            Block::default()
                .title(list_title)
                .borders(Borders::ALL)
                .border_style(list_border),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(list, columns[0], list_state);

    let detail_text = state
        .current_post()
        .map(|post| post_detail(post, reads.is_read(&post.slug)))
        .unwrap_or_else(|| Text::from("Select a post to see its details."));
    let detail = Paragraph::new(detail_text)
        .block(Block::default().title("Post").borders(Borders::ALL))
        .wrap(Wrap { trim: false });
    frame.render_widget(Clear, columns[1]);
    frame.render_widget(detail, columns[1]);

    let status = Paragraph::new(build_status_line(state))
        .block(Block::default().borders(Borders::TOP))
        .style(Style::default().fg(Color::Gray));
    frame.render_widget(status, vertical[1]);

    render_overlay(frame, state);
}

fn post_line(
    state: &BlogViewState,
    reads: &dyn ReadStateProvider,
    post: &PostRecord,
    width: usize,
) -> Line<'static> {
    let mut spans = Vec::with_capacity(3);
    if state.is_editing() {
        let marker = if state.is_selected(&post.slug) {
            "[x] "
        } else {
            "[ ] "
        };
        spans.push(Span::styled(marker, Style::default().fg(Color::Magenta)));
    }
    let read = reads.is_read(&post.slug);
    let title_style = if read {
        Style::default().fg(Color::Gray)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };
    spans.push(Span::styled(if read { "  " } else { "• " }, title_style));
    spans.push(Span::styled(truncate_to_width(post.title(), width), title_style));
    Line::from(spans)
}

fn post_detail(post: &PostRecord, read: bool) -> Text<'static> {
    let label = Style::default().fg(Color::Gray);
    let mut lines = vec![
        Line::from(Span::styled(
            post.title().to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled("Slug: ", label),
            Span::raw(post.slug.clone()),
        ]),
        Line::from(vec![
            Span::styled("Date: ", label),
            Span::raw(
                post.parsed_date()
                    .map(format_date)
                    .unwrap_or_else(|| format!("{} (unparsed)", post.date)),
            ),
        ]),
        Line::from(vec![
            Span::styled("Category: ", label),
            Span::raw(post.category_or_default().to_string()),
        ]),
    ];
    let tags = post.tags();
    if !tags.is_empty() {
        lines.push(Line::from(vec![
            Span::styled("Tags: ", label),
            Span::styled(tags.join(", "), Style::default().fg(Color::Cyan)),
        ]));
    }
    lines.push(Line::from(Span::styled(
        if read { "Read" } else { "Unread" },
        Style::default().add_modifier(Modifier::ITALIC),
    )));
    if let Some(summary) = post.summary() {
        lines.push(Line::from(""));
        lines.extend(summary.lines().map(|line| Line::from(line.to_string())));
    }
    Text::from(lines)
}

fn build_status_line(state: &BlogViewState) -> Text<'static> {
    let mut spans = vec![
        Span::raw(format!("Posts: {} ", state.display_items().len())),
        Span::raw(" | Mode: "),
        Span::styled(
            state.display_mode().title(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ];
    if state.is_editing() {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            "EDIT",
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(format!(" | Selected: {}", state.selected_count())));
        let pending = state.pending_removals().len();
        if pending > 0 {
            spans.push(Span::styled(
                format!(" | Pending removals: {pending}"),
                Style::default().fg(Color::Yellow),
            ));
        }
    }
    if state.is_saving() {
        spans.push(Span::raw(" | Saving..."));
    }
    if let Some(notice) = state.notice() {
        let style = match notice.level {
            NoticeLevel::Info => Style::default().fg(Color::White),
            NoticeLevel::Success => Style::default().fg(Color::Green),
            NoticeLevel::Error => Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::BOLD),
        };
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(notice.message.clone(), style));
    }
    Text::from(Line::from(spans))
}

fn render_overlay(frame: &mut Frame, state: &BlogViewState) {
    let (title, heading, input, hint) = match state.overlay() {
        Some(OverlayState::Categories(input)) => {
            let known = if state.categories().is_empty() {
                "No categories yet".to_string()
            } else {
                state.categories().join(", ")
            };
            (
                "Categories",
                known,
                input,
                "Enter to add • Esc to close • saved with the next save",
            )
        }
        Some(OverlayState::ImportKey(input)) => (
            "Import Key",
            "Path to the private key (.pem)".to_string(),
            input,
            "Enter to import • Esc to cancel",
        ),
        None => return,
    };
    let area = centered_rect(60, 30, frame.size());
    frame.render_widget(Clear, area);
    let mut display = input.value.clone();
    display.push('▌');
    let paragraph = Paragraph::new(vec![
        Line::from(Span::styled(
            heading,
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(display),
        Line::from(""),
        Line::from(Span::styled(hint, Style::default().fg(Color::Gray))),
    ])
    .block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    )
    .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn format_date(dt: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]");
    dt.format(format).unwrap_or_else(|_| dt.to_string())
}

/// Cuts `text` to at most `width` terminal columns, ending in an ellipsis
/// when shortened.
fn truncate_to_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let w = grapheme.width();
        if used + w + 1 > width {
            break;
        }
        out.push_str(grapheme);
        used += w;
    }
    out.push('…');
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}
