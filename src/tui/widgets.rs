//! TUI widget rendering: history list, outline, context panel, messages, input.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

use crate::graph::Graph;
use crate::message::Message;
use crate::render::{hex_to_rgb, node_color};
use crate::session::SessionState;

/// Which pane receives keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Input,
    History,
}

/// Everything one frame draws.
pub struct View<'a> {
    pub state: &'a SessionState,
    pub messages: &'a [Message],
    pub input: &'a str,
    pub focus: Focus,
    pub selected: usize,
    pub show_raw: bool,
    pub busy: Option<&'a str>,
    pub model: &'a str,
}

/// Render a single Message as a styled Line.
pub fn message_to_line(msg: &Message) -> Line<'static> {
    match msg {
        Message::Stage { stage, detail } => {
            let mut spans = vec![Span::styled(
                format!("[{stage}] "),
                Style::default().fg(Color::Cyan),
            )];
            if let Some(d) = detail {
                spans.push(Span::raw(d.clone()));
            }
            Line::from(spans)
        }
        Message::Notice { notice } => Line::from(vec![
            Span::styled("[notice] ", Style::default().fg(Color::Yellow)),
            Span::raw(notice.to_string()),
        ]),
        Message::Issue { text } => Line::from(vec![
            Span::styled("[issue] ", Style::default().fg(Color::Magenta)),
            Span::raw(text.clone()),
        ]),
        Message::MapReady {
            query,
            refined_query,
            nodes,
            edges,
        } => Line::from(vec![
            Span::styled("[map] ", Style::default().fg(Color::Green)),
            Span::styled(query.clone(), Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(
                format!(" ({refined_query}) {nodes} nodes, {edges} edges"),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        Message::System { text } => Line::from(vec![Span::styled(
            text.clone(),
            Style::default().fg(Color::DarkGray),
        )]),
        Message::Error {
            code,
            message,
            help,
            raw,
        } => {
            let mut spans = vec![
                Span::styled(
                    format!("[error:{code}] "),
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ),
                Span::raw(message.clone()),
            ];
            if let Some(h) = help {
                spans.push(Span::styled(
                    format!(" (help: {h})"),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            if raw.is_some() {
                spans.push(Span::styled(
                    " /raw shows the model output",
                    Style::default().fg(Color::DarkGray),
                ));
            }
            Line::from(spans)
        }
    }
}

/// Outline rows colored by level.
pub fn outline_to_lines(graph: &Graph) -> Vec<Line<'static>> {
    graph
        .outline()
        .into_iter()
        .map(|row| {
            let node = &graph.nodes[row.node];
            let color = hex_to_rgb(node_color(node.level))
                .map(|(r, g, b)| Color::Rgb(r, g, b))
                .unwrap_or(Color::Green);
            let mut style = Style::default().fg(color);
            if node.importance >= 4 {
                style = style.add_modifier(Modifier::BOLD);
            }
            let mut spans = vec![
                Span::raw("  ".repeat(row.depth)),
                Span::styled(if row.depth == 0 { "◆ " } else { "• " }, style),
                Span::styled(node.label.clone(), style),
                Span::styled(
                    format!(" {}", "★".repeat(usize::from(node.importance))),
                    Style::default().fg(Color::DarkGray),
                ),
            ];
            if let Some(ref d) = node.description {
                spans.push(Span::styled(
                    format!("  {d}"),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            Line::from(spans)
        })
        .collect()
}

/// Main TUI layout rendering.
pub fn render(frame: &mut Frame, view: &View<'_>) {
    let [header_area, body_area, messages_area, input_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(6),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    let [history_area, map_area] =
        Layout::horizontal([Constraint::Percentage(25), Constraint::Fill(1)]).areas(body_area);
    let [outline_area, detail_area] =
        Layout::vertical([Constraint::Fill(2), Constraint::Fill(1)]).areas(map_area);

    // Header.
    let title = if view.state.current_query.is_empty() {
        String::new()
    } else {
        format!(" :: {}", view.state.current_query)
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            " knowtree ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(title),
    ]));
    frame.render_widget(header, header_area);

    render_history(frame, history_area, view);
    render_outline(frame, outline_area, view);
    render_detail(frame, detail_area, view);

    // Messages, newest at the bottom.
    let height = messages_area.height.saturating_sub(2) as usize;
    let skip = view.messages.len().saturating_sub(height);
    let lines: Vec<Line> = view.messages[skip..].iter().map(message_to_line).collect();
    let messages_widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: false });
    frame.render_widget(messages_widget, messages_area);

    // Input.
    let input_style = if view.focus == Focus::Input {
        Style::default().fg(Color::White)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let input_widget = Paragraph::new(view.input)
        .block(Block::default().borders(Borders::ALL).title(" topic > "))
        .style(input_style);
    frame.render_widget(input_widget, input_area);

    // Status bar.
    let activity = match view.busy {
        Some(topic) => Span::styled(
            format!(" generating \"{topic}\"... "),
            Style::default().fg(Color::Yellow),
        ),
        None => Span::styled(" ready ", Style::default().fg(Color::DarkGray)),
    };
    let subscription = if view.state.is_subscribed {
        "subscribed"
    } else {
        "not subscribed"
    };
    let status = Paragraph::new(Line::from(vec![
        activity,
        Span::raw("| "),
        Span::styled(
            format!("model: {} ", view.model),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw("| "),
        Span::styled(
            format!("history: {} ", view.state.history.len()),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw("| "),
        Span::styled(
            format!("{subscription} "),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw("| "),
        Span::styled(
            "Tab focus · /raw · /html · /quit",
            Style::default().fg(Color::DarkGray),
        ),
    ]));
    frame.render_widget(status, status_area);
}

fn render_history(frame: &mut Frame, area: Rect, view: &View<'_>) {
    let items: Vec<ListItem> = view
        .state
        .history
        .labels()
        .into_iter()
        .map(|label| ListItem::new(label.to_string()))
        .collect();

    let border = if view.focus == Focus::History {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
    };
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(" history "),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");

    let mut state = ListState::default();
    if !view.state.history.is_empty() {
        state.select(Some(view.selected));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_outline(frame: &mut Frame, area: Rect, view: &View<'_>) {
    let block = Block::default().borders(Borders::ALL).title(" mind map ");
    let widget = match view.state.current_graph {
        Some(ref graph) if !graph.is_empty() => Paragraph::new(outline_to_lines(graph)),
        _ => Paragraph::new(Line::from(Span::styled(
            crate::render::PLACEHOLDER,
            Style::default().fg(Color::DarkGray),
        ))),
    };
    frame.render_widget(widget.block(block).wrap(Wrap { trim: false }), area);
}

fn render_detail(frame: &mut Frame, area: Rect, view: &View<'_>) {
    let (title, text) = if view.show_raw {
        (
            " raw model output ",
            view.state.last_raw_response.as_deref().unwrap_or(""),
        )
    } else {
        (" knowledge ", view.state.current_knowledge_context.as_str())
    };
    let widget = Paragraph::new(text.to_string())
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, area);
}
