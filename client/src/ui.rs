use chat_shared::{FeedbackKind, Message, Role};
use chrono::Local;
use ratatui::layout::Flex;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};

use crate::app::App;

const TITLE: &str = "Adaptive Chatbot";
const KEY_HINTS: &str =
    "Enter send | Up/Down select reply | ^U/^D rate | ^P personality | ^N new | ^O history | Esc quit";

pub fn render(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);
    render_messages(f, app, chunks[1]);
    render_input(f, app, chunks[2]);
    render_status(f, app, chunks[3]);

    if app.state().show_conversations {
        render_history(f, app);
    } else if let Some(cursor) = app.view.personality_cursor {
        render_personalities(f, app, cursor);
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let personality = app
        .state()
        .active_configuration()
        .map(|config| config.name.as_str())
        .unwrap_or("none");
    let header = Line::from(vec![
        Span::styled(TITLE, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("  Personality: "),
        Span::styled(personality, Style::default().fg(Color::Cyan)),
    ]);
    f.render_widget(Paragraph::new(header), area);
}

fn message_item(message: &Message) -> ListItem<'_> {
    let (label, style) = match message.role {
        Role::User => ("You: ", Style::default().fg(Color::Green)),
        Role::Assistant => ("Bot: ", Style::default().fg(Color::Cyan)),
        Role::System => ("! ", Style::default().fg(Color::Red)),
    };

    let mut lines: Vec<Line> = Vec::new();
    for (i, text) in message.content.lines().enumerate() {
        let prefix = if i == 0 { label } else { "     " };
        lines.push(Line::from(vec![Span::styled(prefix, style), Span::raw(text)]));
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(label, style)));
    }

    if message.is_rateable() {
        let marker = match message.feedback {
            Some(FeedbackKind::ThumbsUp) => Span::styled("     [👍]", Style::default().fg(Color::Green)),
            Some(FeedbackKind::ThumbsDown) => Span::styled("     [👎]", Style::default().fg(Color::Red)),
            None => Span::styled("     [rate: ^U/^D]", Style::default().fg(Color::DarkGray)),
        };
        lines.push(Line::from(marker));
    }
    ListItem::new(lines)
}

fn render_messages(f: &mut Frame, app: &App, area: Rect) {
    let state = app.state();
    let mut items: Vec<ListItem> = state.messages.iter().map(message_item).collect();
    if state.is_loading() {
        items.push(ListItem::new(Line::from(vec![
            Span::styled("Bot: ", Style::default().fg(Color::Cyan)),
            Span::styled("thinking...", Style::default().add_modifier(Modifier::ITALIC)),
        ])));
    }

    let title = match state.current_conversation_id {
        Some(id) => format!("Conversation #{id}"),
        None => "New conversation".to_string(),
    };

    // Without an explicit selection, select the last row so the list follows
    // the newest message, but do not highlight it.
    let explicit = app.view.selected_reply;
    let highlight = if explicit.is_some() {
        Style::default().add_modifier(Modifier::REVERSED)
    } else {
        Style::default()
    };
    let mut list_state =
        ListState::default().with_selected(explicit.or(items.len().checked_sub(1)));

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(highlight);
    f.render_stateful_widget(list, area, &mut list_state);
}

fn render_input(f: &mut Frame, app: &App, area: Rect) {
    let state = app.state();
    let (title, style) = if state.is_loading() {
        ("Waiting for reply", Style::default().fg(Color::DarkGray))
    } else {
        ("Type your message...", Style::default())
    };

    let input = Paragraph::new(state.input.as_str())
        .style(style)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: true });
    f.render_widget(input, area);
}

fn render_status(f: &mut Frame, app: &App, area: Rect) {
    let line = match &app.view.status {
        Some(status) => Line::from(vec![
            Span::styled(status.as_str(), Style::default().fg(Color::Yellow)),
            Span::raw("  "),
            Span::styled(KEY_HINTS, Style::default().fg(Color::DarkGray)),
        ]),
        None => Line::from(Span::styled(KEY_HINTS, Style::default().fg(Color::DarkGray))),
    };
    f.render_widget(Paragraph::new(line), area);
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
    let horizontal =
        Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
    let [area] = vertical.areas(area);
    let [area] = horizontal.areas(area);
    area
}

fn render_history(f: &mut Frame, app: &App) {
    let area = popup_area(f.area(), 70, 70);
    let conversations = &app.state().conversations;

    let items: Vec<ListItem> = if conversations.is_empty() {
        vec![ListItem::new("No previous conversations")]
    } else {
        conversations
            .iter()
            .map(|conversation| {
                let updated = conversation
                    .updated_at
                    .0
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M");
                ListItem::new(vec![
                    Line::from(Span::styled(
                        conversation.display_title().to_string(),
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                    Line::from(format!(
                        "  {updated} | {} messages",
                        conversation.message_count
                    )),
                ])
            })
            .collect()
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Previous Conversations (Enter open, Esc close)"),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut list_state = ListState::default()
        .with_selected((!conversations.is_empty()).then_some(app.view.history_cursor));

    f.render_widget(Clear, area);
    f.render_stateful_widget(list, area, &mut list_state);
}

fn render_personalities(f: &mut Frame, app: &App, cursor: usize) {
    let area = popup_area(f.area(), 50, 50);
    let configurations = &app.state().configurations;

    let items: Vec<ListItem> = if configurations.is_empty() {
        vec![ListItem::new("Loading personalities...")]
    } else {
        configurations
            .iter()
            .map(|config| {
                let mut spans = vec![Span::raw(config.name.clone())];
                if config.is_active {
                    spans.push(Span::styled(" (Active)", Style::default().fg(Color::Green)));
                }
                if let Some(description) = &config.description {
                    spans.push(Span::styled(
                        format!("  {description}"),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
                ListItem::new(Line::from(spans))
            })
            .collect()
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Personality (Enter switch, Esc close)"),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut list_state =
        ListState::default().with_selected((!configurations.is_empty()).then_some(cursor));

    f.render_widget(Clear, area);
    f.render_stateful_widget(list, area, &mut list_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use crate::app_event::{AppEvent, AppEventSender};
    use chat_shared::{
        Configuration, ConfigurationId, Conversation, ConversationId, MessageId, Timestamp,
    };
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use tokio::sync::mpsc::unbounded_channel;

    fn test_app() -> App {
        let (tx, _rx) = unbounded_channel();
        let api = ApiClient::new("http://127.0.0.1:9").expect("client");
        App::new(api, AppEventSender::new(tx))
    }

    fn draw(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 24)).expect("terminal");
        terminal.draw(|f| render(f, app)).expect("draw");
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn renders_loaded_conversation_with_rating_hint() {
        let mut app = test_app();
        app.handle_event(AppEvent::ConversationLoaded {
            id: ConversationId::new(4),
            messages: vec![
                Message::user("What is Rust?"),
                Message::assistant(MessageId::new(9), "A systems language."),
            ],
        });

        let screen = draw(&app);

        assert!(screen.contains("Conversation #4"));
        assert!(screen.contains("You: What is Rust?"));
        assert!(screen.contains("Bot: A systems language."));
        assert!(screen.contains("[rate: ^U/^D]"));
    }

    #[test]
    fn history_overlay_lists_titles_with_fallback() {
        let mut app = test_app();
        let now = Timestamp::now();
        app.handle_event(AppEvent::ConversationsListed(vec![
            Conversation {
                id: ConversationId::new(1),
                title: Some("Trip plans".into()),
                created_at: now,
                updated_at: now,
                message_count: 6,
            },
            Conversation {
                id: ConversationId::new(2),
                title: None,
                created_at: now,
                updated_at: now,
                message_count: 2,
            },
        ]));

        let screen = draw(&app);

        assert!(screen.contains("Previous Conversations"));
        assert!(screen.contains("Trip plans"));
        assert!(screen.contains("Untitled Conversation"));
        assert!(screen.contains("6 messages"));
    }

    #[test]
    fn header_names_active_personality() {
        let mut app = test_app();
        app.handle_event(AppEvent::ConfigurationsLoaded(vec![Configuration {
            id: ConfigurationId::new(1),
            name: "Friendly".into(),
            description: None,
            version: 1,
            is_active: true,
            tags: Default::default(),
            updated_at: Timestamp::now(),
        }]));

        assert!(draw(&app).contains("Personality: Friendly"));
    }
}
