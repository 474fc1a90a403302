use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Cell, List, ListItem, Paragraph, Row, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Table, Wrap,
    },
};
use watchpost_core::{Activity, ChatMode};

use crate::app::{App, FocusPane, FormField, InputMode, Screen, ToastKind};

/// Parse a line of text and convert **bold** markdown to styled spans.
/// Single asterisks are left as literal text.
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.char_indices().peekable();
    let mut current_text = String::new();

    while let Some((_, c)) = chars.next() {
        if c == '*' {
            // Check for ** (bold)
            if chars.peek().map(|(_, c)| *c) == Some('*') {
                // Consume the second *
                chars.next();

                // Push any accumulated plain text
                if !current_text.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut current_text)));
                }

                // Find closing **
                let mut bold_text = String::new();
                let mut found_close = false;

                while let Some((_, c)) = chars.next() {
                    if c == '*' && chars.peek().map(|(_, c)| *c) == Some('*') {
                        chars.next(); // consume second *
                        found_close = true;
                        break;
                    }
                    bold_text.push(c);
                }

                if found_close && !bold_text.is_empty() {
                    spans.push(Span::styled(
                        bold_text,
                        Style::default().add_modifier(Modifier::BOLD),
                    ));
                } else {
                    // No closing **, treat as literal
                    current_text.push_str("**");
                    current_text.push_str(&bold_text);
                }
            } else {
                current_text.push(c);
            }
        } else {
            current_text.push(c);
        }
    }

    // Push any remaining text
    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Cameras => render_cameras_screen(app, frame, body_area),
        Screen::Analytics => render_analytics_screen(app, frame, body_area),
        Screen::Transcripts => render_transcripts_screen(app, frame, body_area),
        Screen::Chat => render_chat_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    // Render popups (in order of priority)
    if app.camera_form.is_some() {
        render_camera_form(app, frame, area);
    } else if app.show_camera_picker {
        render_camera_picker(app, frame, area);
    }

    // The warning modal and toast stack sit above everything else
    if app.warning.is_some() {
        render_warning(app, frame, area);
    }
    render_toasts(app, frame, area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::styled(" Watchpost ", Style::default().fg(Color::Cyan).bold()),
        Span::raw(" "),
    ];

    for (screen, label) in [
        (Screen::Cameras, " 1 Cameras "),
        (Screen::Analytics, " 2 Analytics "),
        (Screen::Transcripts, " 3 Transcripts "),
        (Screen::Chat, " 4 Chat "),
    ] {
        let style = if app.screen == screen {
            Style::default().bg(Color::Blue).fg(Color::White).bold()
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(label, style));
    }

    spans.push(Span::raw(" "));
    spans.push(Span::styled(
        format!("v{}", env!("CARGO_PKG_VERSION")),
        Style::default().fg(Color::DarkGray),
    ));

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.screen {
        Screen::Cameras => " CAMERAS ",
        Screen::Analytics => " ANALYTICS ",
        Screen::Transcripts => " TRANSCRIPTS ",
        Screen::Chat => " CHAT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match (app.screen, app.input_mode) {
        (Screen::Cameras, InputMode::Normal) => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" nav ", label_style),
            Span::styled(" a ", key_style),
            Span::styled(" add ", label_style),
            Span::styled(" e ", key_style),
            Span::styled(" edit ", label_style),
            Span::styled(" m ", key_style),
            Span::styled(" monitoring ", label_style),
            Span::styled(" r ", key_style),
            Span::styled(" refresh ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
        (Screen::Cameras, InputMode::Editing) => vec![
            Span::styled(" Tab ", key_style),
            Span::styled(" field ", label_style),
            Span::styled(" Space ", key_style),
            Span::styled(" toggle ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" save ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" cancel ", label_style),
        ],
        (Screen::Analytics, InputMode::Normal) => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" nav ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" load ", label_style),
            Span::styled(" r ", key_style),
            Span::styled(" refresh ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
        (Screen::Transcripts, InputMode::Normal) => vec![
            Span::styled(" Tab ", key_style),
            Span::styled(" focus ", label_style),
            Span::styled(" j/k ", key_style),
            Span::styled(" nav ", label_style),
            Span::styled(" h/l ", key_style),
            Span::styled(" activity ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" load ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
        (Screen::Chat, InputMode::Normal) => {
            if app.show_camera_picker {
                vec![
                    Span::styled(" j/k ", key_style),
                    Span::styled(" nav ", label_style),
                    Span::styled(" Enter ", key_style),
                    Span::styled(" select ", label_style),
                    Span::styled(" Esc ", key_style),
                    Span::styled(" close ", label_style),
                ]
            } else {
                vec![
                    Span::styled(" h/l ", key_style),
                    Span::styled(" mode ", label_style),
                    Span::styled(" c ", key_style),
                    Span::styled(" camera ", label_style),
                    Span::styled(" i ", key_style),
                    Span::styled(" type ", label_style),
                    Span::styled(" j/k ", key_style),
                    Span::styled(" scroll ", label_style),
                    Span::styled(" w ", key_style),
                    Span::styled(" frames ", label_style),
                    Span::styled(" q ", key_style),
                    Span::styled(" quit ", label_style),
                ]
            }
        }
        (Screen::Chat, InputMode::Editing) => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" stop typing ", label_style),
        ],
        _ => vec![],
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_cameras_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    app.roster_area = None;
    app.content_area = Some(area);
    app.chat_input_area = None;

    let title = if app.cameras_loading {
        " Cameras (loading) ".to_string()
    } else {
        format!(" Cameras ({}) ", app.cameras.len())
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title);

    if app.cameras.is_empty() {
        let placeholder = Paragraph::new("No cameras yet. Press 'a' to add one or 'r' to refresh.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    let header = Row::new(vec!["ID", "Name", "Stream URL", "Status", "Monitoring", "Alert Email"])
        .style(Style::default().fg(Color::Yellow).bold());

    let rows: Vec<Row> = app
        .cameras
        .iter()
        .map(|camera| {
            let status = if camera.live {
                Span::styled("Live", Style::default().fg(Color::Green))
            } else {
                Span::styled("Offline", Style::default().fg(Color::Red))
            };
            let monitoring = if camera.monitoring {
                Span::styled("On", Style::default().fg(Color::Green))
            } else {
                Span::styled("Off", Style::default().fg(Color::DarkGray))
            };
            Row::new(vec![
                Cell::from(camera.id.to_string()),
                Cell::from(camera.name.clone()),
                Cell::from(camera.url.clone()),
                Cell::from(status),
                Cell::from(monitoring),
                Cell::from(camera.email.clone()),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Min(14),
            Constraint::Min(20),
            Constraint::Length(9),
            Constraint::Length(12),
            Constraint::Min(18),
        ],
    )
    .header(header)
    .block(block)
    .highlight_style(
        Style::default()
            .bg(Color::Blue)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

    frame.render_stateful_widget(table, area, &mut app.camera_table_state);
}

fn render_analytics_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [roster_area, report_area] =
        Layout::horizontal([Constraint::Length(30), Constraint::Min(0)]).areas(area);

    // Store areas for mouse hit-testing
    app.roster_area = Some(roster_area);
    app.content_area = Some(report_area);
    app.chat_input_area = None;

    render_roster(app, frame, roster_area, true);

    let title = match &app.analytics_camera {
        Some(camera) => format!(" Analytics: {} ", camera.name),
        None => " Analytics ".to_string(),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(title);

    if app.analytics_camera.is_none() {
        let placeholder =
            Paragraph::new("Select a camera on the left and press Enter to load analytics.")
                .style(Style::default().fg(Color::DarkGray))
                .block(block)
                .wrap(Wrap { trim: true });
        frame.render_widget(placeholder, report_area);
        return;
    }

    if app.analytics_loading {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        let loading = Paragraph::new(Span::styled(
            format!("Loading analytics{}", dots),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        ))
        .block(block);
        frame.render_widget(loading, report_area);
        return;
    }

    let Some(report) = &app.analytics_report else {
        let placeholder = Paragraph::new("No analytics data for this camera.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(placeholder, report_area);
        return;
    };

    let label =
        |text: &str| Span::styled(format!("{:<30}", text), Style::default().fg(Color::DarkGray));
    let value = |text: String| Span::styled(text, Style::default().bold());

    let lines = vec![
        Line::default(),
        Line::from(vec![
            label("Footage analyzed"),
            value(report.total_footage_analyzed.to_string()),
        ]),
        Line::from(vec![
            label("Individuals detected"),
            value(report.total_individuals_detected.to_string()),
        ]),
        Line::from(vec![
            label("Avg passerbys per footage"),
            value(format!("{:.2}", report.average_human_passerbys())),
        ]),
        Line::default(),
        Line::from(vec![
            label("Unusual incidents"),
            value(report.total_unusual_incidents.to_string()),
        ]),
        Line::from(vec![
            label("Unusual crowd incidents"),
            value(report.total_unusual_crowd_incidents.to_string()),
        ]),
        Line::from(vec![
            label("Animal incidents"),
            value(report.total_animal_incidents.to_string()),
        ]),
        Line::from(vec![
            label("Vehicles detected"),
            value(report.total_vehicle_detected.to_string()),
        ]),
    ];

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, report_area);
}

fn render_transcripts_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [roster_area, right_area] =
        Layout::horizontal([Constraint::Length(30), Constraint::Min(0)]).areas(area);
    let [tabs_area, table_area] =
        Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(right_area);

    // Store areas for mouse hit-testing
    app.roster_area = Some(roster_area);
    app.content_area = Some(table_area);
    app.chat_input_area = None;

    render_roster(app, frame, roster_area, app.focus == FocusPane::Roster);

    // Activity tabs
    let mut spans = vec![Span::styled(" Activity: ", Style::default().fg(Color::DarkGray))];
    for activity in Activity::all() {
        let style = if activity == app.activity {
            Style::default().bg(Color::Blue).fg(Color::White).bold()
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(format!(" {} ", activity.label()), style));
        spans.push(Span::raw(" "));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), tabs_area);

    let table_focused = app.focus == FocusPane::Content;
    let border_color = if table_focused { Color::Cyan } else { Color::DarkGray };

    let title = match &app.transcripts_camera {
        Some(camera) => format!(" {}: {} ", app.activity.label(), camera.name),
        None => " Transcripts ".to_string(),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    if app.transcripts_camera.is_none() {
        let placeholder =
            Paragraph::new("Select a camera on the left and press Enter to load transcripts.")
                .style(Style::default().fg(Color::DarkGray))
                .block(block)
                .wrap(Wrap { trim: true });
        frame.render_widget(placeholder, table_area);
        return;
    }

    if app.transcripts_loading {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        let loading = Paragraph::new(Span::styled(
            format!("Loading transcripts{}", dots),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        ))
        .block(block);
        frame.render_widget(loading, table_area);
        return;
    }

    if app.transcript_rows.is_empty() {
        let placeholder = Paragraph::new("No transcript rows for this activity and camera.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(placeholder, table_area);
        return;
    }

    let header = Row::new(vec!["Frame", "Description", "Context"])
        .style(Style::default().fg(Color::Yellow).bold());

    let rows: Vec<Row> = app
        .transcript_rows
        .iter()
        .map(|row| {
            Row::new(vec![
                Cell::from(row.frame_number.to_string()),
                Cell::from(row.activity_text(app.activity).to_string()),
                Cell::from(row.context_notes.as_deref().unwrap_or("").to_string()),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Percentage(55),
            Constraint::Min(20),
        ],
    )
    .header(header)
    .block(block)
    .highlight_style(
        Style::default()
            .bg(Color::Blue)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

    frame.render_stateful_widget(table, table_area, &mut app.transcript_table_state);
}

fn render_roster(app: &mut App, frame: &mut Frame, area: Rect, focused: bool) {
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let title = if app.cameras_loading {
        " Cameras (loading) ".to_string()
    } else {
        format!(" Cameras ({}) ", app.cameras.len())
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let items: Vec<ListItem> = app
        .cameras
        .iter()
        .map(|camera| ListItem::new(format!(" {} ", camera.display_name())))
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.roster_state);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [mode_area, chat_area, input_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store areas for mouse hit-testing
    app.roster_area = None;
    app.content_area = Some(chat_area);
    app.chat_input_area = Some(input_area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_area_height = chat_area.height.saturating_sub(2);
    app.chat_area_width = chat_area.width.saturating_sub(2);

    let session = app.sessions.get(&app.chat_mode);
    let camera = session.and_then(|s| s.camera());

    // Mode tabs with the scoped camera on the right
    let mut spans: Vec<Span> = Vec::new();
    for mode in ChatMode::all() {
        let style = if mode == app.chat_mode {
            Style::default().bg(Color::Blue).fg(Color::White).bold()
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(format!(" {} ", mode.display_name()), style));
        spans.push(Span::raw(" "));
    }
    spans.push(Span::styled(" Camera: ", Style::default().fg(Color::DarkGray)));
    match camera {
        Some(camera) => spans.push(Span::styled(
            camera.display_name(),
            Style::default().fg(Color::Yellow),
        )),
        None => spans.push(Span::styled(
            "none (press 'c')",
            Style::default().fg(Color::DarkGray),
        )),
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), mode_area);

    // Conversation transcript
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Conversation ");

    let history_loading = session.map(|s| s.history_loading()).unwrap_or(false);
    let messages = session.map(|s| s.messages()).unwrap_or(&[]);

    let chat_text = if camera.is_none() {
        Text::from(Span::styled(
            "Press 'c' to choose a camera and start a conversation.",
            Style::default().fg(Color::DarkGray),
        ))
    } else if history_loading {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        Text::from(Span::styled(
            format!("Loading conversation history{}", dots),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        ))
    } else if messages.is_empty() {
        Text::from(Span::styled(
            "No messages yet. Press 'i' to write the first one.",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        // Line structure here must stay in step with App::scroll_chat_to_bottom
        let mut lines: Vec<Line> = Vec::new();

        for msg in messages {
            lines.push(Line::from(vec![
                Span::styled(
                    "You",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ),
                Span::styled(format!("  [{}]", msg.sent_at), Style::default().fg(Color::DarkGray)),
            ]));
            lines.push(Line::from(msg.input.as_str()));

            let mut ai_spans = vec![Span::styled(
                "AI",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )];
            if let Some(received_at) = &msg.received_at {
                ai_spans.push(Span::styled(
                    format!("  [{}]", received_at),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            lines.push(Line::from(ai_spans));

            if msg.pending {
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat((app.animation_frame as usize) + 1);
                lines.push(Line::from(Span::styled(
                    format!("Thinking{}", dots),
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::ITALIC),
                )));
            } else if msg.received_at.is_none() {
                // Failed round: the canned failure text, in red
                lines.push(Line::from(Span::styled(
                    msg.response.as_str(),
                    Style::default().fg(Color::Red),
                )));
            } else {
                for line in msg.response.lines() {
                    lines.push(parse_markdown_line(line));
                }
            }

            if !msg.frames.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("[{} frame(s) attached, 'w' to save]", msg.frames.len()),
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::ITALIC),
                )));
            }
            lines.push(Line::default());
        }

        Text::from(lines)
    };

    let total_lines = chat_text.lines.len() as u16;
    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, chat_area);

    if total_lines > app.chat_area_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));

        let mut scrollbar_state =
            ScrollbarState::new(total_lines as usize).position(app.chat_scroll as usize);

        frame.render_stateful_widget(
            scrollbar,
            chat_area.inner(ratatui::layout::Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }

    // Message input at the bottom
    let input_border_color = if app.input_mode == InputMode::Editing {
        Color::Yellow
    } else {
        Color::DarkGray
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border_color))
        .title(" Message ('i' to type) ");

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let cursor_pos = app.chat_cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    // Get the visible slice of the input
    let visible_text: String = app
        .chat_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, input_area);

    // Show cursor when editing
    if app.input_mode == InputMode::Editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));
    }
}

fn render_camera_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    use ratatui::widgets::Clear;

    // Calculate popup size and position (centered)
    let popup_width = 44.min(area.width.saturating_sub(4));
    let popup_height = (app.cameras.len() as u16 + 2).min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Camera (Enter to select, Esc to cancel) ");

    let current = app
        .sessions
        .get(&app.chat_mode)
        .and_then(|s| s.camera_id());

    let items: Vec<ListItem> = app
        .cameras
        .iter()
        .map(|camera| {
            let style = if Some(camera.id) == current {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", camera.display_name())).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.camera_picker_state);
}

fn render_camera_form(app: &App, frame: &mut Frame, area: Rect) {
    use ratatui::widgets::Clear;

    let form = match &app.camera_form {
        Some(form) => form,
        None => return,
    };

    // Calculate popup size and position (centered)
    let popup_width = 60.min(area.width.saturating_sub(4));
    let popup_height = 9.min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(format!(" {} (Enter to save, Esc to cancel) ", form.title()));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let label_width: u16 = 14;
    let fields = [
        (FormField::Name, "Name:", form.name.as_str()),
        (FormField::Url, "Stream URL:", form.url.as_str()),
        (FormField::Email, "Alert email:", form.email.as_str()),
    ];

    for (i, (field, label, text)) in fields.iter().enumerate() {
        let y = inner.y + (i as u16) * 2;
        if y >= inner.bottom() {
            break;
        }
        let row = Rect::new(inner.x, y, inner.width, 1);
        let focused = form.field == *field;

        let label_style = if focused {
            Style::default().fg(Color::Yellow).bold()
        } else {
            Style::default().fg(Color::DarkGray)
        };

        // Keep the cursor in view on long values
        let avail = inner.width.saturating_sub(label_width) as usize;
        let scroll_offset = if focused && avail > 0 && form.cursor >= avail {
            form.cursor - avail + 1
        } else {
            0
        };
        let visible: String = text.chars().skip(scroll_offset).take(avail).collect();

        let line = Line::from(vec![
            Span::styled(format!("{:<width$}", label, width = label_width as usize), label_style),
            Span::styled(visible, Style::default().fg(Color::Cyan)),
        ]);
        frame.render_widget(Paragraph::new(line), row);

        if focused {
            let cursor_x = (form.cursor - scroll_offset) as u16;
            frame.set_cursor_position((row.x + label_width + cursor_x, row.y));
        }
    }

    // Monitoring toggle row, dropped when the clamped popup has no room for it
    if inner.height <= 6 {
        return;
    }
    let row = Rect::new(inner.x, inner.y + 6, inner.width, 1);
    let focused = form.field == FormField::Monitoring;
    let label_style = if focused {
        Style::default().fg(Color::Yellow).bold()
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let toggle = if form.monitoring { "[x] enabled" } else { "[ ] disabled" };
    let line = Line::from(vec![
        Span::styled(
            format!("{:<width$}", "Monitoring:", width = label_width as usize),
            label_style,
        ),
        Span::raw(toggle),
        Span::styled("  (Space toggles)", Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(line), row);
}

fn render_warning(app: &App, frame: &mut Frame, area: Rect) {
    use ratatui::widgets::Clear;

    let text = match &app.warning {
        Some(text) => text.as_str(),
        None => return,
    };

    // Calculate popup size and position (centered)
    let popup_width = 56.min(area.width.saturating_sub(4));
    let popup_height = 6.min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Warning ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);
    if inner.height == 0 {
        return;
    }

    let message_area = Rect::new(inner.x, inner.y, inner.width, inner.height.saturating_sub(2));
    let message = Paragraph::new(text).wrap(Wrap { trim: true });
    frame.render_widget(message, message_area);

    let hint_area = Rect::new(inner.x, inner.y + inner.height.saturating_sub(1), inner.width, 1);
    let hint = Paragraph::new("Press Enter to dismiss").style(Style::default().fg(Color::DarkGray));
    frame.render_widget(hint, hint_area);
}

fn render_toasts(app: &App, frame: &mut Frame, area: Rect) {
    use ratatui::widgets::Clear;

    for (i, toast) in app.toasts.iter().enumerate() {
        let y = 1 + (i as u16) * 3;
        if y + 3 > area.height {
            break;
        }

        let width = ((toast.text.chars().count() as u16) + 4)
            .clamp(20, area.width.saturating_sub(4));
        let x = area.width.saturating_sub(width + 1);
        let toast_area = Rect::new(x, y, width, 3);

        let border_color = match toast.kind {
            ToastKind::Info => Color::Blue,
            ToastKind::Success => Color::Green,
            ToastKind::Error => Color::Red,
        };

        frame.render_widget(Clear, toast_area);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color));
        let paragraph = Paragraph::new(toast.text.as_str())
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, toast_area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};
    use tokio::sync::mpsc;

    #[test]
    fn test_popups_render_inside_a_short_terminal() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(tx);
        app.open_add_form();
        app.warning = Some("Select a camera before sending a message.".to_string());

        // Shorter than either popup's full height; the draw must stay in bounds
        let backend = TestBackend::new(30, 5);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();
    }
}
