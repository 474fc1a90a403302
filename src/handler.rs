use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use tracing::{info, warn};

use watchpost_core::{
    chat, Activity, AnalyticsReport, Camera, ChatMode, ChatRecord, ChatReply, HistoryOutcome,
    SendOutcome, SendTicket, TranscriptRow,
};

use crate::app::{App, FocusPane, FormField, InputMode, Screen, ToastKind};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key)?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
            app.prune_toasts();
        }
        AppEvent::CamerasLoaded(result) => apply_cameras_loaded(app, result),
        AppEvent::CameraSaved { updated, result } => apply_camera_saved(app, updated, result),
        AppEvent::AnalyticsLoaded { camera_id, result } => apply_analytics(app, camera_id, result),
        AppEvent::TranscriptsLoaded {
            activity,
            camera_id,
            result,
        } => apply_transcripts(app, activity, camera_id, result),
        AppEvent::ChatHistoryLoaded {
            mode,
            generation,
            result,
        } => apply_chat_history(app, mode, generation, result),
        AppEvent::ChatResolved { ticket, result } => apply_chat_resolved(app, ticket, result),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    // A blocking warning swallows everything until acknowledged
    if app.warning.is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            app.warning = None;
        }
        return Ok(());
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }

    Ok(())
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    // Screen tabs and toast dismissal work everywhere except inside popups
    if !app.show_camera_picker {
        match key.code {
            KeyCode::Char('q') => {
                app.should_quit = true;
                return;
            }
            KeyCode::Char('1') => {
                app.screen = Screen::Cameras;
                return;
            }
            KeyCode::Char('2') => {
                app.screen = Screen::Analytics;
                return;
            }
            KeyCode::Char('3') => {
                app.screen = Screen::Transcripts;
                return;
            }
            KeyCode::Char('4') => {
                app.screen = Screen::Chat;
                return;
            }
            KeyCode::Char('D') => {
                app.dismiss_toasts();
                return;
            }
            _ => {}
        }
    }

    match app.screen {
        Screen::Cameras => handle_cameras_normal(app, key),
        Screen::Analytics => handle_analytics_normal(app, key),
        Screen::Transcripts => handle_transcripts_normal(app, key),
        Screen::Chat => handle_chat_normal(app, key),
    }
}

fn handle_cameras_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        // Navigation
        KeyCode::Char('j') | KeyCode::Down => app.camera_table_down(),
        KeyCode::Char('k') | KeyCode::Up => app.camera_table_up(),
        KeyCode::Char('g') => {
            if !app.cameras.is_empty() {
                app.camera_table_state.select(Some(0));
            }
        }
        KeyCode::Char('G') => {
            let len = app.cameras.len();
            if len > 0 {
                app.camera_table_state.select(Some(len - 1));
            }
        }

        // Roster actions
        KeyCode::Char('a') => app.open_add_form(),
        KeyCode::Char('e') => app.open_edit_form(),
        KeyCode::Char('m') => app.toggle_monitoring(),
        KeyCode::Char('r') => app.request_cameras(),

        _ => {}
    }
}

fn handle_analytics_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.roster_down(),
        KeyCode::Char('k') | KeyCode::Up => app.roster_up(),

        // Fetch the report for the highlighted camera
        KeyCode::Enter => {
            if let Some(camera) = app.selected_roster_camera().cloned() {
                app.request_analytics(camera);
            }
        }

        KeyCode::Char('r') => app.request_cameras(),

        _ => {}
    }
}

fn handle_transcripts_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        // Tab switches between the roster and the transcript table
        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::Roster => FocusPane::Content,
                FocusPane::Content => FocusPane::Roster,
            };
        }

        KeyCode::Char('j') | KeyCode::Down => {
            if app.focus == FocusPane::Roster {
                app.roster_down();
            } else {
                app.transcript_down();
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            if app.focus == FocusPane::Roster {
                app.roster_up();
            } else {
                app.transcript_up();
            }
        }
        KeyCode::Char('g') => {
            if app.focus == FocusPane::Content && !app.transcript_rows.is_empty() {
                app.transcript_table_state.select(Some(0));
            }
        }
        KeyCode::Char('G') => {
            let len = app.transcript_rows.len();
            if app.focus == FocusPane::Content && len > 0 {
                app.transcript_table_state.select(Some(len - 1));
            }
        }

        // Activity tabs
        KeyCode::Char('h') | KeyCode::Left => app.prev_activity(),
        KeyCode::Char('l') | KeyCode::Right => app.next_activity(),

        // Fetch transcripts for the highlighted camera
        KeyCode::Enter => {
            if app.focus == FocusPane::Roster {
                if let Some(camera) = app.selected_roster_camera().cloned() {
                    app.transcripts_camera = Some(camera);
                    app.request_transcripts();
                }
            }
        }

        KeyCode::Char('r') => app.request_cameras(),

        _ => {}
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    // Handle camera picker if it's open
    if app.show_camera_picker {
        match key.code {
            KeyCode::Esc => app.show_camera_picker = false,
            KeyCode::Char('j') | KeyCode::Down => app.picker_down(),
            KeyCode::Char('k') | KeyCode::Up => app.picker_up(),
            KeyCode::Enter => {
                if let Some(camera) = app.picker_camera().cloned() {
                    app.show_camera_picker = false;
                    app.select_chat_camera(camera);
                }
            }
            _ => {}
        }
        return;
    }

    match key.code {
        // Mode tabs (two of them, so either direction flips)
        KeyCode::Left | KeyCode::Char('h') | KeyCode::Right | KeyCode::Char('l') => {
            app.next_chat_mode();
        }

        // Camera picker
        KeyCode::Char('c') => {
            if app.cameras.is_empty() {
                app.toast(ToastKind::Info, "No cameras available yet. Press 'r' to refresh.");
            } else {
                let current = app.sessions.get(&app.chat_mode).and_then(|s| s.camera_id());
                let idx = current
                    .and_then(|id| app.cameras.iter().position(|c| c.id == id))
                    .unwrap_or(0);
                app.camera_picker_state.select(Some(idx));
                app.show_camera_picker = true;
            }
        }

        // Compose
        KeyCode::Char('i') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
            app.chat_cursor = app.chat_input.chars().count();
        }

        // Save the frames of the latest fulfilled reply
        KeyCode::Char('w') => app.save_frames_of_last_reply(),

        // Conversation scrolling
        KeyCode::Char('j') | KeyCode::Down => {
            app.chat_scroll = app.chat_scroll.saturating_add(1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.chat_scroll = app.chat_scroll.saturating_sub(1);
        }
        KeyCode::Char('g') => app.chat_scroll = 0,
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),

        KeyCode::Char('r') => app.request_cameras(),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    if app.camera_form.is_some() {
        handle_form_editing(app, key);
    } else if app.screen == Screen::Chat {
        handle_chat_editing(app, key);
    } else {
        app.input_mode = InputMode::Normal;
    }
}

fn handle_form_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.close_form();
            return;
        }
        KeyCode::Enter => {
            app.save_camera_form();
            return;
        }
        _ => {}
    }

    let form = match app.camera_form.as_mut() {
        Some(form) => form,
        None => return,
    };

    match key.code {
        KeyCode::Down | KeyCode::Tab => form.field_down(),
        KeyCode::Up | KeyCode::BackTab => form.field_up(),

        KeyCode::Backspace => {
            let cursor = form.cursor;
            if cursor > 0 {
                if let Some(text) = form.active_text_mut() {
                    let byte_pos = char_to_byte_index(text, cursor - 1);
                    text.remove(byte_pos);
                }
                form.cursor -= 1;
            }
        }
        KeyCode::Delete => {
            let cursor = form.cursor;
            if let Some(text) = form.active_text_mut() {
                if cursor < text.chars().count() {
                    let byte_pos = char_to_byte_index(text, cursor);
                    text.remove(byte_pos);
                }
            }
        }
        KeyCode::Left => {
            form.cursor = form.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = form.active_text().map(|t| t.chars().count()).unwrap_or(0);
            form.cursor = (form.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            form.cursor = 0;
        }
        KeyCode::End => {
            form.cursor = form.active_text().map(|t| t.chars().count()).unwrap_or(0);
        }
        KeyCode::Char(c) => {
            if form.field == FormField::Monitoring {
                if c == ' ' {
                    form.monitoring = !form.monitoring;
                }
            } else {
                let cursor = form.cursor;
                if let Some(text) = form.active_text_mut() {
                    let byte_pos = char_to_byte_index(text, cursor);
                    text.insert(byte_pos, c);
                }
                form.cursor += 1;
            }
        }
        _ => {}
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            if app.send_chat_message() {
                app.input_mode = InputMode::Normal;
            }
        }
        KeyCode::Backspace => {
            if app.chat_cursor > 0 {
                app.chat_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
                app.chat_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.chat_input.chars().count();
            if app.chat_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
                app.chat_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.chat_cursor = app.chat_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.chat_input.chars().count();
            app.chat_cursor = (app.chat_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.chat_cursor = 0;
        }
        KeyCode::End => {
            app.chat_cursor = app.chat_input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
            app.chat_input.insert(byte_pos, c);
            app.chat_cursor += 1;
        }
        _ => {}
    }
}

// Completion events from spawned request tasks. Each applier verifies the
// identity the result was tagged with before touching state.

fn apply_cameras_loaded(app: &mut App, result: Result<Vec<Camera>>) {
    app.cameras_loading = false;
    match result {
        Ok(cameras) => {
            info!(count = cameras.len(), "camera roster refreshed");
            app.cameras = cameras;
            if app.cameras.is_empty() {
                app.camera_table_state.select(None);
                app.roster_state.select(None);
                app.camera_picker_state.select(None);
            } else {
                // Clamp selections that fell off the end of the new roster
                let last = app.cameras.len() - 1;
                let i = app.camera_table_state.selected().unwrap_or(0).min(last);
                app.camera_table_state.select(Some(i));
                let i = app.roster_state.selected().unwrap_or(0).min(last);
                app.roster_state.select(Some(i));
                let i = app.camera_picker_state.selected().unwrap_or(0).min(last);
                app.camera_picker_state.select(Some(i));
            }
        }
        Err(err) => {
            warn!("camera roster fetch failed: {err:#}");
            app.toast(ToastKind::Error, "Error fetching cameras. Try again later!");
        }
    }
}

fn apply_camera_saved(app: &mut App, updated: bool, result: Result<Camera>) {
    match result {
        Ok(camera) => {
            if updated {
                info!(camera_id = camera.id, "camera updated");
                // Patch the cached row in place
                if let Some(existing) = app.cameras.iter_mut().find(|c| c.id == camera.id) {
                    *existing = camera;
                }
                app.toast(ToastKind::Success, "Camera details updated successfully!");
            } else {
                info!(camera_id = camera.id, "camera added");
                app.toast(ToastKind::Success, "New camera added successfully!");
                // Re-fetch so the roster shows what the registry actually stored
                app.request_cameras();
            }
        }
        Err(err) => {
            warn!("camera save failed: {err:#}");
            let text = if updated {
                "Error updating camera. Please try again later."
            } else {
                "Error adding new camera. Please try again later."
            };
            app.toast(ToastKind::Error, text);
        }
    }
}

fn apply_analytics(app: &mut App, camera_id: i64, result: Result<Option<AnalyticsReport>>) {
    // A report for a previously picked camera must not overwrite the current one
    if app.analytics_camera.as_ref().map(|c| c.id) != Some(camera_id) {
        return;
    }
    app.analytics_loading = false;
    match result {
        Ok(Some(report)) => app.analytics_report = Some(report),
        Ok(None) => {
            app.analytics_report = None;
            app.toast(ToastKind::Info, "No analytics data found for this camera.");
        }
        Err(err) => {
            warn!(camera_id, "analytics fetch failed: {err:#}");
            app.analytics_report = None;
            app.toast(ToastKind::Error, "Error fetching analytics data. Try again later!");
        }
    }
}

fn apply_transcripts(
    app: &mut App,
    activity: Activity,
    camera_id: i64,
    result: Result<Vec<TranscriptRow>>,
) {
    // Drop results for a camera or activity the user has moved away from
    if app.activity != activity
        || app.transcripts_camera.as_ref().map(|c| c.id) != Some(camera_id)
    {
        return;
    }
    app.transcripts_loading = false;
    match result {
        Ok(rows) if rows.is_empty() => {
            app.transcript_rows.clear();
            app.transcript_table_state.select(None);
            app.toast(ToastKind::Info, "No transcripts found for this activity and camera.");
        }
        Ok(rows) => {
            app.transcript_rows = rows;
            app.transcript_table_state.select(Some(0));
        }
        Err(err) => {
            warn!(
                camera_id,
                activity = activity.as_str(),
                "transcripts fetch failed: {err:#}"
            );
            app.transcript_rows.clear();
            app.transcript_table_state.select(None);
            app.toast(ToastKind::Error, "Error fetching transcripts data. Try again later!");
        }
    }
}

fn apply_chat_history(
    app: &mut App,
    mode: ChatMode,
    generation: u64,
    result: Result<Vec<ChatRecord>>,
) {
    match app.session_mut(mode).apply_history(generation, result) {
        HistoryOutcome::Replaced => {
            if mode == app.chat_mode {
                app.scroll_chat_to_bottom();
            }
        }
        HistoryOutcome::Failed => {
            app.toast(ToastKind::Error, "Error fetching chat history. Try again later!");
        }
        HistoryOutcome::Dropped => {}
    }
}

fn apply_chat_resolved(app: &mut App, ticket: SendTicket, result: Result<ChatReply>) {
    let now = chat::now_stamp();
    match app.session_mut(ticket.mode).resolve(&ticket, result, &now) {
        SendOutcome::Fulfilled => {
            if ticket.mode == app.chat_mode {
                app.scroll_chat_to_bottom();
            }
        }
        SendOutcome::Failed => {
            app.toast(ToastKind::Error, "Message failed to send. Try again later!");
            if ticket.mode == app.chat_mode {
                app.scroll_chat_to_bottom();
            }
        }
        SendOutcome::Dropped => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    // Determine which area the mouse is in (position-based scrolling)
    let in_roster = app.roster_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_content = app.content_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_chat_input = app
        .chat_input_area
        .map(|r| point_in_rect(x, y, r))
        .unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown => match app.screen {
            Screen::Cameras => app.camera_table_down(),
            Screen::Analytics => {
                if in_roster {
                    app.roster_down();
                }
            }
            Screen::Transcripts => {
                if in_roster {
                    app.roster_down();
                } else if in_content {
                    app.transcript_down();
                }
            }
            Screen::Chat => {
                app.chat_scroll = app.chat_scroll.saturating_add(3);
            }
        },
        MouseEventKind::ScrollUp => match app.screen {
            Screen::Cameras => app.camera_table_up(),
            Screen::Analytics => {
                if in_roster {
                    app.roster_up();
                }
            }
            Screen::Transcripts => {
                if in_roster {
                    app.roster_up();
                } else if in_content {
                    app.transcript_up();
                }
            }
            Screen::Chat => {
                app.chat_scroll = app.chat_scroll.saturating_sub(3);
            }
        },
        MouseEventKind::Down(MouseButton::Left) => {
            if app.screen == Screen::Transcripts {
                if in_roster {
                    app.focus = FocusPane::Roster;
                } else if in_content {
                    app.focus = FocusPane::Content;
                }
            }
            if app.screen == Screen::Chat && in_chat_input {
                app.input_mode = InputMode::Editing;
                app.chat_cursor = app.chat_input.chars().count();
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn camera(id: i64) -> Camera {
        Camera {
            id,
            name: format!("Cam{:02}", id),
            url: "rtsp://10.0.0.5/stream".to_string(),
            live: true,
            email: "alerts@example.com".to_string(),
            monitoring: true,
        }
    }

    fn animal_row(frame: i64) -> TranscriptRow {
        TranscriptRow {
            frame_number: frame,
            unusual_activity: None,
            human_activity: None,
            animal_activity: Some("fox near the fence".to_string()),
            context_notes: None,
        }
    }

    #[test]
    fn test_empty_transcripts_clear_rows_and_report_no_data() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(tx);
        app.activity = Activity::Animal;
        app.transcripts_camera = Some(camera(3));
        app.transcript_rows = vec![animal_row(7)];
        app.transcript_table_state.select(Some(0));
        app.transcripts_loading = true;

        apply_transcripts(&mut app, Activity::Animal, 3, Ok(Vec::new()));

        assert!(app.transcript_rows.is_empty());
        assert_eq!(app.transcript_table_state.selected(), None);
        assert!(!app.transcripts_loading);
        assert_eq!(app.toasts.len(), 1);
        assert_eq!(app.toasts[0].kind, ToastKind::Info);
        assert_eq!(
            app.toasts[0].text,
            "No transcripts found for this activity and camera."
        );
    }

    #[test]
    fn test_stale_transcripts_reply_is_dropped() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(tx);
        app.activity = Activity::Animal;
        app.transcripts_camera = Some(camera(3));
        app.transcript_rows = vec![animal_row(7)];
        app.transcript_table_state.select(Some(0));
        app.transcripts_loading = true;

        // Tagged for an activity the user has moved away from
        apply_transcripts(&mut app, Activity::Human, 3, Ok(Vec::new()));
        // Tagged for a different camera
        apply_transcripts(&mut app, Activity::Animal, 99, Ok(Vec::new()));

        assert_eq!(app.transcript_rows.len(), 1);
        assert_eq!(app.transcript_table_state.selected(), Some(0));
        assert!(app.transcripts_loading);
        assert!(app.toasts.is_empty());
    }

    #[test]
    fn test_stale_analytics_reply_is_dropped() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(tx);
        app.analytics_camera = Some(camera(5));
        app.analytics_report = Some(AnalyticsReport {
            total_footage_analyzed: 50,
            total_individuals_detected: 120,
            average_human_passerbys_per_footage: 2.4,
            total_unusual_incidents: 1,
            total_animal_incidents: 2,
            total_unusual_crowd_incidents: 0,
            total_vehicle_detected: 9,
        });
        app.analytics_loading = true;

        apply_analytics(&mut app, 3, Ok(None));

        assert!(app.analytics_report.is_some());
        assert!(app.analytics_loading);
        assert!(app.toasts.is_empty());
    }
}
