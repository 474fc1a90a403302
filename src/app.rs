use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use ratatui::layout::Rect;
use ratatui::widgets::{ListState, TableState};
use regex::Regex;
use tokio::sync::mpsc::UnboundedSender;

use watchpost_core::{
    chat, Activity, AnalyticsReport, BackendClient, Camera, CameraDraft, ChatMode, ChatSession,
    Config, SendRejected, TranscriptRow,
};

use crate::tui::AppEvent;

/// How long a toast stays on screen.
const TOAST_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Cameras,
    Analytics,
    Transcripts,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Roster,
    Content,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub text: String,
    pub kind: ToastKind,
    pub born: Instant,
}

/// Which camera form field has the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Name,
    Url,
    Email,
    Monitoring,
}

/// State of the add/edit camera popup. `editing` holds the original record
/// for edits so the id and live flag survive the round-trip; adds leave it
/// empty.
#[derive(Debug, Clone)]
pub struct CameraForm {
    pub editing: Option<Camera>,
    pub name: String,
    pub url: String,
    pub email: String,
    pub monitoring: bool,
    pub field: FormField,
    pub cursor: usize,
}

fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap())
}

impl CameraForm {
    pub fn new_add() -> Self {
        Self {
            editing: None,
            name: String::new(),
            url: String::new(),
            email: String::new(),
            monitoring: false,
            field: FormField::Name,
            cursor: 0,
        }
    }

    pub fn new_edit(camera: &Camera) -> Self {
        Self {
            editing: Some(camera.clone()),
            name: camera.name.clone(),
            url: camera.url.clone(),
            email: camera.email.clone(),
            monitoring: camera.monitoring,
            field: FormField::Name,
            cursor: camera.name.chars().count(),
        }
    }

    pub fn title(&self) -> &'static str {
        if self.editing.is_some() {
            "Edit Camera"
        } else {
            "Add Camera"
        }
    }

    /// Text content of the focused field, `None` on the monitoring toggle.
    pub fn active_text(&self) -> Option<&String> {
        match self.field {
            FormField::Name => Some(&self.name),
            FormField::Url => Some(&self.url),
            FormField::Email => Some(&self.email),
            FormField::Monitoring => None,
        }
    }

    pub fn active_text_mut(&mut self) -> Option<&mut String> {
        match self.field {
            FormField::Name => Some(&mut self.name),
            FormField::Url => Some(&mut self.url),
            FormField::Email => Some(&mut self.email),
            FormField::Monitoring => None,
        }
    }

    pub fn field_down(&mut self) {
        self.field = match self.field {
            FormField::Name => FormField::Url,
            FormField::Url => FormField::Email,
            FormField::Email => FormField::Monitoring,
            FormField::Monitoring => FormField::Name,
        };
        self.cursor = self.active_text().map(|t| t.chars().count()).unwrap_or(0);
    }

    pub fn field_up(&mut self) {
        self.field = match self.field {
            FormField::Name => FormField::Monitoring,
            FormField::Url => FormField::Name,
            FormField::Email => FormField::Url,
            FormField::Monitoring => FormField::Email,
        };
        self.cursor = self.active_text().map(|t| t.chars().count()).unwrap_or(0);
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("Camera name is required.");
        }
        if self.url.trim().is_empty() {
            return Err("Stream URL is required.");
        }
        if !email_regex().is_match(self.email.trim()) {
            return Err("Enter a valid alert email address.");
        }
        Ok(())
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Camera roster, shared by every screen
    pub cameras: Vec<Camera>,
    pub cameras_loading: bool,
    pub camera_table_state: TableState,
    pub roster_state: ListState,

    // Camera picker popup (chat screen)
    pub show_camera_picker: bool,
    pub camera_picker_state: ListState,

    // Add/edit camera form popup
    pub camera_form: Option<CameraForm>,

    // Analytics screen
    pub analytics_camera: Option<Camera>,
    pub analytics_report: Option<AnalyticsReport>,
    pub analytics_loading: bool,

    // Transcripts screen
    pub transcripts_camera: Option<Camera>,
    pub activity: Activity,
    pub transcript_rows: Vec<TranscriptRow>,
    pub transcripts_loading: bool,
    pub transcript_table_state: TableState,

    // Chat screen, one session per mode
    pub chat_mode: ChatMode,
    pub sessions: HashMap<ChatMode, ChatSession>,
    pub chat_input: String,
    pub chat_cursor: usize, // cursor position in chat_input
    pub chat_scroll: u16,
    pub chat_area_height: u16, // Height of chat area for scroll calculations
    pub chat_area_width: u16,  // Width of chat area for wrap calculations

    // Blocking warning popup
    pub warning: Option<String>,

    // Toast stack (top-right corner, pruned on tick)
    pub toasts: Vec<Toast>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Panel areas for mouse hit-testing (updated during render)
    pub roster_area: Option<Rect>,
    pub content_area: Option<Rect>,
    pub chat_input_area: Option<Rect>,

    // Backend plumbing
    pub client: BackendClient,
    pub download_dir: PathBuf,
    events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(events: UnboundedSender<AppEvent>) -> Self {
        // Load config; env vars override file values
        let config = Config::load().unwrap_or_else(|_| Config::new());
        let client =
            BackendClient::new(&config.resolve_api_url(), &config.resolve_local_chat_url());
        let download_dir = config.resolve_download_dir();

        let mut sessions = HashMap::new();
        for mode in ChatMode::all() {
            sessions.insert(mode, ChatSession::new(mode));
        }

        Self {
            should_quit: false,
            screen: Screen::Cameras,
            input_mode: InputMode::Normal,
            focus: FocusPane::Roster,

            cameras: Vec::new(),
            cameras_loading: false,
            camera_table_state: TableState::default(),
            roster_state: ListState::default(),

            show_camera_picker: false,
            camera_picker_state: ListState::default(),

            camera_form: None,

            analytics_camera: None,
            analytics_report: None,
            analytics_loading: false,

            transcripts_camera: None,
            activity: Activity::Unusual,
            transcript_rows: Vec::new(),
            transcripts_loading: false,
            transcript_table_state: TableState::default(),

            chat_mode: ChatMode::Cloud,
            sessions,
            chat_input: String::new(),
            chat_cursor: 0,
            chat_scroll: 0,
            chat_area_height: 0,
            chat_area_width: 0,

            warning: None,

            toasts: Vec::new(),

            animation_frame: 0,

            roster_area: None,
            content_area: None,
            chat_input_area: None,

            client,
            download_dir,
            events,
        }
    }

    // Session access
    pub fn session_mut(&mut self, mode: ChatMode) -> &mut ChatSession {
        self.sessions.entry(mode).or_insert_with(|| ChatSession::new(mode))
    }

    fn chat_waiting(&self) -> bool {
        self.sessions
            .get(&self.chat_mode)
            .map(|s| s.is_busy() || s.history_loading())
            .unwrap_or(false)
    }

    // Selection helpers
    pub fn selected_table_camera(&self) -> Option<&Camera> {
        self.camera_table_state.selected().and_then(|i| self.cameras.get(i))
    }

    pub fn selected_roster_camera(&self) -> Option<&Camera> {
        self.roster_state.selected().and_then(|i| self.cameras.get(i))
    }

    pub fn picker_camera(&self) -> Option<&Camera> {
        self.camera_picker_state.selected().and_then(|i| self.cameras.get(i))
    }

    // Roster navigation
    pub fn camera_table_down(&mut self) {
        let len = self.cameras.len();
        if len > 0 {
            let i = self.camera_table_state.selected().unwrap_or(0);
            self.camera_table_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn camera_table_up(&mut self) {
        let i = self.camera_table_state.selected().unwrap_or(0);
        self.camera_table_state.select(Some(i.saturating_sub(1)));
    }

    pub fn roster_down(&mut self) {
        let len = self.cameras.len();
        if len > 0 {
            let i = self.roster_state.selected().unwrap_or(0);
            self.roster_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn roster_up(&mut self) {
        let i = self.roster_state.selected().unwrap_or(0);
        self.roster_state.select(Some(i.saturating_sub(1)));
    }

    pub fn picker_down(&mut self) {
        let len = self.cameras.len();
        if len > 0 {
            let i = self.camera_picker_state.selected().unwrap_or(0);
            self.camera_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn picker_up(&mut self) {
        let i = self.camera_picker_state.selected().unwrap_or(0);
        self.camera_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn transcript_down(&mut self) {
        let len = self.transcript_rows.len();
        if len > 0 {
            let i = self.transcript_table_state.selected().unwrap_or(0);
            self.transcript_table_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn transcript_up(&mut self) {
        let i = self.transcript_table_state.selected().unwrap_or(0);
        self.transcript_table_state.select(Some(i.saturating_sub(1)));
    }

    // Activity tabs
    pub fn next_activity(&mut self) {
        let all = Activity::all();
        let i = all.iter().position(|a| *a == self.activity).unwrap_or(0);
        self.set_activity(all[(i + 1) % all.len()]);
    }

    pub fn prev_activity(&mut self) {
        let all = Activity::all();
        let i = all.iter().position(|a| *a == self.activity).unwrap_or(0);
        self.set_activity(all[(i + all.len() - 1) % all.len()]);
    }

    fn set_activity(&mut self, activity: Activity) {
        if self.activity == activity {
            return;
        }
        self.activity = activity;
        // Rows from the previous activity must never show under the new tab
        self.transcript_rows.clear();
        self.transcript_table_state.select(None);
        if self.transcripts_camera.is_some() {
            self.request_transcripts();
        }
    }

    // Chat mode tabs
    pub fn set_chat_mode(&mut self, mode: ChatMode) {
        if self.chat_mode != mode {
            self.chat_mode = mode;
            self.scroll_chat_to_bottom();
        }
    }

    pub fn next_chat_mode(&mut self) {
        let all = ChatMode::all();
        let i = all.iter().position(|m| *m == self.chat_mode).unwrap_or(0);
        self.set_chat_mode(all[(i + 1) % all.len()]);
    }

    // Toasts
    pub fn toast(&mut self, kind: ToastKind, text: &str) {
        self.toasts.push(Toast {
            text: text.to_string(),
            kind,
            born: Instant::now(),
        });
    }

    pub fn prune_toasts(&mut self) {
        self.toasts.retain(|t| t.born.elapsed() < TOAST_TTL);
    }

    pub fn dismiss_toasts(&mut self) {
        self.toasts.clear();
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.chat_waiting()
            || self.cameras_loading
            || self.analytics_loading
            || self.transcripts_loading
        {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Camera form popup
    pub fn open_add_form(&mut self) {
        self.camera_form = Some(CameraForm::new_add());
        self.input_mode = InputMode::Editing;
    }

    pub fn open_edit_form(&mut self) {
        if let Some(camera) = self.selected_table_camera().cloned() {
            self.camera_form = Some(CameraForm::new_edit(&camera));
            self.input_mode = InputMode::Editing;
        }
    }

    pub fn close_form(&mut self) {
        self.camera_form = None;
        self.input_mode = InputMode::Normal;
    }

    /// Validate the open form and fire the add/update request. The popup
    /// closes as soon as the request is on its way; the result comes back
    /// as a toast.
    pub fn save_camera_form(&mut self) {
        let form = match &self.camera_form {
            Some(form) => form.clone(),
            None => return,
        };
        if let Err(reason) = form.validate() {
            self.toast(ToastKind::Error, reason);
            return;
        }

        let client = self.client.clone();
        let tx = self.events.clone();
        match &form.editing {
            Some(original) => {
                let camera = Camera {
                    id: original.id,
                    name: form.name.trim().to_string(),
                    url: form.url.trim().to_string(),
                    live: original.live,
                    email: form.email.trim().to_string(),
                    monitoring: form.monitoring,
                };
                tokio::spawn(async move {
                    let result = client.update_camera(&camera).await;
                    let _ = tx.send(AppEvent::CameraSaved { updated: true, result });
                });
            }
            None => {
                let draft = CameraDraft {
                    name: form.name.trim().to_string(),
                    url: form.url.trim().to_string(),
                    live: false,
                    email: form.email.trim().to_string(),
                    monitoring: form.monitoring,
                };
                tokio::spawn(async move {
                    let result = client.add_camera(&draft).await;
                    let _ = tx.send(AppEvent::CameraSaved { updated: false, result });
                });
            }
        }
        self.close_form();
    }

    /// Flip the monitoring flag of the highlighted camera in the local
    /// cache only. Persisting the change goes through the edit form.
    pub fn toggle_monitoring(&mut self) {
        if let Some(i) = self.camera_table_state.selected() {
            if let Some(camera) = self.cameras.get_mut(i) {
                camera.monitoring = !camera.monitoring;
            }
        }
    }

    // Request spawns. Every task reports back through the event channel,
    // tagged with the identity it was issued for.
    pub fn request_cameras(&mut self) {
        if self.cameras_loading {
            return;
        }
        self.cameras_loading = true;
        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = client.list_cameras().await;
            let _ = tx.send(AppEvent::CamerasLoaded(result));
        });
    }

    pub fn request_analytics(&mut self, camera: Camera) {
        self.analytics_report = None;
        self.analytics_loading = true;
        self.analytics_camera = Some(camera.clone());
        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = client.analytics(camera.id).await;
            let _ = tx.send(AppEvent::AnalyticsLoaded {
                camera_id: camera.id,
                result,
            });
        });
    }

    pub fn request_transcripts(&mut self) {
        let camera_id = match self.transcripts_camera.as_ref() {
            Some(camera) => camera.id,
            None => return,
        };
        self.transcript_rows.clear();
        self.transcript_table_state.select(None);
        self.transcripts_loading = true;
        let activity = self.activity;
        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = client.transcripts(activity, camera_id).await;
            let _ = tx.send(AppEvent::TranscriptsLoaded {
                activity,
                camera_id,
                result,
            });
        });
    }

    /// Point the active chat session at `camera` and reload its history.
    pub fn select_chat_camera(&mut self, camera: Camera) {
        let mode = self.chat_mode;
        let generation = self.session_mut(mode).select_camera(camera.clone());
        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = client.chat_history(mode, camera.id).await;
            let _ = tx.send(AppEvent::ChatHistoryLoaded {
                mode,
                generation,
                result,
            });
        });
    }

    /// Try to send the input box content on the active session.
    /// Returns true when a request was actually dispatched.
    pub fn send_chat_message(&mut self) -> bool {
        let mode = self.chat_mode;
        let query = self.chat_input.trim().to_string();
        let now = chat::now_stamp();

        match self.session_mut(mode).begin_send(&query, &now) {
            Ok(ticket) => {
                self.chat_input.clear();
                self.chat_cursor = 0;
                self.scroll_chat_to_bottom();
                let client = self.client.clone();
                let tx = self.events.clone();
                tokio::spawn(async move {
                    let result = client.send_chat(ticket.mode, ticket.camera_id, &query).await;
                    let _ = tx.send(AppEvent::ChatResolved { ticket, result });
                });
                true
            }
            Err(SendRejected::EmptyInput) => false,
            Err(SendRejected::NoCamera) => {
                self.warning = Some("Select a camera before sending a message.".to_string());
                false
            }
            Err(SendRejected::RequestInFlight) => {
                self.toast(ToastKind::Info, "Still waiting on the previous message.");
                false
            }
            Err(SendRejected::HistoryLoading) => {
                self.toast(ToastKind::Info, "Conversation history is still loading.");
                false
            }
        }
    }

    /// Write the inline frames of the latest fulfilled reply to disk.
    pub fn save_frames_of_last_reply(&mut self) {
        let mode = self.chat_mode;
        let download_dir = self.download_dir.clone();
        let message = match self.session_mut(mode).last_completed() {
            Some(message) => message.clone(),
            None => {
                self.toast(ToastKind::Info, "No completed reply to save frames from.");
                return;
            }
        };
        if message.frames.is_empty() {
            self.toast(ToastKind::Info, "The last reply has no frames attached.");
            return;
        }

        match chat::save_frames(&message, &download_dir) {
            Ok(saved) if saved.is_empty() => {
                self.toast(
                    ToastKind::Info,
                    "The last reply only references stored footage; nothing to save.",
                );
            }
            Ok(saved) => {
                let text = format!(
                    "Saved {} frame image(s) to {}",
                    saved.len(),
                    download_dir.display()
                );
                self.toast(ToastKind::Success, &text);
            }
            Err(err) => {
                tracing::warn!("frame save failed: {err:#}");
                self.toast(
                    ToastKind::Error,
                    "Could not save frame images. See the log for details.",
                );
            }
        }
    }

    /// Scroll chat to bottom so the newest round (or "Thinking...") is
    /// visible. Mirrors the layout produced by the chat renderer.
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_area_width > 0 {
            self.chat_area_width as usize
        } else {
            50
        };

        let mode = self.chat_mode;
        let mut total_lines: u16 = 0;
        for msg in self.session_mut(mode).messages() {
            total_lines += 1; // "You [..]:" line
            total_lines += wrapped_line_count(&msg.input, wrap_width);
            total_lines += 1; // "AI [..]:" line
            if msg.pending {
                total_lines += 1; // Thinking indicator
            } else {
                total_lines += wrapped_line_count(&msg.response, wrap_width);
            }
            if !msg.frames.is_empty() {
                total_lines += 1; // "[n frames attached]" line
            }
            total_lines += 1; // Blank line after round
        }

        let visible_height = if self.chat_area_height > 0 {
            self.chat_area_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        } else {
            self.chat_scroll = 0;
        }
    }
}

fn wrapped_line_count(text: &str, wrap_width: usize) -> u16 {
    let mut lines: u16 = 0;
    for line in text.lines() {
        // Use character count, not byte length, for proper UTF-8 handling
        let char_count = line.chars().count();
        if char_count == 0 {
            lines += 1; // Empty line still takes one line
        } else {
            lines += ((char_count / wrap_width) + 1) as u16;
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_requires_name_url_and_valid_email() {
        let mut form = CameraForm::new_add();
        assert!(form.validate().is_err());

        form.name = "Gate".to_string();
        form.url = "rtsp://10.0.0.5/stream".to_string();
        form.email = "not-an-email".to_string();
        assert!(form.validate().is_err());

        form.email = "alerts@example.com".to_string();
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_edit_form_carries_the_original_record() {
        let camera = Camera {
            id: 9,
            name: "Gate".to_string(),
            url: "rtsp://10.0.0.5/stream".to_string(),
            live: true,
            email: "alerts@example.com".to_string(),
            monitoring: false,
        };

        let form = CameraForm::new_edit(&camera);

        assert_eq!(form.editing.as_ref().map(|c| c.id), Some(9));
        assert_eq!(form.title(), "Edit Camera");
        assert_eq!(form.cursor, 4);
    }

    #[test]
    fn test_field_cycle_moves_cursor_to_end_of_field() {
        let mut form = CameraForm::new_add();
        form.name = "abc".to_string();

        form.field_down();
        assert_eq!(form.field, FormField::Url);
        assert_eq!(form.cursor, 0);

        form.field_up();
        assert_eq!(form.field, FormField::Name);
        assert_eq!(form.cursor, 3);
    }

    #[test]
    fn test_wrapped_line_count_handles_blank_and_long_lines() {
        assert_eq!(wrapped_line_count("short", 50), 1);
        assert_eq!(wrapped_line_count("a\n\nb", 50), 3);
        assert_eq!(wrapped_line_count(&"x".repeat(120), 50), 3);
    }
}
