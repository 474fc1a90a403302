//! Conversation state for the camera chat panel.
//!
//! Each chat mode owns one [`ChatSession`]: the selected camera, the message
//! sequence scoped to that camera, and the bookkeeping that keeps late
//! network replies out of the wrong conversation. Sessions never touch the
//! network themselves; callers issue the requests and feed results back in,
//! tagged with the identity the session handed out.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::camera::Camera;

/// Response text shown when a send fails before the backend produced an
/// answer. Matches the wording the backend uses for its own outages so both
/// failure paths read the same in the transcript.
pub const SEND_FAILURE_TEXT: &str =
    "Query service temporarily unavailable. Please try after sometime.";

/// The two places a camera conversation can run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatMode {
    /// Hosted model behind the main backend.
    Cloud,
    /// Model running on the edge box next to the cameras.
    LocalEdge,
}

impl ChatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatMode::Cloud => "cloud",
            ChatMode::LocalEdge => "local-edge",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ChatMode::Cloud => "Cloud (AIMLAPI)",
            ChatMode::LocalEdge => "Local Edge",
        }
    }

    pub fn all() -> Vec<ChatMode> {
        vec![ChatMode::Cloud, ChatMode::LocalEdge]
    }
}

/// A frame attached to a chat response: either a reference into stored
/// footage or an inline base64 image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FramePayload {
    Reference(i64),
    Image(String),
}

/// A persisted conversation round as returned by the history endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRecord {
    pub user_query: String,
    pub response: String,
    pub timestamp: String,
    #[serde(default)]
    pub frames: Vec<FramePayload>,
}

/// The backend's answer to a chat send.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub frames: Vec<FramePayload>,
}

/// One round in the on-screen conversation.
///
/// Appended optimistically when the user sends, then mutated in place
/// exactly once when the round fulfills or fails. The ticket is unique
/// within the owning session and is how replies find their round.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub ticket: u64,
    /// Camera the round was sent for.
    pub camera_id: i64,
    pub input: String,
    pub response: String,
    pub pending: bool,
    pub sent_at: String,
    /// Unset while pending and for rounds that failed.
    pub received_at: Option<String>,
    pub frames: Vec<FramePayload>,
}

/// Identity of an in-flight send: which session it belongs to, which camera
/// it was issued for, and which round it must resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendTicket {
    pub mode: ChatMode,
    pub camera_id: i64,
    pub ticket: u64,
}

/// Why a send was refused without touching the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejected {
    /// Input was empty after trimming.
    EmptyInput,
    /// No camera is selected for the mode.
    NoCamera,
    /// A previous send for the mode has not resolved yet.
    RequestInFlight,
    /// The history fetch for the current camera is still running.
    HistoryLoading,
}

/// What applying a send result did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Fulfilled,
    Failed,
    /// The reply arrived for a superseded camera or a round that no longer
    /// exists; the transcript was left untouched.
    Dropped,
}

/// What applying a history result did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOutcome {
    Replaced,
    Failed,
    /// The result was tagged with a superseded generation.
    Dropped,
}

/// Conversation state for one chat mode.
///
/// All mutation happens on the caller's event-loop thread. Every history
/// fetch is tagged with a generation and every send with a ticket; results
/// carrying a stale tag are dropped instead of landing in whatever the
/// session looks like by the time they arrive.
pub struct ChatSession {
    mode: ChatMode,
    camera: Option<Camera>,
    messages: Vec<ChatMessage>,
    next_ticket: u64,
    in_flight: Option<u64>,
    history_loading: bool,
    history_gen: u64,
}

impl ChatSession {
    pub fn new(mode: ChatMode) -> Self {
        Self {
            mode,
            camera: None,
            messages: Vec::new(),
            next_ticket: 1,
            in_flight: None,
            history_loading: false,
            history_gen: 0,
        }
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    pub fn camera_id(&self) -> Option<i64> {
        self.camera.as_ref().map(|c| c.id)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// True while a send for this session has not resolved.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn history_loading(&self) -> bool {
        self.history_loading
    }

    /// Most recent fulfilled round, if any.
    pub fn last_completed(&self) -> Option<&ChatMessage> {
        self.messages
            .iter()
            .rev()
            .find(|m| !m.pending && m.received_at.is_some())
    }

    /// Select `camera` and start a history reload for it.
    ///
    /// Switching to a different camera clears the transcript immediately;
    /// reselecting the current one keeps it on screen until fresh history
    /// arrives. Returns the generation the history fetch must be tagged
    /// with.
    pub fn select_camera(&mut self, camera: Camera) -> u64 {
        if self.camera_id() != Some(camera.id) {
            self.messages.clear();
        }
        self.camera = Some(camera);
        self.history_gen += 1;
        self.history_loading = true;
        self.history_gen
    }

    /// Append the optimistic user round and reserve its ticket.
    ///
    /// The caller issues the network request only when this returns `Ok`,
    /// tagging it with the returned [`SendTicket`].
    pub fn begin_send(&mut self, input: &str, now: &str) -> Result<SendTicket, SendRejected> {
        let input = input.trim();
        if input.is_empty() {
            return Err(SendRejected::EmptyInput);
        }
        let camera_id = match self.camera_id() {
            Some(id) => id,
            None => return Err(SendRejected::NoCamera),
        };
        if self.in_flight.is_some() {
            return Err(SendRejected::RequestInFlight);
        }
        if self.history_loading {
            return Err(SendRejected::HistoryLoading);
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.messages.push(ChatMessage {
            ticket,
            camera_id,
            input: input.to_string(),
            response: String::new(),
            pending: true,
            sent_at: now.to_string(),
            received_at: None,
            frames: Vec::new(),
        });
        self.in_flight = Some(ticket);

        Ok(SendTicket {
            mode: self.mode,
            camera_id,
            ticket,
        })
    }

    /// Apply the network result for a send.
    ///
    /// The in-flight gate opens as soon as the matching ticket resolves,
    /// whatever the outcome. The transcript only changes when the ticket's
    /// camera is still the selected one and its round still exists.
    pub fn resolve(
        &mut self,
        ticket: &SendTicket,
        result: Result<ChatReply>,
        now: &str,
    ) -> SendOutcome {
        if self.in_flight == Some(ticket.ticket) {
            self.in_flight = None;
        }
        if self.camera_id() != Some(ticket.camera_id) {
            debug!(
                mode = self.mode.as_str(),
                ticket = ticket.ticket,
                "dropping reply for superseded camera"
            );
            return SendOutcome::Dropped;
        }
        let message = match self.messages.iter_mut().find(|m| m.ticket == ticket.ticket) {
            Some(m) => m,
            None => return SendOutcome::Dropped,
        };

        match result {
            Ok(reply) => {
                message.response = reply.response;
                message.frames = reply.frames;
                message.pending = false;
                message.received_at = Some(now.to_string());
                SendOutcome::Fulfilled
            }
            Err(err) => {
                debug!(
                    mode = self.mode.as_str(),
                    ticket = ticket.ticket,
                    "send failed: {err:#}"
                );
                message.response = SEND_FAILURE_TEXT.to_string();
                message.pending = false;
                SendOutcome::Failed
            }
        }
    }

    /// Apply the history fetch result tagged with `generation`.
    ///
    /// Success replaces the transcript wholesale with the persisted rounds.
    /// Failure leaves it empty so the panel never shows history that may
    /// belong to a different camera.
    pub fn apply_history(
        &mut self,
        generation: u64,
        result: Result<Vec<ChatRecord>>,
    ) -> HistoryOutcome {
        if generation != self.history_gen {
            return HistoryOutcome::Dropped;
        }
        let camera_id = match self.camera_id() {
            Some(id) => id,
            None => return HistoryOutcome::Dropped,
        };
        self.history_loading = false;

        match result {
            Ok(records) => {
                let mut messages = Vec::with_capacity(records.len());
                for record in records {
                    let stamp = clock_time(&record.timestamp);
                    let ticket = self.next_ticket;
                    self.next_ticket += 1;
                    messages.push(ChatMessage {
                        ticket,
                        camera_id,
                        input: record.user_query,
                        response: record.response,
                        pending: false,
                        sent_at: stamp.clone(),
                        received_at: Some(stamp),
                        frames: record.frames,
                    });
                }
                self.messages = messages;
                HistoryOutcome::Replaced
            }
            Err(err) => {
                debug!(
                    mode = self.mode.as_str(),
                    camera_id,
                    "history fetch failed: {err:#}"
                );
                self.messages.clear();
                HistoryOutcome::Failed
            }
        }
    }
}

/// Wall-clock stamp for locally initiated rounds.
pub fn now_stamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Clock time extracted from a backend timestamp. Unrecognized shapes come
/// back unchanged rather than erroring a whole history load.
pub fn clock_time(stamp: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(stamp) {
        return dt.format("%H:%M:%S").to_string();
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(stamp, fmt) {
            return dt.format("%H:%M:%S").to_string();
        }
    }
    stamp.to_string()
}

/// Write the inline frames of `message` into `dir` as image files.
///
/// Bare frame references carry no pixels and are skipped. Returns the paths
/// written.
pub fn save_frames(message: &ChatMessage, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let mut saved = Vec::new();
    for (idx, frame) in message.frames.iter().enumerate() {
        let data = match frame {
            FramePayload::Image(data) => data,
            FramePayload::Reference(_) => continue,
        };
        // Tolerate browser-style data URLs as well as raw base64.
        let (ext, encoded) = match data.split_once("base64,") {
            Some((header, rest)) => (if header.contains("png") { "png" } else { "jpg" }, rest),
            None => ("jpg", data.as_str()),
        };
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| anyhow!("Frame {} is not valid base64: {}", idx, e))?;

        let path = dir.join(format!(
            "cam{}_msg{}_frame{}.{}",
            message.camera_id, message.ticket, idx, ext
        ));
        std::fs::write(&path, bytes)?;
        saved.push(path);
    }
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(id: i64, name: &str) -> Camera {
        Camera {
            id,
            name: name.to_string(),
            url: format!("rtsp://10.0.0.{}/stream", id),
            live: true,
            email: "alerts@example.com".to_string(),
            monitoring: true,
        }
    }

    fn record(query: &str, response: &str) -> ChatRecord {
        ChatRecord {
            user_query: query.to_string(),
            response: response.to_string(),
            timestamp: "2024-05-01T12:30:45.123456".to_string(),
            frames: Vec::new(),
        }
    }

    /// Session with a selected camera and finished (empty) history load.
    fn ready_session(camera_id: i64) -> ChatSession {
        let mut session = ChatSession::new(ChatMode::Cloud);
        let generation = session.select_camera(camera(camera_id, "Cam01"));
        session.apply_history(generation, Ok(Vec::new()));
        session
    }

    #[test]
    fn test_send_appends_one_pending_message() {
        let mut session = ready_session(1);

        let ticket = session.begin_send("test", "10:00:00").unwrap();

        assert_eq!(session.messages().len(), 1);
        let msg = &session.messages()[0];
        assert_eq!(msg.input, "test");
        assert!(msg.pending);
        assert!(msg.response.is_empty());
        assert_eq!(msg.sent_at, "10:00:00");
        assert_eq!(msg.received_at, None);
        assert_eq!(ticket.camera_id, 1);
        assert!(session.is_busy());
    }

    #[test]
    fn test_reply_fulfills_the_pending_round() {
        let mut session = ready_session(1);
        let ticket = session.begin_send("test", "10:00:00").unwrap();

        let reply = ChatReply {
            response: "ok".to_string(),
            frames: Vec::new(),
        };
        let outcome = session.resolve(&ticket, Ok(reply), "10:00:05");

        assert_eq!(outcome, SendOutcome::Fulfilled);
        assert!(!session.is_busy());
        let msg = &session.messages()[0];
        assert_eq!(msg.input, "test");
        assert_eq!(msg.response, "ok");
        assert!(!msg.pending);
        assert_eq!(msg.received_at.as_deref(), Some("10:00:05"));
    }

    #[test]
    fn test_blank_input_is_rejected_silently() {
        let mut session = ready_session(1);

        assert_eq!(
            session.begin_send("   \t ", "10:00:00"),
            Err(SendRejected::EmptyInput)
        );
        assert!(session.messages().is_empty());
        assert!(!session.is_busy());
    }

    #[test]
    fn test_send_without_camera_is_rejected() {
        let mut session = ChatSession::new(ChatMode::LocalEdge);

        assert_eq!(
            session.begin_send("anything there?", "10:00:00"),
            Err(SendRejected::NoCamera)
        );
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_overlapping_sends_are_rejected() {
        let mut session = ready_session(1);
        session.begin_send("first", "10:00:00").unwrap();

        assert_eq!(
            session.begin_send("second", "10:00:01"),
            Err(SendRejected::RequestInFlight)
        );
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn test_send_is_rejected_while_history_loads() {
        let mut session = ChatSession::new(ChatMode::Cloud);
        session.select_camera(camera(1, "Cam01"));

        assert_eq!(
            session.begin_send("hello", "10:00:00"),
            Err(SendRejected::HistoryLoading)
        );
    }

    #[test]
    fn test_failed_send_keeps_input_and_sets_error_text() {
        let mut session = ready_session(1);
        let ticket = session.begin_send("what happened overnight?", "10:00:00").unwrap();

        let outcome = session.resolve(&ticket, Err(anyhow!("connection refused")), "10:00:05");

        assert_eq!(outcome, SendOutcome::Failed);
        assert!(!session.is_busy());
        let msg = &session.messages()[0];
        assert_eq!(msg.input, "what happened overnight?");
        assert_eq!(msg.response, SEND_FAILURE_TEXT);
        assert!(!msg.pending);
        assert_eq!(msg.received_at, None);
    }

    #[test]
    fn test_switching_cameras_replaces_transcript() {
        let mut session = ready_session(1);
        let ticket = session.begin_send("old camera question", "10:00:00").unwrap();
        session.resolve(
            &ticket,
            Ok(ChatReply {
                response: "old answer".to_string(),
                frames: Vec::new(),
            }),
            "10:00:05",
        );

        let generation = session.select_camera(camera(2, "Cam02"));
        assert!(session.messages().is_empty());
        assert!(session.history_loading());

        let outcome = session.apply_history(generation, Ok(vec![record("stored", "reply")]));
        assert_eq!(outcome, HistoryOutcome::Replaced);
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].input, "stored");
        assert!(session
            .messages()
            .iter()
            .all(|m| m.input != "old camera question"));
    }

    #[test]
    fn test_reselecting_same_camera_keeps_transcript_until_refresh() {
        let mut session = ready_session(1);
        let ticket = session.begin_send("still there?", "10:00:00").unwrap();
        session.resolve(
            &ticket,
            Ok(ChatReply {
                response: "yes".to_string(),
                frames: Vec::new(),
            }),
            "10:00:05",
        );

        session.select_camera(camera(1, "Cam01"));

        assert_eq!(session.messages().len(), 1);
        assert!(session.history_loading());
    }

    #[test]
    fn test_reply_for_superseded_camera_is_dropped() {
        let mut session = ready_session(1);
        let ticket = session.begin_send("question for cam 1", "10:00:00").unwrap();
        session.select_camera(camera(2, "Cam02"));

        let outcome = session.resolve(
            &ticket,
            Ok(ChatReply {
                response: "late answer".to_string(),
                frames: Vec::new(),
            }),
            "10:00:09",
        );

        assert_eq!(outcome, SendOutcome::Dropped);
        assert!(session.messages().is_empty());
        // The gate still opens so the new camera is not blocked forever.
        assert!(!session.is_busy());
    }

    #[test]
    fn test_stale_history_result_is_dropped() {
        let mut session = ChatSession::new(ChatMode::Cloud);
        let old_generation = session.select_camera(camera(2, "Cam02"));
        let current = session.select_camera(camera(3, "Cam03"));

        let outcome = session.apply_history(old_generation, Ok(vec![record("stale", "rows")]));
        assert_eq!(outcome, HistoryOutcome::Dropped);
        assert!(session.messages().is_empty());
        assert!(session.history_loading());

        assert_eq!(session.apply_history(current, Ok(Vec::new())), HistoryOutcome::Replaced);
        assert!(!session.history_loading());
    }

    #[test]
    fn test_history_failure_leaves_transcript_empty() {
        let mut session = ChatSession::new(ChatMode::Cloud);
        let generation = session.select_camera(camera(1, "Cam01"));

        let outcome = session.apply_history(generation, Err(anyhow!("504 from upstream")));

        assert_eq!(outcome, HistoryOutcome::Failed);
        assert!(!session.history_loading());
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_history_rounds_use_backend_clock_time() {
        let mut session = ChatSession::new(ChatMode::Cloud);
        let generation = session.select_camera(camera(1, "Cam01"));

        session.apply_history(generation, Ok(vec![record("q", "a")]));

        let msg = &session.messages()[0];
        assert_eq!(msg.sent_at, "12:30:45");
        assert_eq!(msg.received_at.as_deref(), Some("12:30:45"));
        assert!(!msg.pending);
    }

    #[test]
    fn test_tickets_stay_unique_across_history_reload() {
        let mut session = ChatSession::new(ChatMode::Cloud);
        let generation = session.select_camera(camera(1, "Cam01"));
        session.apply_history(generation, Ok(vec![record("a", "b"), record("c", "d")]));
        session.begin_send("fresh", "10:00:00").unwrap();

        let mut tickets: Vec<u64> = session.messages().iter().map(|m| m.ticket).collect();
        tickets.sort_unstable();
        tickets.dedup();
        assert_eq!(tickets.len(), session.messages().len());
    }

    #[test]
    fn test_last_completed_skips_pending_and_failed_rounds() {
        let mut session = ready_session(1);
        let first = session.begin_send("first", "10:00:00").unwrap();
        session.resolve(
            &first,
            Ok(ChatReply {
                response: "answer".to_string(),
                frames: vec![FramePayload::Reference(9)],
            }),
            "10:00:02",
        );
        let second = session.begin_send("second", "10:00:05").unwrap();
        session.resolve(&second, Err(anyhow!("down")), "10:00:06");
        session.begin_send("third", "10:00:10").unwrap();

        let last = session.last_completed().unwrap();
        assert_eq!(last.input, "first");
    }

    #[test]
    fn test_clock_time_parses_backend_stamps_and_falls_back() {
        assert_eq!(clock_time("2024-05-01T12:30:45.123456"), "12:30:45");
        assert_eq!(clock_time("2024-05-01 08:05:00"), "08:05:00");
        assert_eq!(clock_time("2024-05-01T12:30:45+00:00"), "12:30:45");
        assert_eq!(clock_time("yesterday"), "yesterday");
    }

    #[test]
    fn test_frame_payload_parses_numbers_and_strings() {
        let frames: Vec<FramePayload> = serde_json::from_str(r#"[12, "aGVsbG8="]"#).unwrap();
        assert_eq!(
            frames,
            vec![
                FramePayload::Reference(12),
                FramePayload::Image("aGVsbG8=".to_string())
            ]
        );
    }

    fn message_with_frames(frames: Vec<FramePayload>) -> ChatMessage {
        ChatMessage {
            ticket: 7,
            camera_id: 3,
            input: "show me".to_string(),
            response: "here".to_string(),
            pending: false,
            sent_at: "10:00:00".to_string(),
            received_at: Some("10:00:01".to_string()),
            frames,
        }
    }

    #[test]
    fn test_save_frames_writes_inline_images_only() {
        let dir = tempfile::tempdir().unwrap();
        let message = message_with_frames(vec![
            FramePayload::Reference(12),
            FramePayload::Image(STANDARD.encode(b"jpeg bytes")),
        ]);

        let saved = save_frames(&message, dir.path()).unwrap();

        assert_eq!(saved.len(), 1);
        assert_eq!(std::fs::read(&saved[0]).unwrap(), b"jpeg bytes");
        let name = saved[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("cam3_msg7_"));
        assert!(name.ends_with(".jpg"));
    }

    #[test]
    fn test_save_frames_strips_data_url_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let encoded = format!("data:image/png;base64,{}", STANDARD.encode(b"png bytes"));
        let message = message_with_frames(vec![FramePayload::Image(encoded)]);

        let saved = save_frames(&message, dir.path()).unwrap();

        assert_eq!(saved.len(), 1);
        assert!(saved[0].to_string_lossy().ends_with(".png"));
        assert_eq!(std::fs::read(&saved[0]).unwrap(), b"png bytes");
    }

    #[test]
    fn test_save_frames_rejects_bad_base64() {
        let dir = tempfile::tempdir().unwrap();
        let message = message_with_frames(vec![FramePayload::Image("not base64!!".to_string())]);

        assert!(save_frames(&message, dir.path()).is_err());
    }
}
