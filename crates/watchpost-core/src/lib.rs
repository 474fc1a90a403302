pub mod analytics;
pub mod api;
pub mod camera;
pub mod chat;
pub mod config;
pub mod transcript;

// Re-export main types for convenience
pub use analytics::AnalyticsReport;
pub use api::BackendClient;
pub use camera::{Camera, CameraDraft};
pub use chat::{
    ChatMessage, ChatMode, ChatRecord, ChatReply, ChatSession, FramePayload, HistoryOutcome,
    SendOutcome, SendRejected, SendTicket,
};
pub use config::Config;
pub use transcript::{Activity, TranscriptRow};
