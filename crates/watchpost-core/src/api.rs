//! Typed client for the surveillance backend.
//!
//! One method per endpoint, each parsing into the declared schema so a
//! contract drift surfaces as an error at the call site instead of
//! half-rendered data. Camera, analytics and transcript endpoints always go
//! to the main backend; chat goes to whichever base the mode names.

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::analytics::AnalyticsReport;
use crate::camera::{Camera, CameraDraft};
use crate::chat::{ChatMode, ChatRecord, ChatReply};
use crate::transcript::{Activity, TranscriptRow};

#[derive(Serialize)]
struct ChatQuery<'a> {
    user_query: &'a str,
}

/// Handle on the backend endpoints. Cheap to clone; spawned request tasks
/// each take their own copy.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    local_chat_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str, local_chat_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            local_chat_url: local_chat_url.trim_end_matches('/').to_string(),
        }
    }

    fn chat_base(&self, mode: ChatMode) -> &str {
        match mode {
            ChatMode::Cloud => &self.base_url,
            ChatMode::LocalEdge => &self.local_chat_url,
        }
    }

    pub async fn list_cameras(&self) -> Result<Vec<Camera>> {
        let url = format!("{}/getcams", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Camera list request failed with status: {}",
                response.status()
            ));
        }

        let cameras: Vec<Camera> = response.json().await?;
        Ok(cameras)
    }

    pub async fn add_camera(&self, draft: &CameraDraft) -> Result<Camera> {
        let url = format!("{}/addcams", self.base_url);

        let response = self.client.post(&url).json(draft).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Add camera failed {}: {}", status, text));
        }

        let camera: Camera = response.json().await?;
        Ok(camera)
    }

    pub async fn update_camera(&self, camera: &Camera) -> Result<Camera> {
        let url = format!("{}/updatecam/{}", self.base_url, camera.id);

        let response = self.client.put(&url).json(camera).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Update camera {} failed {}: {}", camera.id, status, text));
        }

        let updated: Camera = response.json().await?;
        Ok(updated)
    }

    /// Aggregate report for one camera. The endpoint answers with an array;
    /// an empty array means no footage has been analyzed yet and maps to
    /// `None`.
    pub async fn analytics(&self, camera_id: i64) -> Result<Option<AnalyticsReport>> {
        let url = format!("{}/analytics/{}", self.base_url, camera_id);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Analytics request failed with status: {}",
                response.status()
            ));
        }

        let mut reports: Vec<AnalyticsReport> = response.json().await?;
        if reports.is_empty() {
            Ok(None)
        } else {
            Ok(Some(reports.remove(0)))
        }
    }

    pub async fn transcripts(
        &self,
        activity: Activity,
        camera_id: i64,
    ) -> Result<Vec<TranscriptRow>> {
        let url = format!("{}/transcripts/{}/{}", self.base_url, activity.as_str(), camera_id);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Transcripts request failed with status: {}",
                response.status()
            ));
        }

        let rows: Vec<TranscriptRow> = response.json().await?;
        Ok(rows)
    }

    pub async fn chat_history(&self, mode: ChatMode, camera_id: i64) -> Result<Vec<ChatRecord>> {
        let url = format!("{}/chat/{}", self.chat_base(mode), camera_id);
        debug!(mode = mode.as_str(), camera_id, "fetching chat history");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Chat history request failed with status: {}",
                response.status()
            ));
        }

        let records: Vec<ChatRecord> = response.json().await?;
        Ok(records)
    }

    /// Send one user query for `camera_id`. No client-side timeout: the
    /// backend replays the footage it needs before answering, which can take
    /// a while, and the session layer keeps the UI usable in the meantime.
    pub async fn send_chat(
        &self,
        mode: ChatMode,
        camera_id: i64,
        user_query: &str,
    ) -> Result<ChatReply> {
        let url = format!("{}/chat/{}", self.chat_base(mode), camera_id);
        debug!(mode = mode.as_str(), camera_id, "sending chat query");

        let request = ChatQuery { user_query };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Chat request failed {}: {}", status, text));
        }

        let reply: ChatReply = response.json().await?;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_urls_are_normalized() {
        let client = BackendClient::new("https://api.backend.stream/", "http://127.0.0.1:5000/");
        assert_eq!(client.base_url, "https://api.backend.stream");
        assert_eq!(client.local_chat_url, "http://127.0.0.1:5000");
    }

    #[test]
    fn test_chat_base_follows_mode() {
        let client = BackendClient::new("https://api.backend.stream", "http://127.0.0.1:5000");
        assert_eq!(client.chat_base(ChatMode::Cloud), "https://api.backend.stream");
        assert_eq!(client.chat_base(ChatMode::LocalEdge), "http://127.0.0.1:5000");
    }

    #[test]
    fn test_chat_query_body_shape() {
        let body = serde_json::to_value(ChatQuery {
            user_query: "any movement?",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "user_query": "any movement?" }));
    }
}
