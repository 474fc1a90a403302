//! Camera roster types shared with the backend registry.
//!
//! Field names follow the backend's JSON contract; the client never invents
//! ids, the registry assigns them on creation.

use serde::{Deserialize, Serialize};

/// A registered camera as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub id: i64,
    pub name: String,
    /// Stream locator for the camera feed.
    pub url: String,
    pub live: bool,
    /// Address that receives alert notifications for this camera.
    pub email: String,
    #[serde(rename = "monitoringStatus")]
    pub monitoring: bool,
}

impl Camera {
    /// Roster label, e.g. `Cam01 (Live)`.
    pub fn display_name(&self) -> String {
        if self.live {
            format!("{} (Live)", self.name)
        } else {
            format!("{} (Offline)", self.name)
        }
    }
}

/// Payload for registering a new camera. Same shape as [`Camera`] minus the
/// id. New cameras start offline; the backend flips `live` once the stream
/// is up.
#[derive(Debug, Clone, Serialize)]
pub struct CameraDraft {
    pub name: String,
    pub url: String,
    pub live: bool,
    pub email: String,
    #[serde(rename = "monitoringStatus")]
    pub monitoring: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_parses_backend_field_names() {
        let json = r#"{
            "id": 1,
            "name": "Cam01",
            "url": "rtsp://10.0.0.5/stream",
            "live": true,
            "email": "alerts@example.com",
            "monitoringStatus": false
        }"#;

        let camera: Camera = serde_json::from_str(json).unwrap();
        assert_eq!(camera.id, 1);
        assert_eq!(camera.name, "Cam01");
        assert!(camera.live);
        assert!(!camera.monitoring);
    }

    #[test]
    fn test_camera_rejects_missing_fields() {
        // Fail closed: a record without an id is not a camera.
        let json = r#"{"name": "Cam01", "url": "x", "live": false, "email": "", "monitoringStatus": true}"#;
        assert!(serde_json::from_str::<Camera>(json).is_err());
    }

    #[test]
    fn test_draft_serializes_without_id() {
        let draft = CameraDraft {
            name: "Lobby".to_string(),
            url: "rtsp://10.0.0.9/lobby".to_string(),
            live: false,
            email: "ops@example.com".to_string(),
            monitoring: true,
        };

        let value = serde_json::to_value(&draft).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["monitoringStatus"], true);
    }

    #[test]
    fn test_display_name_shows_live_state() {
        let mut camera = Camera {
            id: 3,
            name: "Gate".to_string(),
            url: String::new(),
            live: true,
            email: String::new(),
            monitoring: true,
        };
        assert_eq!(camera.display_name(), "Gate (Live)");
        camera.live = false;
        assert_eq!(camera.display_name(), "Gate (Offline)");
    }
}
