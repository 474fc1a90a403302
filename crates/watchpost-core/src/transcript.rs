//! Activity transcripts generated by the backend's footage analysis.

use serde::Deserialize;

/// The activity categories the backend keeps separate transcript tables for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activity {
    Unusual,
    Human,
    Animal,
}

impl Activity {
    /// Path segment used by the transcripts endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Activity::Unusual => "unusual_activity",
            Activity::Human => "human_activity",
            Activity::Animal => "animal_activity",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Activity::Unusual => "Unusual Activity",
            Activity::Human => "Human Activity",
            Activity::Animal => "Animal Activity",
        }
    }

    pub fn all() -> Vec<Activity> {
        vec![Activity::Unusual, Activity::Human, Activity::Animal]
    }
}

/// One transcript record. Each row describes a single analyzed frame; only
/// the column matching the queried activity table is populated.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptRow {
    pub frame_number: i64,
    #[serde(default)]
    pub unusual_activity: Option<String>,
    #[serde(default)]
    pub human_activity: Option<String>,
    #[serde(default)]
    pub animal_activity: Option<String>,
    #[serde(default)]
    pub context_notes: Option<String>,
}

impl TranscriptRow {
    /// Transcript text for the requested activity, empty when the row does
    /// not carry that column.
    pub fn activity_text(&self, activity: Activity) -> &str {
        let column = match activity {
            Activity::Unusual => &self.unusual_activity,
            Activity::Human => &self.human_activity,
            Activity::Animal => &self.animal_activity,
        };
        column.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_path_segments() {
        assert_eq!(Activity::Unusual.as_str(), "unusual_activity");
        assert_eq!(Activity::Human.as_str(), "human_activity");
        assert_eq!(Activity::Animal.as_str(), "animal_activity");
        assert_eq!(Activity::all().len(), 3);
    }

    #[test]
    fn test_row_parses_sparse_columns() {
        let json = r#"{
            "frame_number": 42,
            "animal_activity": "Stray dog crossing the lot",
            "context_notes": "low light"
        }"#;

        let row: TranscriptRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.frame_number, 42);
        assert_eq!(row.activity_text(Activity::Animal), "Stray dog crossing the lot");
        assert_eq!(row.activity_text(Activity::Human), "");
        assert_eq!(row.context_notes.as_deref(), Some("low light"));
    }

    #[test]
    fn test_row_requires_frame_number() {
        let json = r#"{"human_activity": "Two people walking"}"#;
        assert!(serde_json::from_str::<TranscriptRow>(json).is_err());
    }
}
