use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Broadcast lifecycle as reported by the catalog API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Scheduled,
    Live,
    Ended,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Live => "live",
            SessionStatus::Ended => "ended",
            SessionStatus::Cancelled => "cancelled",
        }
    }
}

/// Publication state of a catalog item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PublicationStatus {
    Draft,
    #[default]
    Published,
    Archived,
}

impl PublicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationStatus::Draft => "draft",
            PublicationStatus::Published => "published",
            PublicationStatus::Archived => "archived",
        }
    }
}

/// A broadcast known to the catalog API.  The client only ever reads these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LiveSession {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub category: Option<String>,
    pub start_time: DateTime<Utc>,
    pub stream_url: String,
    #[serde(default)]
    pub status: SessionStatus,
    /// Informational only.
    #[serde(default)]
    pub viewers: u64,
}

/// A recorded talk in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Sermon {
    pub id: String,
    pub title: String,
    pub main_speaker: String,
    #[serde(default)]
    pub description: String,
    pub date_preached: DateTime<Utc>,
    pub video_url: String,
    /// Length in seconds, display only.
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub series: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: PublicationStatus,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

impl Sermon {
    /// Series label, treating an empty string as absent.
    pub fn series_label(&self) -> Option<&str> {
        self.series.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// Request body for creating or updating a sermon through the admin endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SermonDraft {
    pub title: String,
    pub main_speaker: String,
    pub description: String,
    pub date_preached: Option<DateTime<Utc>>,
    pub video_url: String,
    pub duration: u64,
    pub series: Option<String>,
    pub tags: Vec<String>,
    pub status: PublicationStatus,
    pub thumbnail: Option<String>,
}

/// Every catalog API response is wrapped in this envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    /// Absent on bodyless replies (archive, delete).
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_session_from_camel_case() {
        let json = r#"{
            "id": "S1",
            "title": "Sunday Service",
            "host": "Pastor Ade",
            "startTime": "2024-03-10T09:30:00Z",
            "streamUrl": "https://stream.example.org/s1.m3u8",
            "status": "live",
            "viewers": 42
        }"#;
        let session: LiveSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.id, "S1");
        assert_eq!(session.status, SessionStatus::Live);
        assert_eq!(session.viewers, 42);
        assert!(session.category.is_none());
        assert!(session.description.is_empty());
    }

    #[test]
    fn test_sermon_defaults_for_optional_fields() {
        let json = r#"{
            "id": "42",
            "title": "Amazing Grace",
            "mainSpeaker": "A",
            "datePreached": "2024-01-07T10:00:00.000Z",
            "videoUrl": "https://video.example.org/42.mp4"
        }"#;
        let sermon: Sermon = serde_json::from_str(json).unwrap();
        assert_eq!(sermon.main_speaker, "A");
        assert_eq!(sermon.status, PublicationStatus::Published);
        assert!(sermon.tags.is_empty());
        assert!(sermon.series_label().is_none());
    }

    #[test]
    fn test_blank_series_is_not_a_label() {
        let json = r#"{
            "id": "1", "title": "t", "mainSpeaker": "s",
            "datePreached": "2024-01-07T10:00:00Z", "videoUrl": "v",
            "series": "  "
        }"#;
        let sermon: Sermon = serde_json::from_str(json).unwrap();
        assert!(sermon.series_label().is_none());
    }

    #[test]
    fn test_envelope_without_data() {
        let env: ApiEnvelope<Vec<LiveSession>> =
            serde_json::from_str(r#"{"success": false, "message": "nope"}"#).unwrap();
        assert!(!env.success);
        assert!(env.data.is_none());
        assert_eq!(env.message.as_deref(), Some("nope"));
    }
}
