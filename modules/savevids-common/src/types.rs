use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Inbound ---

/// A post naming the bot account, as delivered by the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub id: String,
    pub author_id: String,
    pub author_handle: String,
    pub raw_text: String,
    /// The post this mention replies to. Absent for top-level posts.
    pub in_reply_to_id: Option<String>,
}

/// The post a mention replies to, fetched on demand.
///
/// Vendor payloads omit fields freely, so every optional part is modelled
/// as an explicit `Option` rather than probed for.
#[derive(Debug, Clone, Default)]
pub struct SourcePost {
    pub id: String,
    pub author_id: String,
    pub author_handle: String,
    pub text: String,
    pub media: Option<MediaContainer>,
    /// `None` when the platform did not declare a sensitivity flag.
    pub possibly_sensitive: Option<bool>,
}

/// The first media attachment of a post.
#[derive(Debug, Clone, Default)]
pub struct MediaContainer {
    pub thumbnail_url: Option<String>,
    pub variants: Vec<MediaVariant>,
}

/// One encoding of a video. Streaming playlists carry no bitrate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaVariant {
    pub bitrate: Option<u64>,
    pub url: Option<String>,
}

impl MediaVariant {
    pub fn new(bitrate: u64, url: &str) -> Self {
        Self {
            bitrate: Some(bitrate),
            url: Some(url.to_string()),
        }
    }
}

// --- Derived ---

/// Best-quality video URL plus its thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReference {
    pub url: String,
    pub thumbnail_url: Option<String>,
}

/// Normalized author of a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub id: String,
    /// Lowercase, without the leading `@`.
    pub handle: String,
    pub cleaned_text: String,
}

// --- Durable documents ---

/// A video that has been requested at least once, keyed by source post id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub source_url: String,
    pub thumbnail_url: Option<String>,
    pub tweet_url: String,
    pub creator_id: String,
    pub creator_handle: String,
    pub text: String,
    pub requested_count: i64,
    pub created_at: DateTime<Utc>,
    /// Run that created the record. Lets a writer recognise its own insert
    /// when the acknowledgement was lost.
    #[serde(default)]
    pub run_id: Option<String>,
}

/// One served request: which video, answered by which reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedVideo {
    pub video_id: String,
    pub reply_id: String,
}

/// Every video a user has been sent, newest first, one entry per video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRequestHistory {
    pub handle: String,
    pub user_id: String,
    #[serde(default)]
    pub requested_videos: Vec<RequestedVideo>,
}

impl UserRequestHistory {
    pub fn new(handle: &str, user_id: &str) -> Self {
        Self {
            handle: handle.to_string(),
            user_id: user_id.to_string(),
            requested_videos: Vec::new(),
        }
    }

    pub fn contains(&self, video_id: &str) -> bool {
        self.requested_videos.iter().any(|r| r.video_id == video_id)
    }

    /// Put `request` at the front, dropping any older entry for the same video.
    pub fn push_latest(&mut self, request: RequestedVideo) {
        self.requested_videos.retain(|r| r.video_id != request.video_id);
        self.requested_videos.insert(0, request);
    }
}

/// Written by moderation tooling. Existence is what bans a user; the fields
/// are informational and may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BanRecord {
    pub user_id: Option<String>,
    pub reason: Option<String>,
    pub banned_at: Option<DateTime<Utc>>,
}

/// Marker stored before a reply is posted, keyed by mention id, so a
/// redelivered mention cannot trigger a second reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyIntent {
    pub mention_id: String,
    pub video_id: String,
    pub handle: String,
    pub created_at: DateTime<Utc>,
    pub reply_id: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(video_id: &str, reply_id: &str) -> RequestedVideo {
        RequestedVideo {
            video_id: video_id.to_string(),
            reply_id: reply_id.to_string(),
        }
    }

    #[test]
    fn push_latest_replaces_older_entry_for_same_video() {
        let mut history = UserRequestHistory::new("didier", "7");
        history.push_latest(request("1", "r1"));
        history.push_latest(request("2", "r2"));
        history.push_latest(request("1", "r3"));

        assert_eq!(history.requested_videos, vec![request("1", "r3"), request("2", "r2")]);
    }

    #[test]
    fn history_without_videos_field_deserializes_empty() {
        let history: UserRequestHistory =
            serde_json::from_value(serde_json::json!({"handle": "didier", "user_id": "7"})).unwrap();
        assert!(history.requested_videos.is_empty());
        assert!(!history.contains("2"));
    }

    #[test]
    fn empty_ban_document_deserializes() {
        let ban: BanRecord = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(ban, BanRecord::default());

        let ban: BanRecord =
            serde_json::from_value(serde_json::json!({"reason": "spam", "note": "extra"})).unwrap();
        assert_eq!(ban.reason.as_deref(), Some("spam"));
    }
}
