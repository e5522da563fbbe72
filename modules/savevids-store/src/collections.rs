//! Typed access to the bot's collections.

use savevids_common::{BanRecord, CollectionNames, ReplyIntent, RequestedVideo, UserRequestHistory, VideoRecord};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::document::{from_document, to_document, Document, DocumentStore};
use crate::error::{Result, StoreError};

const REQUESTED_COUNT: &str = "requested_count";

/// Videos, request histories, bans and reply intents over one store.
pub struct Collections<S> {
    store: S,
    names: CollectionNames,
}

impl<S: DocumentStore> Collections<S> {
    pub fn new(store: S, names: CollectionNames) -> Self {
        Self { store, names }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn names(&self) -> &CollectionNames {
        &self.names
    }

    // --- Videos ---

    pub async fn video(&self, video_id: &str) -> Result<Option<VideoRecord>> {
        self.store
            .get(&self.names.videos, video_id)
            .await?
            .map(from_document)
            .transpose()
    }

    /// Returns `false` if a record for this video already exists.
    pub async fn create_video_if_absent(&self, record: &VideoRecord) -> Result<bool> {
        self.store
            .create_if_absent(&self.names.videos, &record.video_id, to_document(record)?)
            .await
    }

    pub async fn increment_requested_count(&self, video_id: &str) -> Result<i64> {
        self.store
            .atomic_increment(&self.names.videos, video_id, REQUESTED_COUNT)
            .await
    }

    // --- Users ---

    pub async fn history(&self, handle: &str) -> Result<Option<UserRequestHistory>> {
        self.store
            .get(&self.names.users, handle)
            .await?
            .map(from_document)
            .transpose()
    }

    /// Put `request` at the front of the user's history, creating the
    /// document on first use. Any older entry for the same video is dropped.
    pub async fn record_request(
        &self,
        handle: &str,
        user_id: &str,
        request: RequestedVideo,
    ) -> Result<UserRequestHistory> {
        let existing = match self.history(handle).await? {
            Some(history) => history,
            None => {
                let mut fresh = UserRequestHistory::new(handle, user_id);
                fresh.push_latest(request.clone());
                if self
                    .store
                    .create_if_absent(&self.names.users, handle, to_document(&fresh)?)
                    .await?
                {
                    return Ok(fresh);
                }
                // Lost a race with another writer; fold into their document.
                debug!(handle, "history created concurrently, merging");
                self.history(handle)
                    .await?
                    .ok_or_else(|| StoreError::not_found(&self.names.users, handle))?
            }
        };

        let mut history = existing;
        history.user_id = user_id.to_string();
        history.push_latest(request);
        self.store
            .update_fields(
                &self.names.users,
                handle,
                fields(json!({
                    "user_id": history.user_id,
                    "requested_videos": history.requested_videos,
                })),
            )
            .await?;
        Ok(history)
    }

    // --- Moderation ---

    /// Ban record for a user, if moderation tooling wrote one. A document the
    /// bot cannot decode still counts as a ban. The bot never writes bans.
    pub async fn ban(&self, user_id: &str) -> Result<Option<BanRecord>> {
        let Some(doc) = self.store.get(&self.names.banned, user_id).await? else {
            return Ok(None);
        };
        let ban = from_document(doc).unwrap_or_else(|e| {
            warn!(user_id, error = %e, "Undecodable ban record");
            BanRecord::default()
        });
        Ok(Some(ban))
    }

    // --- Reply intents ---

    /// Store the marker for a reply about to be posted. Returns `false` if a
    /// marker for this mention already exists.
    pub async fn claim_reply_intent(&self, intent: &ReplyIntent) -> Result<bool> {
        self.store
            .create_if_absent(&self.names.reply_intents, &intent.mention_id, to_document(intent)?)
            .await
    }

    pub async fn complete_reply_intent(&self, mention_id: &str, reply_id: &str) -> Result<()> {
        self.store
            .update_fields(
                &self.names.reply_intents,
                mention_id,
                fields(json!({ "reply_id": reply_id })),
            )
            .await
    }

    pub async fn reply_intent(&self, mention_id: &str) -> Result<Option<ReplyIntent>> {
        self.store
            .get(&self.names.reply_intents, mention_id)
            .await?
            .map(from_document)
            .transpose()
    }
}

fn fields(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}
