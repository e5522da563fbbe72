// Trait boundaries for the pipeline's outbound calls.
//
// SocialApi covers post lookup and reply posting, StreamSource the live
// mention feed. Both are implemented by TwitterClient (see social.rs) and by
// the in-memory doubles in testing.rs.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;

use savevids_common::{Mention, SourcePost};
use twitter_client::{StreamNotice, TwitterError};

// ---------------------------------------------------------------------------
// SocialApi
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SocialApi: Send + Sync {
    /// Fetch the post with its author and first media attachment resolved.
    async fn get_post(&self, id: &str) -> Result<SourcePost, TwitterError>;

    /// Post `text` as a reply and return the new post's id.
    async fn post_reply(&self, text: &str, in_reply_to_id: &str) -> Result<String, TwitterError>;
}

#[async_trait]
impl<T: SocialApi + ?Sized> SocialApi for Arc<T> {
    async fn get_post(&self, id: &str) -> Result<SourcePost, TwitterError> {
        (**self).get_post(id).await
    }

    async fn post_reply(&self, text: &str, in_reply_to_id: &str) -> Result<String, TwitterError> {
        (**self).post_reply(text, in_reply_to_id).await
    }
}

// ---------------------------------------------------------------------------
// StreamSource
// ---------------------------------------------------------------------------

/// One item off the live feed.
#[derive(Debug, Clone)]
pub enum StreamItem {
    Mention(Mention),
    /// Operational message from the server; usually followed by a disconnect.
    Notice(StreamNotice),
}

/// A single connection's worth of items. Ends when the connection drops.
pub type MentionStream = Pin<Box<dyn Stream<Item = Result<StreamItem, TwitterError>> + Send>>;

#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Make sure the subscription filters on `filter`. Idempotent.
    async fn ensure_filter(&self, filter: &str) -> Result<(), TwitterError>;

    /// Open a new connection.
    async fn connect(&self) -> Result<MentionStream, TwitterError>;
}

#[async_trait]
impl<T: StreamSource + ?Sized> StreamSource for Arc<T> {
    async fn ensure_filter(&self, filter: &str) -> Result<(), TwitterError> {
        (**self).ensure_filter(filter).await
    }

    async fn connect(&self) -> Result<MentionStream, TwitterError> {
        (**self).connect().await
    }
}
