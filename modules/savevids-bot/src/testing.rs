// Test doubles for the bot.
//
// - MockSocial (SocialApi): HashMap-based post lookup, records replies
// - MockStream (StreamSource): scripted connections
// - MemoryDocumentStore is re-exported from savevids-store
//
// Plus builders for mentions and video posts.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use savevids_common::{MediaContainer, MediaVariant, Mention, SourcePost};
pub use savevids_store::MemoryDocumentStore;
use twitter_client::{StreamNotice, TwitterError};

use crate::traits::{MentionStream, SocialApi, StreamItem, StreamSource};

// ---------------------------------------------------------------------------
// MockSocial
// ---------------------------------------------------------------------------

/// A reply the mock accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedReply {
    pub id: String,
    pub text: String,
    pub in_reply_to_id: String,
}

/// Returns registered posts and `NotFound` for anything else.
/// Builder pattern: `.with_post()`, `.failing_gets()`, `.failing_replies()`,
/// `.panicking_post()`.
#[derive(Default)]
pub struct MockSocial {
    posts: HashMap<String, SourcePost>,
    panicking_posts: HashSet<String>,
    get_failures: Mutex<u32>,
    reply_failures: Mutex<u32>,
    get_calls: Mutex<u32>,
    replies: Mutex<Vec<PostedReply>>,
}

impl MockSocial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_post(mut self, post: SourcePost) -> Self {
        self.posts.insert(post.id.clone(), post);
        self
    }

    /// The next `n` lookups fail with a network error.
    pub fn failing_gets(self, n: u32) -> Self {
        *self.get_failures.lock().unwrap() = n;
        self
    }

    /// The next `n` reply attempts fail with a 503.
    pub fn failing_replies(self, n: u32) -> Self {
        *self.reply_failures.lock().unwrap() = n;
        self
    }

    /// Looking up post `id` panics.
    pub fn panicking_post(mut self, id: &str) -> Self {
        self.panicking_posts.insert(id.to_string());
        self
    }

    pub fn replies(&self) -> Vec<PostedReply> {
        self.replies.lock().unwrap().clone()
    }

    pub fn reply_count(&self) -> usize {
        self.replies.lock().unwrap().len()
    }

    pub fn get_calls(&self) -> u32 {
        *self.get_calls.lock().unwrap()
    }
}

fn take_failure(counter: &Mutex<u32>) -> bool {
    let mut remaining = counter.lock().unwrap();
    if *remaining > 0 {
        *remaining -= 1;
        true
    } else {
        false
    }
}

#[async_trait]
impl SocialApi for MockSocial {
    async fn get_post(&self, id: &str) -> Result<SourcePost, TwitterError> {
        *self.get_calls.lock().unwrap() += 1;
        if take_failure(&self.get_failures) {
            return Err(TwitterError::Network("MockSocial: connection reset".to_string()));
        }
        if self.panicking_posts.contains(id) {
            panic!("MockSocial: lookup of post {id} blew up");
        }
        self.posts
            .get(id)
            .cloned()
            .ok_or_else(|| TwitterError::NotFound(id.to_string()))
    }

    async fn post_reply(&self, text: &str, in_reply_to_id: &str) -> Result<String, TwitterError> {
        if take_failure(&self.reply_failures) {
            return Err(TwitterError::Api {
                status: 503,
                message: "MockSocial: over capacity".to_string(),
            });
        }
        let mut replies = self.replies.lock().unwrap();
        let id = format!("reply-{}", replies.len() + 1);
        replies.push(PostedReply {
            id: id.clone(),
            text: text.to_string(),
            in_reply_to_id: in_reply_to_id.to_string(),
        });
        Ok(id)
    }
}

// ---------------------------------------------------------------------------
// MockStream
// ---------------------------------------------------------------------------

type Connection = Result<Vec<Result<StreamItem, TwitterError>>, TwitterError>;

/// Plays back one scripted connection per `connect()` call. Once the script
/// runs out, connections stay open and silent.
#[derive(Default)]
pub struct MockStream {
    connections: Mutex<VecDeque<Connection>>,
    filter_error: Mutex<Option<TwitterError>>,
    filters: Mutex<Vec<String>>,
    connects: Mutex<u32>,
}

impl MockStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connection that yields `items` and then ends.
    pub fn connection(self, items: Vec<Result<StreamItem, TwitterError>>) -> Self {
        self.connections.lock().unwrap().push_back(Ok(items));
        self
    }

    pub fn failed_connection(self, err: TwitterError) -> Self {
        self.connections.lock().unwrap().push_back(Err(err));
        self
    }

    /// `ensure_filter` fails once with `err`.
    pub fn failing_filter(self, err: TwitterError) -> Self {
        *self.filter_error.lock().unwrap() = Some(err);
        self
    }

    pub fn filters(&self) -> Vec<String> {
        self.filters.lock().unwrap().clone()
    }

    pub fn connects(&self) -> u32 {
        *self.connects.lock().unwrap()
    }
}

#[async_trait]
impl StreamSource for MockStream {
    async fn ensure_filter(&self, filter: &str) -> Result<(), TwitterError> {
        if let Some(err) = self.filter_error.lock().unwrap().take() {
            return Err(err);
        }
        self.filters.lock().unwrap().push(filter.to_string());
        Ok(())
    }

    async fn connect(&self) -> Result<MentionStream, TwitterError> {
        *self.connects.lock().unwrap() += 1;
        let next = self.connections.lock().unwrap().pop_front();
        match next {
            Some(Ok(items)) => Ok(Box::pin(stream::iter(items))),
            Some(Err(err)) => Err(err),
            None => Ok(Box::pin(stream::pending::<Result<StreamItem, TwitterError>>())),
        }
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// A mention by `handle` replying to `in_reply_to`.
pub fn mention(id: &str, author_id: &str, handle: &str, in_reply_to: Option<&str>) -> Mention {
    Mention {
        id: id.to_string(),
        author_id: author_id.to_string(),
        author_handle: handle.to_string(),
        raw_text: "@savevidsbot".to_string(),
        in_reply_to_id: in_reply_to.map(str::to_string),
    }
}

/// A post with one video in two bitrates.
pub fn video_post(id: &str, author_id: &str, author_handle: &str) -> SourcePost {
    SourcePost {
        id: id.to_string(),
        author_id: author_id.to_string(),
        author_handle: author_handle.to_string(),
        text: "@someone look at this https://t.co/abc".to_string(),
        media: Some(MediaContainer {
            thumbnail_url: Some(format!("https://pbs.twimg.com/{id}.jpg")),
            variants: vec![
                MediaVariant::new(10000, &format!("https://video.twimg.com/{id}-good.mp4")),
                MediaVariant::new(5000, &format!("https://video.twimg.com/{id}-bad.mp4")),
            ],
        }),
        possibly_sensitive: Some(false),
    }
}

/// A post with no media at all.
pub fn text_post(id: &str, author_id: &str, author_handle: &str) -> SourcePost {
    SourcePost {
        id: id.to_string(),
        author_id: author_id.to_string(),
        author_handle: author_handle.to_string(),
        text: "just words".to_string(),
        media: None,
        possibly_sensitive: None,
    }
}

pub fn notice(title: &str) -> StreamItem {
    StreamItem::Notice(StreamNotice {
        title: title.to_string(),
        detail: None,
    })
}
