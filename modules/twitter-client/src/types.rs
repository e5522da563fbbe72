use serde::{Deserialize, Serialize};

/// Wrapper for v2 API responses. `data` is absent when the request
/// resolved to nothing (deleted or protected tweet) and `errors` says why.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub includes: Includes,
    #[serde(default)]
    pub errors: Vec<ApiProblem>,
}

/// A problem object from the `errors` array.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiProblem {
    pub title: Option<String>,
    pub detail: Option<String>,
    #[serde(rename = "type")]
    pub problem_type: Option<String>,
}

impl ApiProblem {
    pub fn describe(&self) -> String {
        match (&self.title, &self.detail) {
            (Some(t), Some(d)) => format!("{t}: {d}"),
            (Some(t), None) => t.clone(),
            (None, Some(d)) => d.clone(),
            (None, None) => "unknown problem".to_string(),
        }
    }
}

/// Expansion objects referenced from `data`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Includes {
    #[serde(default)]
    pub media: Vec<Media>,
    #[serde(default)]
    pub users: Vec<User>,
}

/// A single tweet object.
#[derive(Debug, Clone, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub text: String,
    pub author_id: Option<String>,
    pub possibly_sensitive: Option<bool>,
    pub referenced_tweets: Option<Vec<ReferencedTweet>>,
    pub attachments: Option<Attachments>,
}

impl Tweet {
    /// Id of the tweet this one replies to, if any.
    pub fn replied_to_id(&self) -> Option<&str> {
        self.referenced_tweets
            .as_deref()?
            .iter()
            .find(|r| r.kind == "replied_to")
            .map(|r| r.id.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferencedTweet {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Attachments {
    #[serde(default)]
    pub media_keys: Vec<String>,
}

/// Media expansion. Videos and animated GIFs carry `variants`.
#[derive(Debug, Clone, Deserialize)]
pub struct Media {
    pub media_key: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub url: Option<String>,
    pub preview_image_url: Option<String>,
    pub variants: Option<Vec<MediaVariant>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaVariant {
    pub bit_rate: Option<u64>,
    pub content_type: Option<String>,
    pub url: Option<String>,
}

/// User expansion.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: Option<String>,
}

/// A tweet together with its resolved expansions.
#[derive(Debug, Clone)]
pub struct ExpandedTweet {
    pub tweet: Tweet,
    pub includes: Includes,
}

impl ExpandedTweet {
    pub fn author(&self) -> Option<&User> {
        let author_id = self.tweet.author_id.as_deref()?;
        self.includes.users.iter().find(|u| u.id == author_id)
    }

    /// The first attached media item, resolved through `includes`.
    pub fn first_media(&self) -> Option<&Media> {
        let key = self.tweet.attachments.as_ref()?.media_keys.first()?;
        self.includes.media.iter().find(|m| &m.media_key == key)
    }
}

/// Body for `POST /tweets`.
#[derive(Debug, Clone, Serialize)]
pub struct PostTweetInput {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplySettings>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplySettings {
    pub in_reply_to_tweet_id: String,
}

/// `data` of a successful `POST /tweets`.
#[derive(Debug, Clone, Deserialize)]
pub struct PostedTweet {
    pub id: String,
    pub text: String,
}

/// A filtered-stream rule as stored server side.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamRule {
    pub id: String,
    pub value: String,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewStreamRule {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Body for `POST /tweets/search/stream/rules`.
#[derive(Debug, Clone, Serialize)]
pub struct AddRulesInput {
    pub add: Vec<NewStreamRule>,
}

/// One decoded line of the filtered stream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Tweet(ExpandedTweet),
    /// Operational messages such as `operational-disconnect`. The server
    /// usually closes the connection right after sending one.
    Notice(StreamNotice),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamNotice {
    pub title: String,
    pub detail: Option<String>,
}
