pub mod error;
pub mod stream;
pub mod types;

pub use error::{Result, TwitterError};
pub use stream::{decode_lines, decode_stream_line, TweetStream};
pub use types::{
    ExpandedTweet, Includes, Media, MediaVariant, PostedTweet, StreamEvent, StreamNotice,
    StreamRule, Tweet, User,
};

use std::time::Duration;

use serde::de::DeserializeOwned;
use types::{AddRulesInput, ApiResponse, NewStreamRule, PostTweetInput, ReplySettings};

const BASE_URL: &str = "https://api.twitter.com/2";

/// Fields requested when looking up a single tweet: enough to resolve the
/// author handle, the sensitivity flag and every video variant.
const TWEET_LOOKUP_QUERY: &str = "expansions=author_id,attachments.media_keys\
&tweet.fields=author_id,possibly_sensitive,referenced_tweets,attachments\
&media.fields=type,url,preview_image_url,variants\
&user.fields=username";

/// Fields requested on the filtered stream: the reply target and the author.
const STREAM_QUERY: &str = "tweet.fields=author_id,referenced_tweets\
&expansions=author_id\
&user.fields=username";

pub struct TwitterClient {
    client: reqwest::Client,
    base_url: String,
    /// App-only bearer token, used for reads and the filtered stream.
    app_token: String,
    /// User-context token, required to post tweets.
    user_token: String,
}

impl TwitterClient {
    pub fn new(app_token: String, user_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: BASE_URL.to_string(),
            app_token,
            user_token,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Look up a tweet with its author and media expansions.
    pub async fn get_tweet(&self, id: &str) -> Result<ExpandedTweet> {
        let url = format!("{}/tweets/{}?{}", self.base_url, id, TWEET_LOOKUP_QUERY);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.app_token)
            .send()
            .await?;

        let api_resp: ApiResponse<Tweet> = Self::read_json(resp).await?;
        match api_resp.data {
            Some(tweet) => {
                tracing::debug!(tweet_id = id, "Tweet found");
                Ok(ExpandedTweet {
                    tweet,
                    includes: api_resp.includes,
                })
            }
            None => {
                let reason = api_resp
                    .errors
                    .first()
                    .map(|p| p.describe())
                    .unwrap_or_else(|| id.to_string());
                Err(TwitterError::NotFound(reason))
            }
        }
    }

    /// Post `text` as a reply to `in_reply_to`. Returns the new tweet.
    pub async fn post_reply(&self, text: &str, in_reply_to: &str) -> Result<PostedTweet> {
        let input = PostTweetInput {
            text: text.to_string(),
            reply: Some(ReplySettings {
                in_reply_to_tweet_id: in_reply_to.to_string(),
            }),
        };

        let url = format!("{}/tweets", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.user_token)
            .json(&input)
            .send()
            .await?;

        let api_resp: ApiResponse<PostedTweet> = Self::read_json(resp).await?;
        let posted = api_resp
            .data
            .ok_or_else(|| TwitterError::Parse("reply response had no data".to_string()))?;
        tracing::info!(reply_id = %posted.id, in_reply_to, "Reply posted");
        Ok(posted)
    }

    /// List the rules currently attached to the filtered stream.
    pub async fn stream_rules(&self) -> Result<Vec<StreamRule>> {
        let url = format!("{}/tweets/search/stream/rules", self.base_url);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.app_token)
            .send()
            .await?;

        let api_resp: ApiResponse<Vec<StreamRule>> = Self::read_json(resp).await?;
        Ok(api_resp.data.unwrap_or_default())
    }

    /// Make sure a rule matching `value` exists. Adding is skipped when one is
    /// already present, so this is safe to call on every start.
    pub async fn ensure_stream_rule(&self, value: &str) -> Result<()> {
        let existing = self.stream_rules().await?;
        if existing.iter().any(|r| r.value == value) {
            tracing::debug!(value, "Stream rule already present");
            return Ok(());
        }

        let input = AddRulesInput {
            add: vec![NewStreamRule {
                value: value.to_string(),
                tag: None,
            }],
        };
        let url = format!("{}/tweets/search/stream/rules", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.app_token)
            .json(&input)
            .send()
            .await?;

        let _: ApiResponse<Vec<StreamRule>> = Self::read_json(resp).await?;
        tracing::info!(value, "Stream rule added");
        Ok(())
    }

    /// Open the filtered stream. The connection stays open until the server
    /// closes it or a transport error occurs; both surface as a final `Err`.
    pub async fn filtered_stream(&self) -> Result<TweetStream> {
        let url = format!("{}/tweets/search/stream?{}", self.base_url, STREAM_QUERY);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.app_token)
            .send()
            .await?;

        let resp = Self::check_status(resp).await?;
        tracing::info!("Filtered stream connected");
        Ok(decode_lines(Box::pin(resp.bytes_stream())))
    }

    async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let resp = Self::check_status(resp).await?;
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        if status.as_u16() == 429 {
            let retry_after = rate_limit_reset(resp.headers());
            return Err(TwitterError::RateLimited { retry_after });
        }

        let body = resp.text().await.unwrap_or_default();
        Err(TwitterError::Api {
            status: status.as_u16(),
            message: body,
        })
    }
}

/// Seconds until the rate-limit window resets, from `x-rate-limit-reset`
/// (epoch seconds).
fn rate_limit_reset(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let reset: u64 = headers
        .get("x-rate-limit-reset")?
        .to_str()
        .ok()?
        .parse()
        .ok()?;
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .ok()?
        .as_secs();
    Some(Duration::from_secs(reset.saturating_sub(now)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tweet_lookup_response_resolves_media_and_author() {
        let body = r#"{
            "data": {
                "id": "2",
                "text": "look at this https://t.co/x",
                "author_id": "99",
                "possibly_sensitive": false,
                "attachments": {"media_keys": ["7_2"]}
            },
            "includes": {
                "media": [{
                    "media_key": "7_2",
                    "type": "video",
                    "preview_image_url": "https://pbs.twimg.com/thumb.jpg",
                    "variants": [
                        {"content_type": "application/x-mpegURL", "url": "https://video.twimg.com/pl.m3u8"},
                        {"bit_rate": 832000, "content_type": "video/mp4", "url": "https://video.twimg.com/832.mp4"}
                    ]
                }],
                "users": [{"id": "99", "username": "Creator"}]
            }
        }"#;
        let resp: ApiResponse<Tweet> = serde_json::from_str(body).unwrap();
        let expanded = ExpandedTweet {
            tweet: resp.data.unwrap(),
            includes: resp.includes,
        };

        assert_eq!(expanded.author().unwrap().username, "Creator");
        let media = expanded.first_media().unwrap();
        assert_eq!(media.media_type, "video");
        let variants = media.variants.as_ref().unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].bit_rate, None);
        assert_eq!(variants[1].bit_rate, Some(832000));
    }

    #[test]
    fn missing_tweet_reports_problem() {
        let body = r#"{"errors":[{"title":"Not Found Error","detail":"Could not find tweet with id: [3].","type":"https://api.twitter.com/2/problems/resource-not-found"}]}"#;
        let resp: ApiResponse<Tweet> = serde_json::from_str(body).unwrap();
        assert!(resp.data.is_none());
        assert_eq!(
            resp.errors[0].describe(),
            "Not Found Error: Could not find tweet with id: [3]."
        );
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = TwitterClient::new("a".into(), "u".into()).with_base_url("http://localhost:9000/2/");
        assert_eq!(client.base_url, "http://localhost:9000/2");
    }
}
