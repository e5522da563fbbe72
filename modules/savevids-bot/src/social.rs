// TwitterClient behind the pipeline's trait boundaries.

use async_trait::async_trait;
use futures::{future, StreamExt};
use tracing::warn;

use savevids_common::{MediaContainer, MediaVariant, Mention, SourcePost};
use twitter_client::{ExpandedTweet, StreamEvent, TwitterClient, TwitterError};

use crate::traits::{MentionStream, SocialApi, StreamItem, StreamSource};

#[async_trait]
impl SocialApi for TwitterClient {
    async fn get_post(&self, id: &str) -> Result<SourcePost, TwitterError> {
        Ok(source_post_from(self.get_tweet(id).await?))
    }

    async fn post_reply(&self, text: &str, in_reply_to_id: &str) -> Result<String, TwitterError> {
        Ok(TwitterClient::post_reply(self, text, in_reply_to_id).await?.id)
    }
}

#[async_trait]
impl StreamSource for TwitterClient {
    async fn ensure_filter(&self, filter: &str) -> Result<(), TwitterError> {
        self.ensure_stream_rule(filter).await
    }

    async fn connect(&self) -> Result<MentionStream, TwitterError> {
        let events = self.filtered_stream().await?;
        let items = events.filter_map(|event| {
            future::ready(match event {
                Ok(StreamEvent::Tweet(tweet)) => {
                    let id = tweet.tweet.id.clone();
                    match mention_from(tweet) {
                        Some(mention) => Some(Ok(StreamItem::Mention(mention))),
                        None => {
                            warn!(tweet_id = %id, "Dropping stream tweet without author");
                            None
                        }
                    }
                }
                Ok(StreamEvent::Notice(notice)) => Some(Ok(StreamItem::Notice(notice))),
                Err(e) => Some(Err(e)),
            })
        });
        Ok(Box::pin(items))
    }
}

/// Map a looked-up tweet onto the fields the pipeline reads.
pub fn source_post_from(expanded: ExpandedTweet) -> SourcePost {
    let author_handle = expanded
        .author()
        .map(|u| u.username.clone())
        .unwrap_or_default();
    let media = expanded.first_media().map(|m| MediaContainer {
        thumbnail_url: m.preview_image_url.clone().or_else(|| m.url.clone()),
        variants: m
            .variants
            .iter()
            .flatten()
            .map(|v| MediaVariant {
                bitrate: v.bit_rate,
                url: v.url.clone(),
            })
            .collect(),
    });

    let tweet = expanded.tweet;
    SourcePost {
        id: tweet.id,
        author_id: tweet.author_id.unwrap_or_default(),
        author_handle,
        text: tweet.text,
        media,
        possibly_sensitive: tweet.possibly_sensitive,
    }
}

/// A stream tweet as a mention. `None` when the author was not expanded.
pub fn mention_from(expanded: ExpandedTweet) -> Option<Mention> {
    let author = expanded.author()?.username.clone();
    let in_reply_to_id = expanded.tweet.replied_to_id().map(str::to_string);
    let tweet = expanded.tweet;

    Some(Mention {
        id: tweet.id,
        author_id: tweet.author_id?,
        author_handle: author,
        raw_text: tweet.text,
        in_reply_to_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(line: &str) -> ExpandedTweet {
        match twitter_client::decode_stream_line(line).unwrap() {
            Some(StreamEvent::Tweet(tweet)) => tweet,
            other => panic!("expected tweet, got {other:?}"),
        }
    }

    #[test]
    fn video_tweet_maps_variants_and_thumbnail() {
        let tweet = decode(
            r#"{
                "data": {
                    "id": "2", "text": "look", "author_id": "42",
                    "possibly_sensitive": false,
                    "attachments": {"media_keys": ["7_1"]}
                },
                "includes": {
                    "users": [{"id": "42", "username": "Creator"}],
                    "media": [{
                        "media_key": "7_1", "type": "video",
                        "preview_image_url": "https://pbs.twimg.com/thumb.jpg",
                        "variants": [
                            {"content_type": "application/x-mpegURL", "url": "https://video.twimg.com/pl.m3u8"},
                            {"bit_rate": 2176000, "content_type": "video/mp4", "url": "https://video.twimg.com/hi.mp4"}
                        ]
                    }]
                }
            }"#,
        );

        let post = source_post_from(tweet);
        assert_eq!(post.author_handle, "Creator");
        assert_eq!(post.possibly_sensitive, Some(false));
        let media = post.media.unwrap();
        assert_eq!(media.thumbnail_url.as_deref(), Some("https://pbs.twimg.com/thumb.jpg"));
        assert_eq!(media.variants.len(), 2);
        assert_eq!(media.variants[0].bitrate, None);
        assert_eq!(media.variants[1], MediaVariant::new(2176000, "https://video.twimg.com/hi.mp4"));
    }

    #[test]
    fn mention_carries_reply_target() {
        let tweet = decode(
            r#"{
                "data": {
                    "id": "10", "text": "@savevidsbot", "author_id": "7",
                    "referenced_tweets": [{"type": "replied_to", "id": "2"}]
                },
                "includes": {"users": [{"id": "7", "username": "Didier"}]}
            }"#,
        );

        let mention = mention_from(tweet).unwrap();
        assert_eq!(mention.id, "10");
        assert_eq!(mention.author_handle, "Didier");
        assert_eq!(mention.in_reply_to_id.as_deref(), Some("2"));
    }

    #[test]
    fn mention_without_author_expansion_is_dropped() {
        let tweet = decode(r#"{"data": {"id": "10", "text": "@savevidsbot", "author_id": "7"}}"#);
        assert!(mention_from(tweet).is_none());
    }
}
