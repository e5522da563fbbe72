//! The mention pipeline.
//!
//! One run takes a mention through a fixed sequence of stages:
//!
//! 1. reply check: the mention must answer another post
//! 2. fetch the source post
//! 3. extract its best video
//! 4. sensitivity gate
//! 5. ban gate on the requester
//! 6. upsert the video record
//! 7. rate cap on the record's count before this request
//! 8. duplicate gate on the requester's history
//! 9. claim the reply intent, then post the reply
//! 10. record the request in the requester's history, then count it
//!
//! Any stage can end the run with an `AbortReason`. Counting happens only
//! after the reply went out, so a rejected request never moves the counter.

use std::panic::AssertUnwindSafe;

use chrono::Utc;
use futures::FutureExt;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use savevids_common::{Config, Mention, ReplyIntent, RequestedVideo, SourcePost, VideoRecord, VideoReference};
use savevids_store::{Collections, DocumentStore, StoreError};

use crate::extract::{clean_text, extract_requester, extract_video_reference, normalize_handle};
use crate::outcome::{AbortReason, Outcome};
use crate::policy::{is_banned, is_duplicate_request, is_over_request_cap, is_sensitive};
use crate::retry::RetryProfile;
use crate::traits::SocialApi;

/// Knobs the pipeline reads on every run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub url_prefix: String,
    pub asked_count_max: i64,
    pub retries: RetryProfile,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            url_prefix: config.url_prefix.clone(),
            asked_count_max: config.asked_count_max,
            retries: RetryProfile::default(),
        }
    }
}

/// Landing page for a video: the prefix joined to the id with one `/`.
pub fn landing_url(url_prefix: &str, video_id: &str) -> String {
    format!("{}/{}", url_prefix.trim_end_matches('/'), video_id)
}

pub fn reply_text(handle: &str, url_prefix: &str, video_id: &str) -> String {
    format!("@{} Download link here! \n{}", handle, landing_url(url_prefix, video_id))
}

pub fn tweet_url(video_id: &str) -> String {
    format!("https://twitter.com/twitter/statuses/{video_id}")
}

pub struct MentionPipeline<P, S> {
    social: P,
    collections: Collections<S>,
    settings: PipelineSettings,
}

impl<P: SocialApi, S: DocumentStore> MentionPipeline<P, S> {
    pub fn new(social: P, collections: Collections<S>, settings: PipelineSettings) -> Self {
        Self {
            social,
            collections,
            settings,
        }
    }

    pub fn collections(&self) -> &Collections<S> {
        &self.collections
    }

    /// Run one mention to a terminal outcome. Never fails and never panics:
    /// anything unexpected becomes `internal_error`.
    pub async fn handle(&self, mention: &Mention) -> Outcome {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("mention", mention_id = %mention.id, run_id = %run_id);

        async {
            let outcome = match AssertUnwindSafe(self.process(mention, &run_id)).catch_unwind().await {
                Ok(Ok(reply_id)) => Outcome::Completed { reply_id },
                Ok(Err(reason)) => Outcome::Aborted(reason),
                Err(_) => {
                    error!(mention_id = %mention.id, "Pipeline panicked, abandoning mention");
                    Outcome::Aborted(AbortReason::InternalError)
                }
            };

            match &outcome {
                Outcome::Completed { reply_id } => {
                    info!(mention_id = %mention.id, reply_id = %reply_id, "Mention completed");
                }
                Outcome::Aborted(reason) if reason.is_policy_rejection() => {
                    info!(mention_id = %mention.id, reason = %reason, "No reply sent");
                }
                Outcome::Aborted(reason) => {
                    error!(mention_id = %mention.id, reason = %reason, "Mention abandoned");
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn process(&self, mention: &Mention, run_id: &str) -> Result<String, AbortReason> {
        let retries = self.settings.retries;
        let social = &self.social;
        let collections = &self.collections;

        // 1. Reply check
        let source_id = mention
            .in_reply_to_id
            .as_deref()
            .ok_or(AbortReason::NotAReply)?;

        // 2. Source post
        let post = retries
            .social_read
            .run("get_post", move || social.get_post(source_id))
            .await
            .map_err(|e| {
                warn!(source_id, error = %e, "Source post unreachable");
                AbortReason::SourceUnreachable
            })?;

        // 3. Video
        let video = extract_video_reference(&post).ok_or(AbortReason::NoMedia)?;

        // 4. Sensitivity
        if is_sensitive(&post) {
            return Err(AbortReason::SensitiveContent);
        }

        // 5. Ban
        let requester = extract_requester(mention);
        let requester_id = requester.id.as_str();
        let ban = retries
            .store_read
            .run("ban_lookup", move || collections.ban(requester_id))
            .await
            .map_err(|e| store_abort("ban_lookup", e))?;
        if is_banned(ban.as_ref()) {
            let reason = ban.as_ref().and_then(|b| b.reason.as_deref()).unwrap_or("");
            info!(requester_id, reason, "Requester is banned");
            return Err(AbortReason::UserBanned);
        }

        // 6. Upsert video
        let video_id = post.id.as_str();
        let prior_count = self.upsert_video(&post, &video, run_id).await?;

        // 7. Rate cap
        if let Some(count) = prior_count {
            if is_over_request_cap(count, self.settings.asked_count_max) {
                info!(video_id, count, max = self.settings.asked_count_max, "Video request cap reached");
                return Err(AbortReason::RateCapped);
            }
        }

        // 8. Duplicate
        let handle = requester.handle.as_str();
        let history = retries
            .store_read
            .run("history_lookup", move || collections.history(handle))
            .await
            .map_err(|e| store_abort("history_lookup", e))?;
        if is_duplicate_request(history.as_ref(), video_id) {
            return Err(AbortReason::AlreadyRequested);
        }

        // 9. Reply
        let mention_id = mention.id.as_str();
        let intent = ReplyIntent {
            mention_id: mention.id.clone(),
            video_id: video_id.to_string(),
            handle: handle.to_string(),
            created_at: Utc::now(),
            reply_id: None,
            run_id: Some(run_id.to_string()),
        };
        let intent_ref = &intent;
        let claimed = retries
            .store_write
            .run("claim_reply_intent", move || collections.claim_reply_intent(intent_ref))
            .await
            .map_err(|e| store_abort("claim_reply_intent", e))?;
        if !claimed {
            // A retried insert finds its own earlier write when the first
            // acknowledgement was lost.
            let existing = retries
                .store_read
                .run("reply_intent_lookup", move || collections.reply_intent(mention_id))
                .await
                .map_err(|e| store_abort("reply_intent_lookup", e))?;
            if !written_by_run(existing.as_ref().and_then(|i| i.run_id.as_deref()), run_id) {
                warn!(video_id, "Reply already attempted for this mention");
                return Err(AbortReason::ReplyInFlight);
            }
            info!(video_id, "Reply intent already stored by this run");
        }

        let text = reply_text(handle, &self.settings.url_prefix, video_id);
        let text_ref = text.as_str();
        let reply_id = retries
            .reply
            .run("post_reply", move || social.post_reply(text_ref, mention_id))
            .await
            .map_err(|e| {
                error!(video_id, error = %e, "Reply failed");
                AbortReason::ReplyFailed
            })?;
        info!(video_id, handle, reply_id = %reply_id, "Reply posted");

        let reply_ref = reply_id.as_str();
        if let Err(e) = retries
            .store_write
            .run("complete_reply_intent", move || {
                collections.complete_reply_intent(mention_id, reply_ref)
            })
            .await
        {
            warn!(error = %e, "Could not record reply id on intent");
        }

        // 10. History, then count
        let request = RequestedVideo {
            video_id: video_id.to_string(),
            reply_id: reply_id.clone(),
        };
        let request_ref = &request;
        retries
            .store_write
            .run("record_request", move || {
                collections.record_request(handle, requester_id, request_ref.clone())
            })
            .await
            .map_err(|e| store_abort("record_request", e))?;

        if prior_count.is_some() {
            match retries
                .store_write
                .run("count_request", move || collections.increment_requested_count(video_id))
                .await
            {
                Ok(count) => info!(video_id, count, "Request counted"),
                Err(e) => error!(video_id, error = %e, "Reply sent but request not counted"),
            }
        }

        Ok(reply_id)
    }

    /// Returns the stored count before this request, or `None` when this
    /// run created the record (which then already holds a count of one).
    async fn upsert_video(
        &self,
        post: &SourcePost,
        video: &VideoReference,
        run_id: &str,
    ) -> Result<Option<i64>, AbortReason> {
        let retries = self.settings.retries;
        let collections = &self.collections;
        let video_id = post.id.as_str();

        let existing = retries
            .store_read
            .run("video_lookup", move || collections.video(video_id))
            .await
            .map_err(|e| store_abort("video_lookup", e))?;
        if let Some(record) = existing {
            return Ok(Some(record.requested_count));
        }

        let record = VideoRecord {
            video_id: video_id.to_string(),
            source_url: video.url.clone(),
            thumbnail_url: video.thumbnail_url.clone(),
            tweet_url: tweet_url(video_id),
            creator_id: post.author_id.clone(),
            creator_handle: normalize_handle(&post.author_handle),
            text: clean_text(&post.text),
            requested_count: 1,
            created_at: Utc::now(),
            run_id: Some(run_id.to_string()),
        };
        let record_ref = &record;
        let created = retries
            .store_write
            .run("create_video", move || collections.create_video_if_absent(record_ref))
            .await
            .map_err(|e| store_abort("create_video", e))?;
        if created {
            info!(video_id, "Video record created");
            return Ok(None);
        }

        // Either another run created it between our read and write, or our
        // own insert landed and only its acknowledgement was lost.
        let raced = retries
            .store_read
            .run("video_lookup", move || collections.video(video_id))
            .await
            .map_err(|e| store_abort("video_lookup", e))?;
        match raced {
            Some(record) if written_by_run(record.run_id.as_deref(), run_id) => {
                info!(video_id, "Video record already created by this run");
                Ok(None)
            }
            Some(record) => Ok(Some(record.requested_count)),
            None => {
                error!(video_id, "Video record vanished after create conflict");
                Err(AbortReason::InternalError)
            }
        }
    }
}

fn written_by_run(stored: Option<&str>, run_id: &str) -> bool {
    stored == Some(run_id)
}

/// Exhausted transient failures mean the store is down. Anything else is
/// data or code we did not expect.
fn store_abort(op: &'static str, err: StoreError) -> AbortReason {
    if err.is_transient() {
        error!(op, error = %err, "Store unavailable");
        AbortReason::StoreUnavailable
    } else {
        error!(op, error = %err, "Unexpected store error");
        AbortReason::InternalError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landing_url_joins_with_single_slash() {
        assert_eq!(landing_url("https://savevidsbot.com/videos/", "2"), "https://savevidsbot.com/videos/2");
        assert_eq!(landing_url("https://savevidsbot.com/videos", "2"), "https://savevidsbot.com/videos/2");
    }

    #[test]
    fn reply_text_tags_requester_and_links_video() {
        assert_eq!(
            reply_text("didier", "https://savevidsbot.com/videos", "2"),
            "@didier Download link here! \nhttps://savevidsbot.com/videos/2"
        );
    }

    #[test]
    fn only_matching_run_id_counts_as_own_write() {
        assert!(written_by_run(Some("a"), "a"));
        assert!(!written_by_run(Some("b"), "a"));
        assert!(!written_by_run(None, "a"));
    }

    #[test]
    fn tweet_url_is_canonical_status_link() {
        assert_eq!(tweet_url("2"), "https://twitter.com/twitter/statuses/2");
    }
}
