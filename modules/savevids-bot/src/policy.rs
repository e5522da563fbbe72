//! Request policy. Pure functions over data the pipeline already fetched.

use savevids_common::{BanRecord, SourcePost, UserRequestHistory};

/// Only an explicit flag counts. Posts that do not declare one pass.
pub fn is_sensitive(post: &SourcePost) -> bool {
    post.possibly_sensitive == Some(true)
}

/// Whether the ban lookup found a record. Its contents do not matter.
pub fn is_banned(ban: Option<&BanRecord>) -> bool {
    ban.is_some()
}

/// Whether the requester has already been sent this video.
pub fn is_duplicate_request(history: Option<&UserRequestHistory>, video_id: &str) -> bool {
    history.is_some_and(|h| h.contains(video_id))
}

pub fn is_over_request_cap(current_count: i64, max_count: i64) -> bool {
    current_count >= max_count
}

#[cfg(test)]
mod tests {
    use savevids_common::RequestedVideo;

    use super::*;

    #[test]
    fn missing_sensitivity_flag_is_not_sensitive() {
        let mut post = SourcePost::default();
        assert!(!is_sensitive(&post));
        post.possibly_sensitive = Some(false);
        assert!(!is_sensitive(&post));
        post.possibly_sensitive = Some(true);
        assert!(is_sensitive(&post));
    }

    #[test]
    fn ban_is_existence_of_record() {
        assert!(is_banned(Some(&BanRecord::default())));
        assert!(!is_banned(None));
    }

    #[test]
    fn duplicate_means_video_already_in_history() {
        let mut history = UserRequestHistory::new("didier", "7");
        history.push_latest(RequestedVideo {
            video_id: "2".to_string(),
            reply_id: "r1".to_string(),
        });
        assert!(is_duplicate_request(Some(&history), "2"));
        assert!(!is_duplicate_request(Some(&history), "3"));
        assert!(!is_duplicate_request(None, "2"));
    }

    #[test]
    fn cap_is_inclusive() {
        assert!(!is_over_request_cap(4, 5));
        assert!(is_over_request_cap(5, 5));
        assert!(is_over_request_cap(6, 5));
    }
}
