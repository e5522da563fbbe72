use std::fmt;

/// Why a mention was dropped without completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AbortReason {
    NotAReply,
    SourceUnreachable,
    NoMedia,
    SensitiveContent,
    UserBanned,
    StoreUnavailable,
    RateCapped,
    AlreadyRequested,
    ReplyInFlight,
    ReplyFailed,
    InternalError,
}

impl AbortReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbortReason::NotAReply => "not_a_reply",
            AbortReason::SourceUnreachable => "source_unreachable",
            AbortReason::NoMedia => "no_media",
            AbortReason::SensitiveContent => "sensitive_content",
            AbortReason::UserBanned => "user_banned",
            AbortReason::StoreUnavailable => "store_unavailable",
            AbortReason::RateCapped => "rate_capped",
            AbortReason::AlreadyRequested => "already_requested",
            AbortReason::ReplyInFlight => "reply_in_flight",
            AbortReason::ReplyFailed => "reply_failed",
            AbortReason::InternalError => "internal_error",
        }
    }

    /// Expected rejections, as opposed to failures of a call.
    pub fn is_policy_rejection(&self) -> bool {
        matches!(
            self,
            AbortReason::NotAReply
                | AbortReason::NoMedia
                | AbortReason::SensitiveContent
                | AbortReason::UserBanned
                | AbortReason::RateCapped
                | AbortReason::AlreadyRequested
                | AbortReason::ReplyInFlight
        )
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed { reply_id: String },
    Aborted(AbortReason),
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed { .. })
    }

    pub fn abort_reason(&self) -> Option<AbortReason> {
        match self {
            Outcome::Aborted(reason) => Some(*reason),
            Outcome::Completed { .. } => None,
        }
    }
}
