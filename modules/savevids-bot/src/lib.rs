//! Mention bot: turns "@bot" replies under a video into a download link.
//!
//! The stream adapter feeds mentions through a bounded channel to a single
//! worker, which runs each one through the `MentionPipeline` to completion
//! before taking the next.

pub mod extract;
pub mod outcome;
pub mod pipeline;
pub mod policy;
pub mod retry;
pub mod social;
pub mod stream;
pub mod traits;
pub mod worker;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use outcome::{AbortReason, Outcome};
pub use pipeline::{landing_url, reply_text, MentionPipeline, PipelineSettings};
pub use retry::{RetryPolicy, RetryProfile};
pub use stream::{ReconnectPolicy, StreamAdapter, StreamStats};
pub use traits::{MentionStream, SocialApi, StreamItem, StreamSource};
pub use worker::{Worker, WorkerStats};
