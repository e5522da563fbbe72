//! Newline-delimited JSON decoding for the filtered stream.

use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde::Deserialize;

use crate::error::{Result, TwitterError};
use crate::types::{ApiProblem, ExpandedTweet, Includes, StreamEvent, StreamNotice, Tweet};

/// Longest line accepted from the stream. A tweet with its expansions is a
/// few kilobytes.
pub const MAX_LINE_BYTES: usize = 512 * 1024;

/// Boxed stream of decoded events. Ends after the first transport error.
pub type TweetStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

#[derive(Debug, Deserialize)]
struct StreamLine {
    data: Option<Tweet>,
    #[serde(default)]
    includes: Includes,
    #[serde(default)]
    errors: Vec<ApiProblem>,
}

/// Decode one line. Blank lines are keep-alive heartbeats and yield `None`.
pub fn decode_stream_line(line: &str) -> Result<Option<StreamEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let parsed: StreamLine = serde_json::from_str(line)?;
    if let Some(tweet) = parsed.data {
        return Ok(Some(StreamEvent::Tweet(ExpandedTweet {
            tweet,
            includes: parsed.includes,
        })));
    }

    match parsed.errors.into_iter().next() {
        Some(problem) => Ok(Some(StreamEvent::Notice(StreamNotice {
            title: problem.title.unwrap_or_else(|| "unknown".to_string()),
            detail: problem.detail,
        }))),
        None => Err(TwitterError::Parse(format!("unrecognised stream line: {line}"))),
    }
}

/// Split a chunked byte stream into lines and decode each one.
///
/// The returned stream yields `Err(StreamClosed)` when the body ends, and
/// terminates after any transport error or a line over `MAX_LINE_BYTES`.
pub fn decode_lines<S, B, E>(bytes: S) -> TweetStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<TwitterError> + Send + 'static,
{
    decode_lines_capped(bytes, MAX_LINE_BYTES)
}

pub(crate) fn decode_lines_capped<S, B, E>(bytes: S, max_line: usize) -> TweetStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<TwitterError> + Send + 'static,
{
    let state = (bytes, Vec::<u8>::new(), false);
    Box::pin(futures::stream::unfold(
        state,
        move |(mut bytes, mut buf, finished)| async move {
            if finished {
                return None;
            }
            loop {
                if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                    let raw: Vec<u8> = buf.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&raw);
                    match decode_stream_line(&line) {
                        Ok(Some(event)) => return Some((Ok(event), (bytes, buf, false))),
                        Ok(None) => continue,
                        Err(e) => return Some((Err(e), (bytes, buf, false))),
                    }
                }
                if buf.len() > max_line {
                    let err = TwitterError::Parse(format!("stream line exceeds {max_line} bytes"));
                    return Some((Err(err), (bytes, Vec::new(), true)));
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => buf.extend_from_slice(chunk.as_ref()),
                    Some(Err(e)) => return Some((Err(e.into()), (bytes, buf, true))),
                    None => return Some((Err(TwitterError::StreamClosed), (bytes, buf, true))),
                }
            }
        },
    ))
}
