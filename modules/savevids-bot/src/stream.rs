//! Stream adapter: keeps the live connection open and feeds mentions into a
//! bounded channel. Reconnects with exponential backoff; stops on shutdown,
//! on rejected credentials, or when the consumer goes away.

use std::fmt;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use savevids_common::Mention;
use twitter_client::TwitterError;

use crate::retry::jitter;
use crate::traits::{StreamItem, StreamSource};

/// Wait between connection attempts: `base * 2^failures`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            max: Duration::from_secs(320),
        }
    }
}

impl ReconnectPolicy {
    /// No waiting between attempts. For tests.
    pub fn immediate() -> Self {
        Self {
            base: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn delay(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.min(16));
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// Consecutive-failure count behind the reconnect wait. A connection that
/// comes up clears it, however long it then stays quiet.
#[derive(Debug)]
struct Backoff {
    policy: ReconnectPolicy,
    failures: u32,
}

impl Backoff {
    fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, failures: 0 }
    }

    fn connected(&mut self) {
        self.failures = 0;
    }

    /// Wait before the next attempt, without jitter.
    fn next_wait(&mut self) -> Duration {
        let wait = self.policy.delay(self.failures);
        self.failures = self.failures.saturating_add(1);
        wait
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StreamStats {
    pub connections: u64,
    pub mentions: u64,
    pub notices: u64,
    pub transport_errors: u64,
}

impl fmt::Display for StreamStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "connections={} mentions={} notices={} transport_errors={}",
            self.connections, self.mentions, self.notices, self.transport_errors,
        )
    }
}

pub struct StreamAdapter<S> {
    source: S,
    filter: String,
    reconnect: ReconnectPolicy,
}

impl<S: StreamSource> StreamAdapter<S> {
    pub fn new(source: S, filter: impl Into<String>) -> Self {
        Self {
            source,
            filter: filter.into(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Deliver mentions to `tx` until `shutdown` turns true (or its sender is
    /// dropped), or the receiver closes. Authentication failures are returned
    /// as errors; every other failure leads to a reconnect.
    pub async fn run(
        &self,
        tx: mpsc::Sender<Mention>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<StreamStats, TwitterError> {
        let mut stats = StreamStats::default();
        let mut backoff = Backoff::new(self.reconnect);
        let mut rule_ready = false;

        loop {
            if *shutdown.borrow() {
                break;
            }

            if !rule_ready {
                match self.source.ensure_filter(&self.filter).await {
                    Ok(()) => rule_ready = true,
                    Err(e) if e.is_auth_failure() => {
                        error!(error = %e, "Stream credentials rejected");
                        return Err(e);
                    }
                    Err(e) => warn!(filter = %self.filter, error = %e, "Could not set stream filter"),
                }
            }

            let connected = if rule_ready {
                tokio::select! {
                    result = self.source.connect() => Some(result),
                    _ = shutdown.wait_for(|stop| *stop) => break,
                }
            } else {
                None
            };

            match connected {
                Some(Ok(mut items)) => {
                    stats.connections += 1;
                    backoff.connected();
                    info!(filter = %self.filter, "Stream connected");

                    loop {
                        let next = tokio::select! {
                            item = items.next() => item,
                            _ = shutdown.wait_for(|stop| *stop) => {
                                info!("Shutdown requested, closing stream");
                                return Ok(stats);
                            }
                        };

                        match next {
                            Some(Ok(StreamItem::Mention(mention))) => {
                                stats.mentions += 1;
                                info!(mention_id = %mention.id, "Mention received");
                                if tx.send(mention).await.is_err() {
                                    info!("Mention consumer closed, stopping stream");
                                    return Ok(stats);
                                }
                            }
                            Some(Ok(StreamItem::Notice(notice))) => {
                                stats.notices += 1;
                                warn!(
                                    title = %notice.title,
                                    detail = notice.detail.as_deref().unwrap_or(""),
                                    "Stream notice"
                                );
                            }
                            Some(Err(e)) if e.is_auth_failure() => {
                                error!(error = %e, "Stream credentials rejected");
                                return Err(e);
                            }
                            Some(Err(TwitterError::Parse(message))) => {
                                warn!(error = %message, "Skipping undecodable stream line");
                            }
                            Some(Err(e)) => {
                                stats.transport_errors += 1;
                                warn!(error = %e, "Stream disconnected");
                                break;
                            }
                            None => {
                                warn!("Stream ended");
                                break;
                            }
                        }
                    }
                }
                Some(Err(e)) if e.is_auth_failure() => {
                    error!(error = %e, "Stream credentials rejected");
                    return Err(e);
                }
                Some(Err(e)) => {
                    stats.transport_errors += 1;
                    warn!(error = %e, "Stream connection failed");
                }
                None => {}
            }

            let base = backoff.next_wait();
            let wait = base + jitter(base);
            info!(attempt = backoff.failures, wait_ms = wait.as_millis() as u64, "Reconnecting stream");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
        }

        info!("Stream adapter stopped. {stats}");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_delay_doubles_up_to_ceiling() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(5));
        assert_eq!(policy.delay(1), Duration::from_secs(10));
        assert_eq!(policy.delay(6), Duration::from_secs(320));
        assert_eq!(policy.delay(7), Duration::from_secs(320));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(320));
    }

    #[test]
    fn successful_connection_resets_backoff() {
        let mut backoff = Backoff::new(ReconnectPolicy::default());
        for _ in 0..8 {
            backoff.next_wait();
        }
        assert_eq!(backoff.next_wait(), Duration::from_secs(320));

        backoff.connected();
        assert_eq!(backoff.next_wait(), Duration::from_secs(5));
        assert_eq!(backoff.next_wait(), Duration::from_secs(10));
    }
}
