//! Consumer loop: one mention at a time, each run to completion.

use std::collections::BTreeMap;
use std::fmt;

use tokio::sync::mpsc;
use tracing::info;

use savevids_common::Mention;
use savevids_store::DocumentStore;

use crate::outcome::{AbortReason, Outcome};
use crate::pipeline::MentionPipeline;
use crate::traits::SocialApi;

/// Outcome counts for a worker's lifetime.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: u64,
    pub aborted: BTreeMap<AbortReason, u64>,
}

impl WorkerStats {
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Completed { .. } => self.completed += 1,
            Outcome::Aborted(reason) => *self.aborted.entry(*reason).or_default() += 1,
        }
    }

    pub fn aborted_for(&self, reason: AbortReason) -> u64 {
        self.aborted.get(&reason).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.completed + self.aborted.values().sum::<u64>()
    }
}

impl fmt::Display for WorkerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mentions={} completed={}", self.total(), self.completed)?;
        for (reason, count) in &self.aborted {
            write!(f, " {reason}={count}")?;
        }
        Ok(())
    }
}

pub struct Worker<P, S> {
    pipeline: MentionPipeline<P, S>,
}

impl<P: SocialApi, S: DocumentStore> Worker<P, S> {
    pub fn new(pipeline: MentionPipeline<P, S>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &MentionPipeline<P, S> {
        &self.pipeline
    }

    /// Drain `rx` until every sender is gone. The mention in progress when
    /// the producer stops is always finished.
    pub async fn run(&self, mut rx: mpsc::Receiver<Mention>) -> WorkerStats {
        let mut stats = WorkerStats::default();
        while let Some(mention) = rx.recv().await {
            let outcome = self.pipeline.handle(&mention).await;
            stats.record(&outcome);
        }
        info!("Worker stopped. {stats}");
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_count_outcomes_by_reason() {
        let mut stats = WorkerStats::default();
        stats.record(&Outcome::Completed { reply_id: "r1".into() });
        stats.record(&Outcome::Aborted(AbortReason::NoMedia));
        stats.record(&Outcome::Aborted(AbortReason::NoMedia));
        stats.record(&Outcome::Aborted(AbortReason::RateCapped));

        assert_eq!(stats.total(), 4);
        assert_eq!(stats.aborted_for(AbortReason::NoMedia), 2);
        assert_eq!(stats.to_string(), "mentions=4 completed=1 no_media=2 rate_capped=1");
    }
}
