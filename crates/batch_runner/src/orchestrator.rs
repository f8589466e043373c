use crate::error::Result;
use crate::policy::{AttemptOutcome, Disposition, RetryPolicy};
use crate::runner::AttemptRunner;
use serde::Serialize;
use logger::{now_iso, BatchAttemptEvent, BatchItemDoneEvent, BatchSummaryEvent, EventLogger};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub fetched:   Vec<i64>,
    /// Identifiers the policy gave up on, with the reason.
    pub abandoned: Vec<(i64, String)>,
    pub attempts:  u64,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.abandoned.is_empty()
    }
}

enum ItemResult {
    Fetched,
    Abandoned(String),
}

/// Walks an inclusive identifier range in order, one item in flight.
pub struct BatchOrchestrator<R> {
    runner:          R,
    policy:          RetryPolicy,
    attempt_timeout: Duration,
    events:          Option<EventLogger>,
}

impl<R: AttemptRunner> BatchOrchestrator<R> {
    pub fn new(runner: R, policy: RetryPolicy, attempt_timeout: Duration) -> Self {
        Self { runner, policy, attempt_timeout, events: None }
    }

    pub fn with_event_log(mut self, events: EventLogger) -> Self {
        self.events = Some(events);
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub async fn run(&mut self, start: i64, end: i64) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        if start > end {
            warn!("Empty range {}..={}, nothing to do", start, end);
            return Ok(report);
        }

        info!("Batch {}..={} (timeout {:?}, {:?})", start, end, self.attempt_timeout, self.policy);

        for index in start..=end {
            let (result, attempts) = self.fetch_index(index).await?;
            report.attempts += u64::from(attempts);

            let reason = match result {
                ItemResult::Fetched => {
                    report.fetched.push(index);
                    None
                }
                ItemResult::Abandoned(reason) => {
                    report.abandoned.push((index, reason.clone()));
                    Some(reason)
                }
            };
            self.emit(&BatchItemDoneEvent {
                ts: now_iso(),
                event: "BATCH_ITEM_DONE",
                index,
                attempts,
                fetched: reason.is_none(),
                reason,
            });
        }

        info!(
            "Batch done: {} fetched, {} abandoned, {} attempts",
            report.fetched.len(),
            report.abandoned.len(),
            report.attempts
        );
        self.emit(&BatchSummaryEvent {
            ts: now_iso(),
            event: "BATCH_SUMMARY",
            start,
            end,
            fetched: report.fetched.len(),
            abandoned: report.abandoned.len(),
            attempts: report.attempts,
        });
        Ok(report)
    }

    /// Attempts one identifier until it succeeds or the policy gives up.
    async fn fetch_index(&mut self, index: i64) -> Result<(ItemResult, u32)> {
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            let outcome = self.runner.run_attempt(index, self.attempt_timeout).await?;

            let disposition = if outcome.is_success() {
                None
            } else if self.policy.attempts_exhausted(attempts) {
                Some(Disposition::GiveUp)
            } else {
                Some(self.policy.classify(&outcome))
            };
            self.log_attempt(index, attempts, &outcome, disposition);

            match disposition {
                None => return Ok((ItemResult::Fetched, attempts)),
                Some(Disposition::GiveUp) => {
                    return Ok((ItemResult::Abandoned(give_up_reason(&outcome, attempts)), attempts));
                }
                Some(Disposition::Retry) => sleep(self.policy.backoff.delay(attempts)).await,
            }
        }
    }

    fn log_attempt(&self, index: i64, attempt: u32, outcome: &AttemptOutcome, disposition: Option<Disposition>) {
        match (outcome, disposition) {
            (AttemptOutcome::Success, _) => info!("[{}] OK", index),
            (AttemptOutcome::TimedOut, Some(Disposition::Retry)) => {
                warn!("[{}] timed out, retrying…", index)
            }
            (AttemptOutcome::Failed { exit_code, kind }, Some(Disposition::Retry)) => warn!(
                "[{}] exited {}{}, retrying…",
                index,
                exit_code.map_or_else(|| "by signal".to_string(), |c| c.to_string()),
                kind.map(|k| format!(" ({k})")).unwrap_or_default()
            ),
            (_, _) => warn!("[{}] {} on attempt {}, giving up", index, outcome.label(), attempt),
        }

        self.emit(&BatchAttemptEvent {
            ts: now_iso(),
            event: "BATCH_ATTEMPT",
            index,
            attempt,
            outcome: outcome.label(),
            kind: outcome.kind().map(|k| k.to_string()),
            disposition: match disposition {
                None => "done",
                Some(Disposition::Retry) => "retry",
                Some(Disposition::GiveUp) => "give_up",
            }
            .to_string(),
        });
    }

    fn emit<T: Serialize>(&self, event: &T) {
        if let Some(events) = &self.events {
            events.log_quiet(event);
        }
    }
}

fn give_up_reason(outcome: &AttemptOutcome, attempts: u32) -> String {
    match outcome.kind() {
        Some(kind) => format!("{kind} after {attempts} attempt(s)"),
        None => format!("{} after {attempts} attempt(s)", outcome.label()),
    }
}
