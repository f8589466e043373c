//! Retry policy for one identifier: how often, how long to wait, and which
//! failures are worth another attempt.

use stats_fetcher::FetchErrorKind;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// How one isolated fetch attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    /// Wall-clock deadline passed; the attempt was killed.
    TimedOut,
    /// Non-zero exit. `kind` is present when the fetch reported why.
    Failed { exit_code: Option<i32>, kind: Option<FetchErrorKind> },
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success)
    }

    /// `ok`, `timeout`, `exit_1`, `killed`
    pub fn label(&self) -> String {
        match self {
            AttemptOutcome::Success => "ok".to_string(),
            AttemptOutcome::TimedOut => "timeout".to_string(),
            AttemptOutcome::Failed { exit_code: Some(code), .. } => format!("exit_{code}"),
            AttemptOutcome::Failed { exit_code: None, .. } => "killed".to_string(),
        }
    }

    pub fn kind(&self) -> Option<FetchErrorKind> {
        match self {
            AttemptOutcome::Failed { kind, .. } => *kind,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Retry,
    GiveUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// Doubles from `initial` on every failure, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Wait after the `failures`-th consecutive failure (1-based).
    pub fn delay(&self, failures: u32) -> Duration {
        match *self {
            Backoff::Fixed(d) => d,
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(failures.saturating_sub(1));
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

pub type Classifier = Arc<dyn Fn(&AttemptOutcome) -> Disposition + Send + Sync>;

/// Timeouts and unexplained exits retry; deterministic fetch failures stop.
pub fn classify_by_kind(outcome: &AttemptOutcome) -> Disposition {
    match outcome.kind() {
        Some(kind) if !kind.is_retriable() => Disposition::GiveUp,
        _ => Disposition::Retry,
    }
}

#[derive(Clone)]
pub struct RetryPolicy {
    /// `None` = no limit.
    pub max_attempts: Option<u32>,
    pub backoff:      Backoff,
    classifier:       Classifier,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff:      Backoff::Fixed(Duration::from_millis(100)),
            classifier:   Arc::new(classify_by_kind),
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// Every failure retries, forever, 100 ms apart.
    pub fn retry_all() -> Self {
        Self::default().with_classifier(|_| Disposition::Retry)
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&AttemptOutcome) -> Disposition + Send + Sync + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn classify(&self, outcome: &AttemptOutcome) -> Disposition {
        (self.classifier)(outcome)
    }

    pub fn attempts_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(kind: Option<FetchErrorKind>) -> AttemptOutcome {
        AttemptOutcome::Failed { exit_code: Some(1), kind }
    }

    #[test]
    fn exponential_backoff_doubles_up_to_cap() {
        let b = Backoff::Exponential {
            initial: Duration::from_millis(100),
            max:     Duration::from_millis(1000),
        };
        let delays: Vec<_> = (1..=6).map(|n| b.delay(n).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
        assert_eq!(b.delay(200), Duration::from_millis(1000));
    }

    #[test]
    fn fixed_backoff_never_changes() {
        let b = Backoff::Fixed(Duration::from_millis(100));
        assert_eq!(b.delay(1), b.delay(50));
    }

    #[test]
    fn default_classifier_stops_on_deterministic_failures() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.classify(&AttemptOutcome::TimedOut), Disposition::Retry);
        assert_eq!(policy.classify(&failed(None)), Disposition::Retry);
        assert_eq!(policy.classify(&failed(Some(FetchErrorKind::ExportTimeout))), Disposition::Retry);
        assert_eq!(policy.classify(&failed(Some(FetchErrorKind::SectionNotFound))), Disposition::Retry);
        assert_eq!(policy.classify(&failed(Some(FetchErrorKind::UnknownCategory))), Disposition::GiveUp);
        assert_eq!(policy.classify(&failed(Some(FetchErrorKind::IndexOutOfRange))), Disposition::GiveUp);
    }

    #[test]
    fn retry_all_ignores_kinds() {
        let policy = RetryPolicy::retry_all();
        assert_eq!(policy.max_attempts, None);
        assert_eq!(policy.classify(&failed(Some(FetchErrorKind::UnknownCategory))), Disposition::Retry);
    }

    #[test]
    fn attempt_limit() {
        let unlimited = RetryPolicy::default();
        assert!(!unlimited.attempts_exhausted(u32::MAX));

        let three = RetryPolicy::default().with_max_attempts(Some(3));
        assert!(!three.attempts_exhausted(2));
        assert!(three.attempts_exhausted(3));
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(AttemptOutcome::Success.label(), "ok");
        assert_eq!(AttemptOutcome::TimedOut.label(), "timeout");
        assert_eq!(failed(None).label(), "exit_1");
        assert_eq!(AttemptOutcome::Failed { exit_code: None, kind: None }.label(), "killed");
    }
}
