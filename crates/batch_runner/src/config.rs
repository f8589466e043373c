//! `BATCH_*` environment configuration.

use crate::policy::{Backoff, RetryPolicy};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub attempt_timeout: Duration,
    pub backoff:         Duration,
    /// Set to switch from a fixed to a doubling backoff capped here.
    pub backoff_max:     Option<Duration>,
    pub max_attempts:    Option<u32>,
    /// Retry every failure, including ones that can never succeed.
    pub retry_all:       bool,
    pub fetch_bin:       Option<PathBuf>,
    pub log_dir:         PathBuf,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(10),
            backoff:         Duration::from_millis(100),
            backoff_max:     None,
            max_attempts:    None,
            retry_all:       false,
            fetch_bin:       None,
            log_dir:         PathBuf::from("logs"),
        }
    }
}

impl BatchConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            attempt_timeout: env_parse("BATCH_ATTEMPT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.attempt_timeout),
            backoff:         env_parse("BATCH_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.backoff),
            backoff_max:     env_parse("BATCH_BACKOFF_MAX_MS").map(Duration::from_millis),
            max_attempts:    env_parse::<u32>("BATCH_MAX_ATTEMPTS").filter(|n| *n > 0),
            retry_all:       env_parse("BATCH_RETRY_ALL").unwrap_or(defaults.retry_all),
            fetch_bin:       env::var("BATCH_FETCH_BIN").ok().filter(|v| !v.trim().is_empty()).map(PathBuf::from),
            log_dir:         env::var("STATS_LOG_DIR").ok().map(PathBuf::from).unwrap_or(defaults.log_dir),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        let base = if self.retry_all { RetryPolicy::retry_all() } else { RetryPolicy::default() };
        let backoff = match self.backoff_max {
            Some(max) => Backoff::Exponential { initial: self.backoff, max: max.max(self.backoff) },
            None => Backoff::Fixed(self.backoff),
        };
        base.with_backoff(backoff).with_max_attempts(self.max_attempts)
    }

    /// `BATCH_FETCH_BIN`, else `get-data` next to the running executable.
    pub fn resolve_fetch_bin(&self) -> std::io::Result<PathBuf> {
        if let Some(bin) = &self.fetch_bin {
            return Ok(bin.clone());
        }
        let exe = env::current_exe()?;
        let dir = exe.parent().map(PathBuf::from).unwrap_or_default();
        Ok(dir.join(format!("get-data{}", env::consts::EXE_SUFFIX)))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{AttemptOutcome, Disposition};
    use stats_fetcher::FetchErrorKind;

    fn unmapped() -> AttemptOutcome {
        AttemptOutcome::Failed { exit_code: Some(1), kind: Some(FetchErrorKind::UnknownCategory) }
    }

    #[test]
    fn default_policy_is_unlimited_fixed_and_classifying() {
        let policy = BatchConfig::default().policy();
        assert_eq!(policy.max_attempts, None);
        assert_eq!(policy.backoff, Backoff::Fixed(Duration::from_millis(100)));
        assert_eq!(policy.classify(&unmapped()), Disposition::GiveUp);
    }

    #[test]
    fn retry_all_and_exponential() {
        let config = BatchConfig {
            retry_all: true,
            backoff_max: Some(Duration::from_secs(2)),
            max_attempts: Some(5),
            ..BatchConfig::default()
        };
        let policy = config.policy();
        assert_eq!(policy.classify(&unmapped()), Disposition::Retry);
        assert_eq!(policy.max_attempts, Some(5));
        assert_eq!(
            policy.backoff,
            Backoff::Exponential { initial: Duration::from_millis(100), max: Duration::from_secs(2) }
        );
    }

    #[test]
    fn explicit_fetch_bin_wins() {
        let config = BatchConfig { fetch_bin: Some(PathBuf::from("/opt/get-data")), ..BatchConfig::default() };
        assert_eq!(config.resolve_fetch_bin().unwrap(), PathBuf::from("/opt/get-data"));
    }
}
