//! State polling
//!
//! Repeatedly refresh a resource until its status string reaches one of the
//! target states, fails on an unexpected state, or the timeout elapses.

use crate::error::{CloudError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Default number of consecutive not-found refreshes tolerated while waiting
/// for a target state.
pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Shortest fixed wait between refreshes
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Outcome of a single status refresh: `None` when the resource does not
/// exist, otherwise the fetched object and its status string.
pub type Refreshed<T> = Option<(T, String)>;

/// Describes how to wait for a status transition.
///
/// `refresh` is called once per poll. It must map "not found" to `Ok(None)`
/// and only return `Err` for genuine failures, which abort the wait.
pub struct StateChangeConf<F> {
    pending: Vec<String>,
    target: Vec<String>,
    refresh: F,
    timeout: Duration,
    delay: Duration,
    min_timeout: Duration,
    poll_interval: Option<Duration>,
    not_found_checks: u32,
    continuous_target_occurence: u32,
}

impl<F> StateChangeConf<F> {
    pub fn new(refresh: F) -> Self {
        Self {
            pending: Vec::new(),
            target: Vec::new(),
            refresh,
            timeout: Duration::from_secs(20 * 60),
            delay: Duration::ZERO,
            min_timeout: Duration::ZERO,
            poll_interval: None,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
            continuous_target_occurence: 1,
        }
    }

    pub fn pending(mut self, states: &[&str]) -> Self {
        self.pending = states.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Target states. An empty target means "wait until not found".
    pub fn target(mut self, states: &[&str]) -> Self {
        self.target = states.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wait before the first refresh
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Smallest wait between refreshes when backing off
    pub fn min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    /// Fixed wait between refreshes, replacing the exponential backoff.
    /// Clamped to at least [`MIN_POLL_INTERVAL`].
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval.max(MIN_POLL_INTERVAL));
        self
    }

    pub fn not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    /// Number of consecutive target observations required
    pub fn continuous_target_occurence(mut self, occurences: u32) -> Self {
        self.continuous_target_occurence = occurences.max(1);
        self
    }

    /// Poll until a target state is observed.
    ///
    /// Returns the last refreshed object, or `None` when the target is empty
    /// and the resource disappeared.
    pub async fn wait_for_state<T, Fut>(mut self) -> Result<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Refreshed<T>>>,
    {
        let deadline = Instant::now() + self.timeout;
        let expected = self.target.join(", ");

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut backoff = INITIAL_BACKOFF;
        let mut not_found_tick = 0u32;
        let mut target_occurence = 0u32;
        let mut last_state = String::new();

        loop {
            // A hung refresh still counts against the deadline
            let refreshed = match tokio::time::timeout_at(deadline, (self.refresh)()).await {
                Ok(refreshed) => refreshed?,
                Err(_) => {
                    return Err(CloudError::Timeout {
                        last_state,
                        expected,
                        timeout: self.timeout,
                    });
                }
            };

            match refreshed {
                None => {
                    if self.target.is_empty() {
                        return Ok(None);
                    }
                    not_found_tick += 1;
                    target_occurence = 0;
                    tracing::debug!(
                        "Resource not found ({not_found_tick}/{}) while waiting for {expected}",
                        self.not_found_checks
                    );
                    if not_found_tick > self.not_found_checks {
                        return Err(CloudError::NotFoundAfterRetries {
                            retries: not_found_tick,
                        });
                    }
                }
                Some((value, state)) => {
                    not_found_tick = 0;
                    tracing::trace!("Refreshed state: {state}");

                    if self.target.contains(&state) {
                        target_occurence += 1;
                        if target_occurence >= self.continuous_target_occurence {
                            return Ok(Some(value));
                        }
                    } else if self.pending.contains(&state) {
                        target_occurence = 0;
                    } else if !self.pending.is_empty() {
                        return Err(CloudError::UnexpectedState { state, expected });
                    }
                    last_state = state;
                }
            }

            let wait = match self.poll_interval {
                Some(interval) => interval,
                None => {
                    let wait = backoff.max(self.min_timeout);
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    wait
                }
            };

            if Instant::now() + wait > deadline {
                return Err(CloudError::Timeout {
                    last_state,
                    expected,
                    timeout: self.timeout,
                });
            }

            tracing::trace!("Waiting {wait:?} before next refresh");
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    type Script = Arc<Mutex<VecDeque<Result<Refreshed<u32>>>>>;

    /// Refresh function replaying a fixed sequence of responses; the last
    /// response repeats forever.
    fn scripted(
        responses: Vec<Result<Refreshed<u32>>>,
    ) -> (Script, impl FnMut() -> std::future::Ready<Result<Refreshed<u32>>>) {
        let script: Script = Arc::new(Mutex::new(responses.into()));
        let calls = script.clone();
        let refresh = move || {
            let mut queue = calls.lock().unwrap();
            let next = if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                match queue.front().unwrap() {
                    Ok(v) => Ok(v.clone()),
                    Err(e) => Err(CloudError::StateError(e.to_string())),
                }
            };
            std::future::ready(next)
        };
        (script, refresh)
    }

    fn state(n: u32, s: &str) -> Result<Refreshed<u32>> {
        Ok(Some((n, s.to_string())))
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaches_target() {
        let (_, refresh) = scripted(vec![
            state(1, "CREATING"),
            state(2, "CREATING"),
            state(3, "ACTIVE"),
        ]);
        let result = StateChangeConf::new(refresh)
            .pending(&["CREATING"])
            .target(&["ACTIVE"])
            .timeout(Duration::from_secs(60))
            .wait_for_state()
            .await
            .unwrap();
        assert_eq!(result, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_state() {
        let (_, refresh) = scripted(vec![state(1, "CREATING"), state(2, "FAILED")]);
        let err = StateChangeConf::new(refresh)
            .pending(&["CREATING"])
            .target(&["ACTIVE"])
            .wait_for_state()
            .await
            .unwrap_err();
        match err {
            CloudError::UnexpectedState { state, expected } => {
                assert_eq!(state, "FAILED");
                assert_eq!(expected, "ACTIVE");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_state_tolerated_without_pending() {
        let (_, refresh) = scripted(vec![state(1, "SOMETHING"), state(2, "ACTIVE")]);
        let result = StateChangeConf::new(refresh)
            .target(&["ACTIVE"])
            .wait_for_state()
            .await
            .unwrap();
        assert_eq!(result, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_with_empty_target_is_done() {
        let (_, refresh) = scripted(vec![state(1, "DELETING"), Ok(None)]);
        let result = StateChangeConf::new(refresh)
            .pending(&["DELETING"])
            .target(&[])
            .wait_for_state()
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_budget_exhausted() {
        let (_, refresh) = scripted(vec![Ok(None)]);
        let err = StateChangeConf::new(refresh)
            .pending(&["CREATING"])
            .target(&["ACTIVE"])
            .not_found_checks(3)
            .poll_interval(Duration::from_secs(1))
            .wait_for_state()
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::NotFoundAfterRetries { retries: 4 }));
        assert!(err.is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_last_state() {
        let (_, refresh) = scripted(vec![state(1, "CREATING")]);
        let start = Instant::now();
        let err = StateChangeConf::new(refresh)
            .pending(&["CREATING"])
            .target(&["ACTIVE"])
            .timeout(Duration::from_secs(30))
            .poll_interval(Duration::from_secs(10))
            .wait_for_state()
            .await
            .unwrap_err();
        match err {
            CloudError::Timeout {
                last_state,
                expected,
                ..
            } => {
                assert_eq!(last_state, "CREATING");
                assert_eq!(expected, "ACTIVE");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(start.elapsed() <= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_refresh_times_out() {
        let start = Instant::now();
        let err = StateChangeConf::new(std::future::pending::<Result<Refreshed<u32>>>)
            .pending(&["CREATING"])
            .target(&["ACTIVE"])
            .timeout(Duration::from_secs(30))
            .wait_for_state()
            .await
            .unwrap_err();
        match err {
            CloudError::Timeout {
                last_state,
                timeout,
                ..
            } => {
                assert_eq!(last_state, "");
                assert_eq!(timeout, Duration::from_secs(30));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_poll_interval_is_clamped() {
        let (script, mut refresh) = scripted(vec![state(1, "CREATING")]);
        let calls = Arc::new(Mutex::new(0u32));
        let counter = calls.clone();
        let counted = move || {
            *counter.lock().unwrap() += 1;
            refresh()
        };
        let err = StateChangeConf::new(counted)
            .pending(&["CREATING"])
            .target(&["ACTIVE"])
            .timeout(Duration::from_secs(1))
            .poll_interval(Duration::ZERO)
            .wait_for_state()
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Timeout { .. }));
        assert!(*calls.lock().unwrap() <= 11);
        assert_eq!(script.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_continuous_target_occurence() {
        let (script, refresh) = scripted(vec![
            state(1, "ACTIVE"),
            state(2, "UPDATING"),
            state(3, "ACTIVE"),
            state(4, "ACTIVE"),
            state(5, "ACTIVE"),
        ]);
        let result = StateChangeConf::new(refresh)
            .pending(&["UPDATING"])
            .target(&["ACTIVE"])
            .continuous_target_occurence(2)
            .wait_for_state()
            .await
            .unwrap();
        assert_eq!(result, Some(4));
        assert_eq!(script.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_error_aborts() {
        let (_, refresh) = scripted(vec![
            state(1, "CREATING"),
            Err(CloudError::api("AccessDeniedException", "denied")),
        ]);
        let err = StateChangeConf::new(refresh)
            .pending(&["CREATING"])
            .target(&["ACTIVE"])
            .wait_for_state()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("AccessDeniedException"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_before_first_refresh() {
        let (_, refresh) = scripted(vec![state(1, "ACTIVE")]);
        let start = Instant::now();
        StateChangeConf::new(refresh)
            .target(&["ACTIVE"])
            .delay(Duration::from_secs(30))
            .wait_for_state()
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(30));
    }
}
