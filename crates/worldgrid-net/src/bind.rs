//! Port acquisition with increment-on-collision retry.
//!
//! A bind that fails because the address is already in use is retried on
//! the next port up. Every other failure is fatal. The default policy
//! retries without limit and without delay.

use std::future::Future;
use std::io;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{NetError, NetResult};

/// Retry policy for [`bind_with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BindPolicy {
    /// Total attempts allowed, including the first. `None` is unbounded.
    pub max_attempts: Option<u32>,
    /// Pause before each retry.
    pub backoff: Duration,
}

impl BindPolicy {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    Bound,
    AddrInUse,
    Failed,
}

/// One try at one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindAttempt {
    pub port: u16,
    pub outcome: BindOutcome,
}

/// Run `attempt` on `start`, `start + 1`, ... until it succeeds.
///
/// Returns the port that bound together with whatever `attempt` produced.
/// `on_attempt` sees every attempt in order; ports are strictly increasing
/// by one.
pub async fn bind_with_retry<T, F, Fut>(
    start: u16,
    policy: &BindPolicy,
    mut attempt: F,
    mut on_attempt: impl FnMut(&BindAttempt),
) -> NetResult<(u16, T)>
where
    F: FnMut(u16) -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    let mut port = start;
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        match attempt(port).await {
            Ok(bound) => {
                on_attempt(&BindAttempt {
                    port,
                    outcome: BindOutcome::Bound,
                });
                debug!(port, attempts, "port bound");
                return Ok((port, bound));
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                on_attempt(&BindAttempt {
                    port,
                    outcome: BindOutcome::AddrInUse,
                });
                if policy.max_attempts.is_some_and(|max| attempts >= max) {
                    return Err(NetError::AttemptsExhausted { start, attempts });
                }
                port = port
                    .checked_add(1)
                    .ok_or(NetError::PortRangeExhausted { start })?;
                info!(next_port = port, "port already in use, incrementing");
                if !policy.backoff.is_zero() {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
            Err(source) => {
                on_attempt(&BindAttempt {
                    port,
                    outcome: BindOutcome::Failed,
                });
                return Err(NetError::Bind { port, source });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_use() -> io::Error {
        io::Error::from(io::ErrorKind::AddrInUse)
    }

    /// Fails with AddrInUse on every port in `busy`, records what was tried.
    async fn run(
        start: u16,
        busy: &[u16],
        policy: BindPolicy,
    ) -> (NetResult<(u16, u16)>, Vec<BindAttempt>) {
        let mut seen = Vec::new();
        let result = bind_with_retry(
            start,
            &policy,
            |port| {
                let busy = busy.contains(&port);
                async move { if busy { Err(in_use()) } else { Ok(port) } }
            },
            |a| seen.push(*a),
        )
        .await;
        (result, seen)
    }

    #[tokio::test]
    async fn free_port_binds_first_try() {
        let (result, seen) = run(5000, &[], BindPolicy::default()).await;
        assert_eq!(result.unwrap(), (5000, 5000));
        assert_eq!(
            seen,
            vec![BindAttempt {
                port: 5000,
                outcome: BindOutcome::Bound
            }]
        );
    }

    #[tokio::test]
    async fn busy_port_increments_by_one() {
        let (result, seen) = run(5000, &[5000, 5001, 5002], BindPolicy::default()).await;
        assert_eq!(result.unwrap().0, 5003);

        let ports: Vec<u16> = seen.iter().map(|a| a.port).collect();
        assert_eq!(ports, vec![5000, 5001, 5002, 5003]);
        assert!(ports.windows(2).all(|w| w[1] == w[0] + 1));
        assert_eq!(seen.last().unwrap().outcome, BindOutcome::Bound);
    }

    #[tokio::test]
    async fn max_attempts_caps_the_loop() {
        let policy = BindPolicy::unbounded().with_max_attempts(2);
        let (result, seen) = run(5000, &[5000, 5001, 5002], policy).await;
        assert!(matches!(
            result,
            Err(NetError::AttemptsExhausted {
                start: 5000,
                attempts: 2
            })
        ));
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn top_of_port_range_is_exhausted() {
        let (result, _) = run(65535, &[65535], BindPolicy::default()).await;
        assert!(matches!(
            result,
            Err(NetError::PortRangeExhausted { start: 65535 })
        ));
    }

    #[tokio::test]
    async fn other_errors_are_fatal() {
        let mut seen = Vec::new();
        let result: NetResult<(u16, ())> = bind_with_retry(
            5000,
            &BindPolicy::default(),
            |_| async { Err(io::Error::from(io::ErrorKind::PermissionDenied)) },
            |a| seen.push(*a),
        )
        .await;

        assert!(matches!(result, Err(NetError::Bind { port: 5000, .. })));
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].outcome, BindOutcome::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_waits_between_attempts() {
        let policy = BindPolicy::unbounded().with_backoff(Duration::from_millis(500));
        let start = tokio::time::Instant::now();
        let (result, _) = run(5000, &[5000, 5001], policy).await;
        assert_eq!(result.unwrap().0, 5002);
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }
}
