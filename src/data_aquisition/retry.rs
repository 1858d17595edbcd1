use std::{future::Future, time::Duration};

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, warn};

use crate::{
    config::QueryPolicy,
    data_aquisition::core::{QueryClient, QueryError, QueryResult, QueryRow, QueryValue},
    network::address::Address,
};

/// Applies a [`QueryPolicy`] (timeout, bounded retries, backoff) to every query of the inner client.
///
/// Walks are retried page by page, so a long table that stalls halfway resumes
/// from the last row received.
pub struct RetryingClient<C> {
    inner: C,
    policy: QueryPolicy,
}

impl<C: QueryClient> RetryingClient<C> {
    pub fn new(inner: C, policy: QueryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn jitter(&self, backoff: Duration) -> Duration {
        let spread = (backoff.as_millis() / 4) as u64;
        if spread == 0 {
            return backoff;
        }
        backoff + Duration::from_millis(rand::rng().random_range(0..=spread))
    }

    async fn run<T, F, Fut>(&self, oid: &str, mut op: F) -> QueryResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = QueryResult<T>> + Send,
        T: Send,
    {
        let attempts = self.policy.retries + 1;
        let mut attempt = 1;
        loop {
            let result = match tokio::time::timeout(self.policy.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(QueryError::Timeout {
                    address: self.inner.address(),
                    oid: oid.to_string(),
                    attempts: attempt,
                }),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < attempts => {
                    let backoff = self.jitter(self.policy.backoff_duration(attempt));
                    debug!(
                        address = %self.inner.address(),
                        oid,
                        attempt,
                        ?backoff,
                        error = %e,
                        "query failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(QueryError::Timeout { address, oid, .. }) => {
                    warn!(%address, oid, attempts = attempt, "query timed out");
                    return Err(QueryError::Timeout {
                        address,
                        oid,
                        attempts: attempt,
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl<C: QueryClient> QueryClient for RetryingClient<C> {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn get(&self, oid: &str) -> QueryResult<QueryValue> {
        self.run(oid, || self.inner.get(oid)).await
    }

    async fn walk_page(&self, prefix: &str, after: Option<&str>) -> QueryResult<Vec<QueryRow>> {
        self.run(prefix, || self.inner.walk_page(prefix, after)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU32, Ordering},
    };

    use super::*;

    /// Fails with a transport error until `failures` calls have been made.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        hang: bool,
    }

    #[async_trait]
    impl QueryClient for Flaky {
        fn address(&self) -> Address {
            "10.0.0.1".parse().unwrap()
        }

        async fn get(&self, _oid: &str) -> QueryResult<QueryValue> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            if call < self.failures {
                Err(QueryError::Transport {
                    address: self.address(),
                    message: "lost datagram".into(),
                })
            } else {
                Ok(QueryValue::Text("R1".into()))
            }
        }

        async fn walk_page(&self, _prefix: &str, _after: Option<&str>) -> QueryResult<Vec<QueryRow>> {
            Err(QueryError::NoSuchObject {
                address: self.address(),
                oid: "1.3".into(),
            })
        }
    }

    fn flaky(failures: u32, hang: bool) -> Flaky {
        Flaky {
            failures,
            calls: AtomicU32::new(0),
            hang,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_failures() {
        let client = RetryingClient::new(flaky(2, false), QueryPolicy::default());
        let value = client.get("1.3.6.1.2.1.1.5.0").await.unwrap();
        assert_eq!(value.as_text(), "R1");
        assert_eq!(client.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_retry_budget() {
        let client = RetryingClient::new(flaky(10, false), QueryPolicy::default());
        let err = client.get("1.3.6.1.2.1.1.5.0").await.unwrap_err();
        assert!(matches!(err, QueryError::Transport { .. }));
        assert_eq!(client.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_reported_with_attempts() {
        let client = RetryingClient::new(flaky(0, true), QueryPolicy::default());
        let err = client.get("1.3.6.1.2.1.1.5.0").await.unwrap_err();
        assert!(matches!(err, QueryError::Timeout { attempts: 3, .. }));
    }

    /// Serves `pages` one-row pages, each taking `delay`. The second page fails once.
    struct Paged {
        pages: u32,
        delay: Duration,
        requests: Mutex<Vec<Option<String>>>,
        failed: AtomicBool,
    }

    #[async_trait]
    impl QueryClient for Paged {
        fn address(&self) -> Address {
            "10.0.0.1".parse().unwrap()
        }

        async fn get(&self, _oid: &str) -> QueryResult<QueryValue> {
            Ok(QueryValue::Unknown)
        }

        async fn walk_page(&self, _prefix: &str, after: Option<&str>) -> QueryResult<Vec<QueryRow>> {
            self.requests.lock().unwrap().push(after.map(str::to_string));
            tokio::time::sleep(self.delay).await;
            let next = after.map_or(0, |a| a.parse::<u32>().unwrap() + 1);
            if next == 1 && !self.failed.swap(true, Ordering::SeqCst) {
                return Err(QueryError::Transport {
                    address: self.address(),
                    message: "lost datagram".into(),
                });
            }
            if next >= self.pages {
                return Ok(Vec::new());
            }
            Ok(vec![QueryRow::new(next.to_string(), QueryValue::Integer(i64::from(next)))])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_walk_timeout_and_retries_apply_per_page() {
        let paged = Paged {
            pages: 3,
            delay: Duration::from_millis(1500),
            requests: Mutex::new(Vec::new()),
            failed: AtomicBool::new(false),
        };
        let client = RetryingClient::new(paged, QueryPolicy::default());

        // Four pages of 1.5s each would never fit a single 2s timeout
        let rows = client.walk("1.3.6.1.2.1.4.24.4.1.1").await.unwrap();
        let indexes: Vec<&str> = rows.iter().map(|r| r.index.as_str()).collect();
        assert_eq!(indexes, ["0", "1", "2"]);

        // The failed page is asked again from where it stopped, not from the start
        let requests = client.inner().requests.lock().unwrap().clone();
        assert_eq!(
            requests,
            [None, Some("0".to_string()), Some("0".to_string()), Some("1".to_string()), Some("2".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_are_not_retried() {
        let client = RetryingClient::new(flaky(0, false), QueryPolicy::default());
        let err = client.walk("1.3").await.unwrap_err();
        assert!(matches!(err, QueryError::NoSuchObject { .. }));
    }
}
