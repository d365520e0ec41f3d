use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{GameShelfError, Result};

type Outcome<T> = std::result::Result<T, Arc<GameShelfError>>;

/// Coalesces concurrent computations for the same key.
///
/// The first caller for a key runs its future (the leader); callers arriving
/// while it is in flight wait for the leader's outcome instead of running
/// their own. Errors reach every waiter as `GameShelfError::Shared`.
pub struct SingleFlight<T> {
    calls: Mutex<HashMap<String, broadcast::Sender<Outcome<T>>>>,
}

/// How a caller took part in a flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightRole {
    Leader,
    Follower,
}

impl<T: Clone + Send + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn calls(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<Outcome<T>>>> {
        // The map holds no invariant a panicking holder could break
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of keys currently in flight
    pub fn in_flight(&self) -> usize {
        self.calls().len()
    }

    /// Run `fut` unless a computation for `key` is already in flight, in which
    /// case wait for that one. If that leader is dropped before finishing, the
    /// waiter retries and may lead with its own `fut`; otherwise `fut` is
    /// dropped unpolled.
    pub async fn run<Fut>(&self, key: &str, fut: Fut) -> Result<(T, FlightRole)>
    where
        Fut: Future<Output = Result<T>>,
    {
        loop {
            let waiter = {
                let mut calls = self.calls();
                match calls.get(key) {
                    Some(tx) => Some(tx.subscribe()),
                    None => {
                        let (tx, _) = broadcast::channel(1);
                        calls.insert(key.to_string(), tx);
                        None
                    }
                }
            };

            let Some(mut rx) = waiter else { break };
            match rx.recv().await {
                Ok(Ok(value)) => return Ok((value, FlightRole::Follower)),
                Ok(Err(shared)) => return Err(GameShelfError::Shared(shared)),
                Err(_) => {
                    debug!("in-flight computation for {} was abandoned, retrying", key);
                }
            }
        }

        let mut guard = FlightGuard {
            flight: self,
            key,
            done: false,
        };
        let outcome = fut.await;
        guard.done = true;

        let tx = self.calls().remove(key);
        let waiting = tx.as_ref().map_or(0, |tx| tx.receiver_count());

        match outcome {
            Ok(value) => {
                if let Some(tx) = tx.filter(|_| waiting > 0) {
                    let _ = tx.send(Ok(value.clone()));
                }
                Ok((value, FlightRole::Leader))
            }
            Err(e) if waiting == 0 => Err(e),
            Err(e) => {
                let shared = Arc::new(e);
                if let Some(tx) = tx {
                    let _ = tx.send(Err(shared.clone()));
                }
                Err(GameShelfError::Shared(shared))
            }
        }
    }
}

impl<T: Clone + Send + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the key if the leader's future is dropped before completing, so
/// waiters observe a closed channel instead of hanging.
struct FlightGuard<'a, T: Clone + Send + 'static> {
    flight: &'a SingleFlight<T>,
    key: &'a str,
    done: bool,
}

impl<T: Clone + Send + 'static> Drop for FlightGuard<'_, T> {
    fn drop(&mut self) {
        if !self.done {
            self.flight.calls().remove(self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_single_caller_is_leader() {
        let flight = SingleFlight::<u32>::new();
        let (value, role) = flight.run("k", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(role, FlightRole::Leader);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_computation() {
        let flight = Arc::new(SingleFlight::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flight = flight.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                flight
                    .run("game:1", async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(42)
                    })
                    .await
            }));
        }

        let mut leaders = 0;
        for handle in handles {
            let (value, role) = handle.await.unwrap().unwrap();
            assert_eq!(value, 42);
            if role == FlightRole::Leader {
                leaders += 1;
            }
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(leaders, 1);
    }

    #[tokio::test]
    async fn test_error_reaches_followers() {
        let flight = Arc::new(SingleFlight::<u32>::new());

        let leader = {
            let flight = flight.clone();
            tokio::spawn(async move {
                flight
                    .run("k", async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(GameShelfError::provider("igdb", "HTTP 500"))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let follower = flight.run("k", async { Ok(1) }).await;
        let err = follower.unwrap_err();
        assert!(matches!(err.root(), GameShelfError::Provider { .. }));
        assert!(leader.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_lone_leader_keeps_original_error() {
        let flight = SingleFlight::<u32>::new();
        let err = flight
            .run("k", async { Err(GameShelfError::NotFound("x".into())) })
            .await
            .unwrap_err();
        assert!(matches!(err, GameShelfError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_abandoned_leader_hands_over_to_follower() {
        let flight = Arc::new(SingleFlight::<u32>::new());

        let leader = {
            let flight = flight.clone();
            tokio::spawn(async move {
                flight
                    .run("k", async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok(1)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let follower = {
            let flight = flight.clone();
            tokio::spawn(async move { flight.run("k", async { Ok(2) }).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        leader.abort();

        let (value, role) = follower.await.unwrap().unwrap();
        assert_eq!(value, 2);
        assert_eq!(role, FlightRole::Leader);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_leader_with_many_followers_runs_once_more() {
        let flight = Arc::new(SingleFlight::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let leader = {
            let flight = flight.clone();
            tokio::spawn(async move {
                flight
                    .run("k", async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok(0)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut followers = Vec::new();
        for _ in 0..4 {
            let flight = flight.clone();
            let calls = calls.clone();
            followers.push(tokio::spawn(async move {
                flight
                    .run("k", async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Ok(5)
                    })
                    .await
            }));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        leader.abort();

        for follower in followers {
            let (value, _) = follower.await.unwrap().unwrap();
            assert_eq!(value, 5);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
