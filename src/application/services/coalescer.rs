//! Collapses concurrent identical requests into a single execution.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::domain::{ProxyError, ProxyResult};

type Slot<T> = watch::Receiver<Option<ProxyResult<T>>>;

/// Runs at most one execution per key at a time.
///
/// The first caller for a key spawns the work on its own task; later callers
/// subscribe to the same slot. The work is detached from every caller, so a
/// client going away never cancels a fetch other waiters depend on. Results
/// are not retained once the execution finishes.
pub struct RequestCoalescer<T> {
    in_flight: Arc<Mutex<HashMap<String, Slot<T>>>>,
}

/// Role of a caller for a given key.
enum Role<T> {
    Leader(watch::Sender<Option<ProxyResult<T>>>, Slot<T>),
    Follower(Slot<T>),
}

/// Removes the key when the spawned work ends, however it ends.
struct InFlightGuard<T> {
    key: String,
    in_flight: Arc<Mutex<HashMap<String, Slot<T>>>>,
}

impl<T> Drop for InFlightGuard<T> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.key);
        trace!(key = %self.key, "Released in-flight slot");
    }
}

impl<T> RequestCoalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates an empty coalescer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Executes `work` for `key`, or joins an execution already in flight.
    ///
    /// `work` is only invoked by the caller that starts the execution.
    ///
    /// # Errors
    ///
    /// Returns the error produced by the shared execution, or
    /// [`ProxyError::Internal`] if the execution panicked.
    pub async fn execute<F, Fut>(&self, key: &str, work: F) -> ProxyResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ProxyResult<T>> + Send + 'static,
    {
        let mut rx = match self.register(key) {
            Role::Leader(tx, rx) => {
                debug!(key = %key, "Starting execution");
                let guard = InFlightGuard {
                    key: key.to_string(),
                    in_flight: Arc::clone(&self.in_flight),
                };
                let fut = work();
                tokio::spawn(async move {
                    let _guard = guard;
                    let result = fut.await;
                    let _ = tx.send(Some(result));
                });
                rx
            }
            Role::Follower(rx) => {
                debug!(key = %key, "Joining in-flight execution");
                rx
            }
        };

        let outcome = rx.wait_for(Option::is_some).await;
        match outcome {
            Ok(value) => value
                .as_ref()
                .cloned()
                .unwrap_or_else(|| Err(ProxyError::internal("empty coalesced result"))),
            Err(_) => Err(ProxyError::internal(format!(
                "execution for {key} ended without a result"
            ))),
        }
    }

    fn register(&self, key: &str) -> Role<T> {
        let mut in_flight = self.in_flight.lock();
        if let Some(rx) = in_flight.get(key) {
            return Role::Follower(rx.clone());
        }
        let (tx, rx) = watch::channel(None);
        in_flight.insert(key.to_string(), rx.clone());
        Role::Leader(tx, rx)
    }

    /// Number of keys currently executing.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }
}

impl<T> Default for RequestCoalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
