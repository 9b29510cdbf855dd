//! HTTP listener lifecycle.

use std::io;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Fan-out shutdown notification shared by the server and background tasks.
#[derive(Debug, Clone)]
pub struct Shutdown {
    sender: broadcast::Sender<()>,
}

impl Shutdown {
    /// Creates a new signal with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self { sender }
    }

    /// Returns a receiver that fires once shutdown starts.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Notifies every subscriber.
    pub fn trigger(&self) {
        if let Err(e) = self.sender.send(()) {
            debug!("Shutdown signal not sent (no active receivers): {}", e);
        }
    }

    /// Waits for SIGINT or SIGTERM, then notifies every subscriber.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal handlers cannot be installed.
    pub async fn listen_for_signals(&self) -> io::Result<()> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let mut sigterm = signal(SignalKind::terminate())?;
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    info!("Received SIGINT, initiating graceful shutdown");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                }
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await?;
            info!("Received Ctrl+C, initiating graceful shutdown");
        }

        self.trigger();
        Ok(())
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Serves `router` until `shutdown` fires.
///
/// After the signal, the listener stops accepting and open requests get
/// `grace` to finish before they are dropped.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: &Shutdown,
    grace: Duration,
) -> io::Result<()> {
    let mut stop_accepting = shutdown.subscribe();
    let mut started_draining = shutdown.subscribe();

    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = stop_accepting.recv().await;
            })
            .await
    });

    tokio::select! {
        result = &mut server => return flatten(result),
        _ = started_draining.recv() => {}
    }

    info!(grace = ?grace, "Draining in-flight requests");
    if let Ok(result) = tokio::time::timeout(grace, &mut server).await {
        flatten(result)
    } else {
        warn!(grace = ?grace, "Grace period elapsed, dropping open connections");
        server.abort();
        Ok(())
    }
}

fn flatten(result: Result<io::Result<()>, tokio::task::JoinError>) -> io::Result<()> {
    result.map_err(io::Error::other)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use std::time::Instant;

    async fn spawn_server(
        router: Router,
        shutdown: &Shutdown,
        grace: Duration,
    ) -> (String, tokio::task::JoinHandle<io::Result<()>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = shutdown.clone();
        let handle = tokio::spawn(async move { serve(listener, router, &shutdown, grace).await });
        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn test_idle_server_stops_on_signal() {
        let shutdown = Shutdown::new();
        let router = Router::new().route("/", get(|| async { "ok" }));
        let (base, handle) = spawn_server(router, &shutdown, Duration::from_secs(5)).await;

        let body = reqwest::get(&base).await.unwrap().text().await.unwrap();
        assert_eq!(body, "ok");

        shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap();
        assert!(result.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_stuck_request_is_cut_after_grace() {
        let shutdown = Shutdown::new();
        let router = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "late"
            }),
        );
        let (base, handle) = spawn_server(router, &shutdown, Duration::from_millis(100)).await;

        let request = tokio::spawn(async move { reqwest::get(format!("{base}/slow")).await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = Instant::now();
        shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap();
        assert!(result.unwrap().is_ok());
        assert!(started.elapsed() < Duration::from_secs(5));
        request.abort();
    }
}
