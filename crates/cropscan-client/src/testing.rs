//! Test utilities for cropscan-client
//!
//! Runs an axum router standing in for the analysis server.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::{AnalyzeClient, ClientConfig, Result};

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: AnalyzeClient,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Create a new test server from an axum Router
    ///
    /// # Example
    ///
    /// ```ignore
    /// use axum::{routing::post, Json, Router};
    /// use cropscan_client::testing::TestServer;
    ///
    /// let router = Router::new().route("/analyze", post(|| async {
    ///     Json(serde_json::json!({ "health_status": "OK", "images": {} }))
    /// }));
    /// let server = TestServer::start(router).await?;
    /// let result = server.client.analyze(&FormSubmission::new()).await?;
    /// ```
    pub async fn start<S>(router: axum::Router<S>) -> Result<Self>
    where
        S: Clone + Send + Sync + 'static,
        axum::Router<S>: Into<axum::Router>,
    {
        Self::start_with(router, ClientConfig::new).await
    }

    /// Create a new test server, building the client config from its base URL
    pub async fn start_with<S, F>(router: axum::Router<S>, config: F) -> Result<Self>
    where
        S: Clone + Send + Sync + 'static,
        axum::Router<S>: Into<axum::Router>,
        F: FnOnce(String) -> ClientConfig,
    {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let router: axum::Router = router.into();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        let client = AnalyzeClient::with_config(config(format!("http://{}", addr)))?;

        Ok(Self {
            addr,
            client,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get a reference to the client
    pub fn client(&self) -> &AnalyzeClient {
        &self.client
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// A base URL nothing is listening on
///
/// Binds an ephemeral port and releases it again, so connecting fails with
/// connection refused.
pub async fn unreachable_base_url() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{}", addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_base_url_refuses() {
        let base_url = unreachable_base_url().await.unwrap();
        assert!(base_url.starts_with("http://127.0.0.1:"));
        let addr = base_url.trim_start_matches("http://");
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_server_serves_until_shutdown() {
        use axum::{routing::post, Json, Router};

        let router = Router::new().route(
            "/analyze",
            post(|| async { Json(serde_json::json!({ "health_status": "OK", "images": {} })) }),
        );
        let server = TestServer::start(router).await.unwrap();
        let base_url = server.base_url();
        assert_eq!(server.client().base_url().as_str(), format!("{}/", base_url));

        let result = server
            .client()
            .analyze(&crate::FormSubmission::new())
            .await
            .unwrap();
        assert_eq!(result.health_status, "OK");

        server.shutdown().await;
        let client = AnalyzeClient::new(&base_url).unwrap();
        assert!(client.analyze(&crate::FormSubmission::new()).await.is_err());
    }
}
