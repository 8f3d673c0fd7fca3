//! HTTP listener binding and serving.
//!
//! Binding is split from serving so that a bind failure surfaces during
//! startup, before the service is considered running.

use std::net::TcpListener;

use axum::Router;
use axum_server::Handle;
use tokio::task::JoinHandle;

/// Server startup error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind server to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Server(String),
}

/// Bind the listening socket. The returned listener is non-blocking.
pub async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
    let bind_error = |source| ServerError::Bind {
        addr: addr.to_string(),
        source,
    };
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(bind_error)?;
    listener.into_std().map_err(bind_error)
}

/// Serve `app` on an already-bound listener in a background task.
///
/// Shutdown is driven through `handle`.
pub fn spawn_server(
    listener: TcpListener,
    app: Router,
    handle: Handle,
) -> JoinHandle<Result<(), ServerError>> {
    tokio::spawn(async move {
        axum_server::from_tcp(listener)
            .handle(handle)
            .serve(app.into_make_service())
            .await
            .map_err(|e| ServerError::Server(e.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let listener = bind("127.0.0.1:0").await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_port_in_use_is_bind_error() {
        let first = bind("127.0.0.1:0").await.unwrap();
        let addr = first.local_addr().unwrap().to_string();
        let err = bind(&addr).await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
        assert!(err.to_string().contains(&addr));
    }

    #[tokio::test]
    async fn test_bind_invalid_address_is_bind_error() {
        let err = bind("not-an-address").await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
    }
}
