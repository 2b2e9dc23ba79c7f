use crate::error::HeartbeatError;
use axum::{Json, Router, http::StatusCode, response::IntoResponse};
use serde_json::json;
use std::net::SocketAddr;
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{debug, info, warn};

/// Liveness responder for whoever launched this unit. Every path answers
/// `200 {}`; being reachable is the whole signal.
pub struct HeartbeatServer {
    port: u16,
}

/// Detached listener task. Dropping the handle does not stop it; it lives
/// until the process exits.
#[derive(Debug)]
pub struct HeartbeatHandle {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl HeartbeatServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub fn router() -> Router {
        Router::new().fallback(alive)
    }

    pub async fn start_background(self) -> Result<HeartbeatHandle, HeartbeatError> {
        let listener = TcpListener::bind(("0.0.0.0", self.port))
            .await
            .map_err(|source| HeartbeatError::Bind {
                port: self.port,
                source,
            })?;
        let local_addr = listener.local_addr().map_err(HeartbeatError::LocalAddr)?;

        info!(%local_addr, "Heartbeat server listening");
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, Self::router()).await {
                warn!(error = %e, "Heartbeat server stopped");
            }
        });

        Ok(HeartbeatHandle { local_addr, task })
    }
}

async fn alive() -> impl IntoResponse {
    debug!("Heartbeat");
    (StatusCode::OK, Json(json!({})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_any_path() {
        let handle = HeartbeatServer::new(0).start_background().await.unwrap();
        let port = handle.local_addr().port();

        for path in ["", "/", "/healthz"] {
            let response = reqwest::get(format!("http://127.0.0.1:{port}{path}"))
                .await
                .unwrap();
            assert_eq!(response.status(), reqwest::StatusCode::OK);
            assert_eq!(response.text().await.unwrap(), "{}");
        }

        assert!(handle.is_running());
    }

    #[tokio::test]
    async fn port_in_use_is_an_error() {
        let taken = TcpListener::bind("0.0.0.0:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = HeartbeatServer::new(port).start_background().await.err().unwrap();
        assert!(matches!(err, HeartbeatError::Bind { port: p, .. } if p == port));
    }
}
