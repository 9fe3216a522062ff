//! HTTP exporter for a running capture controller.
//!
//! `/metrics` serves the Prometheus text, `/health` tells whether a camera
//! session is live, `/state` prints where the controller sits.

use crate::machine::State as ControllerState;
use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

/// Failures of the controller exporter.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("cannot listen for controller metrics: {0}")]
    Bind(#[from] std::io::Error),

    /// The exporter stopped serving.
    #[error("controller exporter stopped: {0}")]
    Server(String),
}

/// Where the exporter listens.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Listen address, all interfaces on 9090 by default.
    pub bind_addr: SocketAddr,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self::with_port(9090)
    }
}

impl MetricsServerConfig {
    /// Listens on every interface at `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], port).into(),
        }
    }
}

/// Latest controller snapshot and the registry it feeds.
///
/// The demo loop writes here after every step; the handlers only read.
pub struct MetricsState {
    registry: MetricsRegistry,
    latest: MetricsSnapshot,
}

impl MetricsState {
    /// Feeds a controller snapshot into the registry and keeps it.
    pub fn update(&mut self, snapshot: &MetricsSnapshot) {
        self.registry.update(snapshot);
        self.latest = snapshot.clone();
    }

    /// Whether a camera session is live.
    ///
    /// Returns `"closed"` while the controller sits in Closed and `"live"`
    /// anywhere between opening and shutdown.
    pub fn health(&self) -> &'static str {
        if self.latest.state == ControllerState::Closed {
            "closed"
        } else {
            "live"
        }
    }

    /// One-line summary of the controller position.
    pub fn describe(&self) -> String {
        format!(
            "state={} generation={} stills={} discarded={}",
            self.latest.state,
            self.latest.generation,
            self.latest.stills_delivered,
            self.latest.stills_discarded
        )
    }
}

/// Serves a controller's metrics, liveness and position over HTTP.
pub struct MetricsServer {
    config: MetricsServerConfig,
    state: Arc<RwLock<MetricsState>>,
}

impl MetricsServer {
    /// Wraps `registry`; the controller counts as closed until the first update.
    pub fn new(config: MetricsServerConfig, registry: MetricsRegistry) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(MetricsState {
                registry,
                latest: MetricsSnapshot::default(),
            })),
        }
    }

    /// Handle the controller loop publishes snapshots through.
    pub fn state(&self) -> Arc<RwLock<MetricsState>> {
        Arc::clone(&self.state)
    }

    /// Serves until the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let app = Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .route("/state", get(state_handler))
            .layer(CorsLayer::permissive())
            .with_state(self.state);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        tracing::info!(addr = %self.config.bind_addr, "Controller exporter listening");

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))
    }
}

async fn metrics_handler(State(state): State<Arc<RwLock<MetricsState>>>) -> impl IntoResponse {
    let state = state.read().await;

    match state.registry.encode() {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode controller metrics: {}", e),
        ),
    }
}

// Closed is a legitimate resting state, so both answers are 200.
async fn health_handler(State(state): State<Arc<RwLock<MetricsState>>>) -> impl IntoResponse {
    let state = state.read().await;
    (StatusCode::OK, state.health())
}

async fn state_handler(State(state): State<Arc<RwLock<MetricsState>>>) -> impl IntoResponse {
    let state = state.read().await;
    (StatusCode::OK, state.describe())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_state() -> Arc<RwLock<MetricsState>> {
        MetricsServer::new(MetricsServerConfig::default(), MetricsRegistry::new().unwrap()).state()
    }

    #[test]
    fn test_config_default() {
        let config = MetricsServerConfig::default();
        assert_eq!(config.bind_addr.port(), 9090);
    }

    #[test]
    fn test_config_with_port() {
        let config = MetricsServerConfig::with_port(8080);
        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[test]
    fn test_health_tracks_session_liveness() {
        let shared = shared_state();
        let mut state = shared.try_write().unwrap();
        assert_eq!(state.health(), "closed");

        for live in [ControllerState::InitSurface, ControllerState::Preview, ControllerState::Abort] {
            state.update(&MetricsSnapshot {
                state: live,
                ..Default::default()
            });
            assert_eq!(state.health(), "live", "{}", live);
        }

        state.update(&MetricsSnapshot {
            state: ControllerState::Closed,
            generation: 1,
            ..Default::default()
        });
        assert_eq!(state.health(), "closed");
    }

    #[test]
    fn test_state_description_follows_updates() {
        let shared = shared_state();
        let mut state = shared.try_write().unwrap();
        state.update(&MetricsSnapshot {
            state: ControllerState::Preview,
            generation: 2,
            stills_delivered: 1,
            stills_discarded: 1,
            ..Default::default()
        });

        assert_eq!(state.describe(), "state=Preview generation=2 stills=1 discarded=1");
        assert!(state.registry.encode().unwrap().contains("capture_fsm_generation 2"));
    }
}
