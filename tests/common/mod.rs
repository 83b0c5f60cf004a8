#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use chatrelay::gateway::channels::ChannelTable;
use chatrelay::gateway::hub::Hub;
use chatrelay::registry::SessionRegistry;
use chatrelay::routes;
use chatrelay::shutdown::ShutdownCoordinator;
use chatrelay::state::AppState;
use http::{Method, Request};
use tokio::task::JoinHandle;
use tower::ServiceExt;

/// Test server that owns a full AppState plus its spawned dispatch loop.
/// Each instance is isolated, safe for parallel tests.
pub struct TestServer {
    pub state: AppState,
    pub coordinator: ShutdownCoordinator,
    dispatch: Option<JoinHandle<()>>,
}

impl TestServer {
    pub fn new() -> Self {
        Self::with_capacities(100, 20)
    }

    /// Build a server with explicit intake/outbox queue capacities.
    pub fn with_capacities(intake_capacity: usize, outbox_capacity: usize) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let channels = Arc::new(ChannelTable::new());
        let (hub, intake_rx) = Hub::new(Arc::clone(&channels), intake_capacity);
        let hub = Arc::new(hub);
        let dispatch = tokio::spawn(Arc::clone(&hub).run(intake_rx));
        let coordinator = ShutdownCoordinator::new();

        let state = AppState {
            registry,
            channels,
            hub,
            shutdown: coordinator.token(),
            outbox_capacity,
        };

        Self {
            state,
            coordinator,
            dispatch: Some(dispatch),
        }
    }

    /// Returns an axum Router wired to this server's state for `oneshot()`.
    pub fn router(&self) -> axum::Router {
        routes::router(self.state.clone())
    }

    /// Binds a TCP listener on port 0, spawns the server, and returns the
    /// `host:port` address.
    pub async fn spawn(&self) -> String {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = self.state.shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
                .unwrap();
        });
        format!("127.0.0.1:{}", addr.port())
    }

    /// Log a user in over the HTTP surface, returning the session token.
    pub async fn login(&self, username: &str) -> String {
        let response = self
            .router()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/auth/login",
                &serde_json::json!({ "username": username }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);
        let body = parse_body(response).await;
        body["data"]["token"].as_str().unwrap().to_string()
    }

    /// Log a token out over the HTTP surface.
    pub async fn logout(&self, token: &str) -> serde_json::Value {
        let response = self
            .router()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/auth/logout",
                &serde_json::json!({ "token": token }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);
        parse_body(response).await
    }

    /// Poll until `n` streams are attached. Registration happens in the
    /// upgrade task, so a client's handshake completing does not mean its
    /// outbox is registered yet.
    pub async fn wait_for_streams(&self, n: usize) {
        for _ in 0..200 {
            if self.state.channels.len().await == n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "timed out waiting for {n} attached streams, have {}",
            self.state.channels.len().await
        );
    }

    /// Drive the full shutdown sequence, exactly as the signal watcher would.
    pub async fn shutdown(&mut self) {
        let dispatch = self.dispatch.take().expect("shutdown already driven");
        self.coordinator.begin(&self.state.hub, dispatch).await;
    }
}

/// Build a request with a JSON body.
pub fn json_request(method: Method, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Build a request with no body.
pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Parse a response body into a `serde_json::Value`.
pub async fn parse_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
