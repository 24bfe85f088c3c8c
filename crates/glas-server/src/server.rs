//! `GatewayServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use glas_core::{EngineFactory, InstructionGrammar, OutputGrammar};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::errors::UpgradeError;
use crate::health::{self, HealthResponse};
use crate::metrics::{
    self as gateway_metrics, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_SESSION_DURATION_SECONDS, WS_SESSION_FAULTS_TOTAL, WS_UPGRADE_REJECTIONS_TOTAL,
};
use crate::session::{SessionConfig, run_session};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::origin::OriginPolicy;
use crate::websocket::stats::SessionStats;
use crate::websocket::transport;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Builds one engine per session.
    pub factory: Arc<dyn EngineFactory>,
    /// Output grammar applied by every session.
    pub grammar: Arc<dyn OutputGrammar>,
    /// Origin filter for upgrade requests.
    pub origins: Arc<OriginPolicy>,
    /// Per-session settings.
    pub session: Arc<SessionConfig>,
    /// Session outcome counters.
    pub stats: Arc<SessionStats>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Prometheus handle for `/metrics`.
    pub metrics: Option<PrometheusHandle>,
    /// When the server started.
    pub start_time: Instant,
    /// Max inbound WebSocket message size.
    pub max_message_size: usize,
}

/// The gateway server.
pub struct GatewayServer {
    config: ServerConfig,
    factory: Arc<dyn EngineFactory>,
    grammar: Arc<dyn OutputGrammar>,
    origins: Arc<OriginPolicy>,
    stats: Arc<SessionStats>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl GatewayServer {
    /// Create a server that builds engines with `factory`.
    ///
    /// The origin policy comes from `config.allowed_origins` and the grammar
    /// defaults to [`InstructionGrammar::default`].
    pub fn new(config: ServerConfig, factory: Arc<dyn EngineFactory>) -> Self {
        let origins = OriginPolicy::from_list(&config.allowed_origins);
        Self {
            config,
            factory,
            grammar: Arc::new(InstructionGrammar::default()),
            origins: Arc::new(origins),
            stats: Arc::new(SessionStats::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics: None,
            start_time: Instant::now(),
        }
    }

    /// Replace the output grammar.
    #[must_use]
    pub fn with_grammar(mut self, grammar: Arc<dyn OutputGrammar>) -> Self {
        self.grammar = grammar;
        self
    }

    /// Replace the origin policy.
    #[must_use]
    pub fn with_origin_policy(mut self, policy: OriginPolicy) -> Self {
        self.origins = Arc::new(policy);
        self
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            factory: self.factory.clone(),
            grammar: self.grammar.clone(),
            origins: self.origins.clone(),
            session: Arc::new(SessionConfig::from(&self.config)),
            stats: self.stats.clone(),
            shutdown: self.shutdown.clone(),
            metrics: self.metrics.clone(),
            start_time: self.start_time,
            max_message_size: self.config.max_message_size,
        };

        let mut router = Router::new()
            .route(&self.config.connect_path(), get(connect_handler))
            .route(&self.config.ready_path(), get(ready_handler))
            .route("/health", get(health_handler));
        if self.metrics.is_some() {
            router = router.route("/metrics", get(metrics_handler));
        }
        router
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        info!(
            addr = %local_addr,
            connect = %self.config.connect_path(),
            grammar = self.grammar.version(),
            "gateway listening"
        );

        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %err, "server error");
            }
        });
        Ok((local_addr, handle))
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the session counters.
    pub fn stats(&self) -> &Arc<SessionStats> {
        &self.stats
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the output grammar.
    pub fn grammar(&self) -> &Arc<dyn OutputGrammar> {
        &self.grammar
    }
}

/// GET {prefix}/connect
async fn connect_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, UpgradeError> {
    let raw_origin = headers.get(header::ORIGIN);
    let origin = raw_origin.and_then(|value| value.to_str().ok());
    if !state.origins.allows_header(raw_origin) {
        warn!(origin, "rejected upgrade from disallowed origin");
        counter!(WS_UPGRADE_REJECTIONS_TOTAL, "reason" => "origin").increment(1);
        return Err(UpgradeError::OriginRejected {
            origin: origin.map(str::to_owned),
        });
    }

    let ws = ws.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "websocket handshake failed");
        counter!(WS_UPGRADE_REJECTIONS_TOTAL, "reason" => "handshake").increment(1);
        UpgradeError::Handshake {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    })?;

    let session_id = Uuid::now_v7();
    let shutdown = state.shutdown.clone();
    Ok(ws
        .max_message_size(state.max_message_size)
        .on_upgrade(move |socket| shutdown.track_session(serve_session(socket, session_id, state)))
        .into_response())
}

/// Drive one upgraded connection and record its outcome.
async fn serve_session(socket: WebSocket, session_id: Uuid, state: AppState) {
    let (sink, source) = transport::split(socket);
    let started = Instant::now();
    state.stats.opened();
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
    info!(%session_id, "session opened");

    let parent = state.shutdown.token();
    let outcome = run_session(
        session_id,
        source,
        sink,
        state.factory.as_ref(),
        state.grammar.clone(),
        &state.session,
        &parent,
    )
    .await;

    match &outcome {
        Ok(()) => info!(%session_id, "session closed"),
        Err(err) => {
            error!(%session_id, error = %err, "session fault");
            counter!(WS_SESSION_FAULTS_TOTAL, "kind" => err.label()).increment(1);
        }
    }
    state.stats.closed(&outcome);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_SESSION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
}

/// GET {prefix}/ready
async fn ready_handler() -> StatusCode {
    StatusCode::OK
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time, &state.stats.snapshot()))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .as_ref()
        .map(gateway_metrics::render)
        .ok_or(StatusCode::NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderValue, Request};
    use glas_core::{Engine, EngineChannels, EngineError};
    use tower::ServiceExt;

    struct NoEngine;

    impl EngineFactory for NoEngine {
        fn construct(&self, _channels: EngineChannels) -> Result<Box<dyn Engine>, EngineError> {
            Err(EngineError::Construct("not used in route tests".into()))
        }
    }

    fn make_server() -> GatewayServer {
        GatewayServer::new(ServerConfig::default(), Arc::new(NoEngine))
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_bytes(resp: Response) -> Vec<u8> {
        axum::body::to_bytes(resp.into_body(), 10_000)
            .await
            .unwrap()
            .to_vec()
    }

    #[test]
    fn server_with_default_config() {
        let server = make_server();
        assert_eq!(server.config().host, "127.0.0.1");
        assert_eq!(server.config().port, 0);
        assert!(!server.shutdown().is_shutting_down());
        assert_eq!(server.stats().snapshot().active, 0);
        assert_eq!(server.grammar().version(), "ansi-instruction/1");
    }

    #[tokio::test]
    async fn ready_returns_empty_ok() {
        let app = make_server().router();
        let resp = app.oneshot(get_request("/api/ready")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_bytes(resp).await.is_empty());
    }

    #[tokio::test]
    async fn ready_follows_route_prefix() {
        let config = ServerConfig {
            route_prefix: "/mud".into(),
            ..ServerConfig::default()
        };
        let app = GatewayServer::new(config, Arc::new(NoEngine)).router();
        let resp = app
            .clone()
            .oneshot(get_request("/mud/ready"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = app.oneshot(get_request("/api/ready")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_endpoint_reports_counters() {
        let server = make_server();
        server.stats().opened();
        let app = server.router();

        let resp = app.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let parsed: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 1);
        assert_eq!(parsed["sessions_completed"], 0);
        assert_eq!(parsed["sessions_faulted"], 0);
        assert!(parsed["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn metrics_route_absent_without_handle() {
        let app = make_server().router();
        let resp = app.oneshot(get_request("/metrics")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_route_renders_with_handle() {
        let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle();
        let app = make_server().with_metrics(handle).router();
        let resp = app.oneshot(get_request("/metrics")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn connect_without_upgrade_is_a_client_error() {
        let app = make_server().router();
        let resp = app.oneshot(get_request("/api/connect")).await.unwrap();
        assert!(resp.status().is_client_error());
        let text = String::from_utf8(body_bytes(resp).await).unwrap();
        assert!(text.starts_with("error upgrading request to websocket"));
    }

    #[tokio::test]
    async fn disallowed_origin_is_forbidden() {
        let app = make_server()
            .with_origin_policy(OriginPolicy::from_list(&["https://play.example".into()]))
            .router();
        let req = Request::builder()
            .uri("/api/connect")
            .header(header::ORIGIN, "https://evil.example")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn non_ascii_origin_is_forbidden_under_allow_list() {
        let app = make_server()
            .with_origin_policy(OriginPolicy::from_list(&["https://play.example".into()]))
            .router();
        let req = Request::builder()
            .uri("/api/connect")
            .header(
                header::ORIGIN,
                HeaderValue::from_bytes(b"https://play.example\xff").unwrap(),
            )
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn allowed_origin_reaches_handshake() {
        let config = ServerConfig {
            allowed_origins: vec!["https://play.example".into()],
            ..ServerConfig::default()
        };
        let app = GatewayServer::new(config, Arc::new(NoEngine)).router();
        let req = Request::builder()
            .uri("/api/connect")
            .header(header::ORIGIN, "https://play.example")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        // Passes the origin check, then fails the handshake.
        assert_ne!(resp.status(), StatusCode::FORBIDDEN);
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = make_server().router();
        let resp = app.oneshot(get_request("/nonexistent")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listen_binds_ephemeral_port_and_stops_on_shutdown() {
        let server = make_server();
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);

        server.shutdown().shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("server did not stop")
            .unwrap();
    }
}
