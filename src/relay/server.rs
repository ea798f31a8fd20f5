//! Relay server implementation

use crate::config::settings::{CorsConfig, RelayConfig};
use crate::error::{Error, Result};
use crate::models::{OutcomeClass, RelayLog, RequestData, ResponseData};
use crate::relay::forwarder::ChatForwarder;
use crate::relay::payload::{read_body, BodyError, InboundPayload};
use crate::relay::transport::ReqwestTransport;
use crate::utils::{
    build_error_response, content_length, elapsed_ms, header_str, json_response,
    log_incoming_request, log_relay_completion,
};
use crate::{log_debug, log_error, log_info};
use hyper::body::HttpBody;
use hyper::header::{HeaderValue, ALLOW};
use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tracing::{info, warn};

/// Chat-completion relay route
pub const CHAT_PATH: &str = "/api/chat";

/// Local health route
pub const HEALTH_PATH: &str = "/health";

/// Shared, read-only state handed to every request
struct RelayState {
    forwarder: ChatForwarder,
    max_body_size: usize,
    started_at: Instant,
}

/// A handled request, with what the transaction log needs to know about it
struct Handled {
    response: Response<Body>,
    outcome: OutcomeClass,
    error: Option<String>,
}

impl Handled {
    fn local(response: Response<Body>) -> Self {
        Self {
            response,
            outcome: OutcomeClass::Local,
            error: None,
        }
    }

    fn rejected(response: Response<Body>, error: String) -> Self {
        Self {
            response,
            outcome: OutcomeClass::Rejected,
            error: Some(error),
        }
    }
}

pub struct RelayServer {
    config: RelayConfig,
    forwarder: ChatForwarder,
}

impl RelayServer {
    /// Create a relay server that forwards through a reqwest client built from `config`
    pub fn with_config(config: RelayConfig) -> Result<Self> {
        let transport = ReqwestTransport::from_config(&config)?;
        let forwarder = ChatForwarder::new(Arc::new(transport))
            .with_redacted_details(config.redact_transport_details);
        Ok(Self { config, forwarder })
    }

    /// Create a relay server around an existing forwarder
    pub fn with_forwarder(config: RelayConfig, forwarder: ChatForwarder) -> Self {
        Self { config, forwarder }
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.config.listen_addr
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn start(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.listen_addr)?;
        log_info!("Relay server listening on http://{}", self.config.listen_addr);
        self.run(listener, shutdown_signal()).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cors = cors_layer(&self.config.cors)?;
        let state = Arc::new(RelayState {
            forwarder: self.forwarder,
            max_body_size: self.config.max_body_size,
            started_at: Instant::now(),
        });

        info!("📋 Relay routes: POST {}, GET {}", CHAT_PATH, HEALTH_PATH);
        info!(
            "🌐 CORS: origins {:?}, methods {:?}",
            self.config.cors.allowed_origins, self.config.cors.allowed_methods
        );
        if state.forwarder.redacts_details() {
            info!("🔒 Transport failure details are redacted in responses");
        }

        let make_svc = make_service_fn(move |conn: &AddrStream| {
            let remote_addr = conn.remote_addr();
            let state = Arc::clone(&state);
            let cors = cors.clone();
            log_debug!("New connection from: {}", remote_addr);

            async move {
                let service = ServiceBuilder::new().layer(cors).service(service_fn(move |req| {
                    let state = Arc::clone(&state);
                    async move { handle_request(req, remote_addr, state).await }
                }));
                Ok::<_, Infallible>(service)
            }
        });

        let server = Server::from_tcp(listener)?
            .serve(make_svc)
            .with_graceful_shutdown(shutdown);

        log_info!("Server bound successfully, waiting for connections");

        if let Err(e) = server.await {
            log_error!("Server error: {}", e);
            return Err(Error::Http(e));
        }

        log_info!("Relay server stopped");
        Ok(())
    }
}

/// Build the cross-origin policy applied to every response
pub fn cors_layer(config: &CorsConfig) -> Result<CorsLayer> {
    let origins = if config.allowed_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        let values = config
            .allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .map_err(|e| Error::Config(format!("Invalid CORS origin '{}': {}", origin, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(values)
    };

    let methods = config
        .allowed_methods
        .iter()
        .map(|method| {
            Method::from_bytes(method.as_bytes())
                .map_err(|e| Error::Config(format!("Invalid CORS method '{}': {}", method, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(AllowHeaders::mirror_request()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown signal received, draining connections");
}

/// Handle one inbound request. Every failure becomes a response.
async fn handle_request(
    req: Request<Body>,
    remote_addr: SocketAddr,
    state: Arc<RelayState>,
) -> std::result::Result<Response<Body>, Infallible> {
    let start_time = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    log_incoming_request(method.as_str(), &path, &remote_addr);

    let mut request_data = RequestData::new(method.to_string(), path.clone(), remote_addr);
    request_data.content_type = header_str(req.headers(), "content-type");
    request_data.content_length = content_length(req.headers()).unwrap_or(0);
    request_data.origin = header_str(req.headers(), "origin");
    request_data.user_agent = header_str(req.headers(), "user-agent");

    let handled = match (&method, path.as_str()) {
        (&Method::POST, CHAT_PATH) => handle_chat(req, &state).await,
        (_, HEALTH_PATH) => handle_health(&method, &state),
        _ => Handled::local(not_found(&path)),
    };

    let response_data = ResponseData {
        status_code: handled.response.status().as_u16(),
        response_time_ms: elapsed_ms(start_time),
        body_size: handled.response.body().size_hint().exact().unwrap_or(0),
    };
    log_relay_completion(&RelayLog {
        request: request_data,
        response: response_data,
        outcome: handled.outcome,
        error: handled.error,
    });

    Ok(handled.response)
}

async fn handle_chat(req: Request<Body>, state: &RelayState) -> Handled {
    let declared_length = content_length(req.headers());

    let bytes = match read_body(req.into_body(), declared_length, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e @ BodyError::TooLarge { .. }) => {
            return Handled::rejected(
                build_error_response(StatusCode::PAYLOAD_TOO_LARGE, &e.to_string()),
                e.to_string(),
            );
        }
        Err(e @ BodyError::Read(_)) => {
            return Handled::rejected(
                build_error_response(StatusCode::BAD_REQUEST, &e.to_string()),
                e.to_string(),
            );
        }
    };

    let outcome = state.forwarder.forward(InboundPayload::from_bytes(bytes)).await;
    let class = outcome.class();
    let error = outcome.error_description();

    Handled {
        response: outcome.into_response(state.forwarder.redacts_details()),
        outcome: class,
        error,
    }
}

/// Handle health check endpoint locally
fn handle_health(method: &Method, state: &RelayState) -> Handled {
    if *method != Method::GET {
        let mut response =
            build_error_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("GET"));
        return Handled::local(response);
    }

    let health_data = json!({
        "status": "healthy",
        "service": "chat-relay",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_ms": elapsed_ms(state.started_at),
        "version": env!("CARGO_PKG_VERSION"),
        "pid": std::process::id(),
    });

    Handled::local(json_response(StatusCode::OK, &health_data))
}

fn not_found(path: &str) -> Response<Body> {
    json_response(
        StatusCode::NOT_FOUND,
        &json!({ "error": "Not found", "path": path }),
    )
}
