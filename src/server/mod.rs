//! Forward-auth HTTP server
//!
//! A small hyper server that answers one question for an upstream proxy:
//! is this request authenticated? Each request is run through the configured
//! providers in order and the first authenticated identity wins.
//!
//! # Endpoints
//!
//! * `GET /health` - Health check (returns "ok")
//! * anything else - 200 with identity headers, or 401
//!
//! # Example
//!
//! ```no_run
//! use jwt_auth_provider::config::Config;
//! use jwt_auth_provider::host::ModuleRegistry;
//! use jwt_auth_provider::server::AuthServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load("config.yaml")?;
//! let server = AuthServer::new(&config, &ModuleRegistry::with_builtin()).await?;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

use crate::auth::AuthError;
use crate::config::Config;
use crate::correlation::{resolve_request_id, REQUEST_ID_HEADER};
use crate::host::{AuthenticationProvider, Authenticator, ModuleRegistry, ProvisionContext};
use crate::identity::UserIdentity;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE, WWW_AUTHENTICATE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn, Instrument};

/// Response header carrying the identity's ID
pub const USER_ID_HEADER: &str = "x-auth-user-id";

/// Prefix for one response header per metadata entry
pub const USER_METADATA_HEADER_PREFIX: &str = "x-auth-user-";

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    #[error("Server error: {0}")]
    RuntimeError(String),

    #[error("Failed to load provider '{module}': {source}")]
    Provider {
        module: String,
        #[source]
        source: AuthError,
    },
}

/// A provider loaded from configuration
#[derive(Clone)]
pub struct LoadedProvider {
    pub module_id: String,
    pub provider: Arc<dyn AuthenticationProvider>,
}

impl std::fmt::Debug for LoadedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedProvider")
            .field("module_id", &self.module_id)
            .finish()
    }
}

/// Load every configured provider through the registry
pub fn load_providers(
    config: &Config,
    registry: &ModuleRegistry,
) -> Result<Vec<LoadedProvider>, ServerError> {
    let ctx = ProvisionContext::new();
    config
        .authentication
        .modules()
        .map(|(module_id, raw)| -> Result<LoadedProvider, ServerError> {
            let provider = registry.load(&module_id, raw.clone(), &ctx).map_err(|source| {
                ServerError::Provider {
                    module: module_id.clone(),
                    source,
                }
            })?;
            Ok(LoadedProvider {
                module_id,
                provider,
            })
        })
        .collect()
}

/// Forward-auth server
pub struct AuthServer {
    providers: Arc<[LoadedProvider]>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl AuthServer {
    /// Load providers and bind to the configured address
    ///
    /// Port 0 lets the OS pick a free port; see [`AuthServer::local_addr`].
    pub async fn new(config: &Config, registry: &ModuleRegistry) -> Result<Self, ServerError> {
        let addr = config
            .server
            .socket_addr()
            .map_err(|e| ServerError::BindError(e.to_string()))?;

        let providers: Arc<[LoadedProvider]> = load_providers(config, registry)?.into();

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!(
            "Server bound to {} with {} provider(s)",
            local_addr,
            providers.len()
        );

        Ok(Self {
            providers,
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until the task is cancelled
    ///
    /// Each connection is served on its own task; connection errors are
    /// logged and do not stop the server.
    pub async fn run(self) -> Result<(), ServerError> {
        info!("Starting auth server on {}", self.local_addr);

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let providers = Arc::clone(&self.providers);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let service = service_fn(move |req| {
                    let providers = Arc::clone(&providers);
                    async move { Ok::<_, Infallible>(handle_request(req, providers).await) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {}: {}", peer_addr, e);
                }
            });
        }
    }

    /// Serve until Ctrl-C is received
    pub async fn run_until_shutdown(self) -> Result<(), ServerError> {
        tokio::select! {
            result = self.run() => result,
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(|e| ServerError::RuntimeError(e.to_string()))?;
                info!("Shutting down server");
                Ok(())
            }
        }
    }
}

/// Authenticate one request against the providers
pub async fn handle_request<B>(
    req: Request<B>,
    providers: Arc<[LoadedProvider]>,
) -> Response<String> {
    let (mut parts, _) = req.into_parts();
    let request_id = resolve_request_id(&mut parts);

    if parts.uri.path() == "/health" && parts.method == Method::GET {
        return text_response(StatusCode::OK, &request_id, "ok");
    }

    let span = tracing::info_span!(
        "http.request",
        http.method = %parts.method,
        http.target = %parts.uri.path(),
        request_id = %request_id,
        otel.kind = "server",
    );

    async move {
        let mut failure: Option<AuthError> = None;

        for loaded in providers.iter() {
            match loaded.provider.authenticate(&mut parts).await {
                Ok(auth) if auth.authenticated => {
                    info!(
                        module.id = %loaded.module_id,
                        user.id = %auth.user.id,
                        "Request authenticated"
                    );
                    return identity_response(&request_id, &auth.user);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(module.id = %loaded.module_id, error = %e, "Authentication failed");
                    failure = Some(e);
                }
            }
        }

        info!("Request not authenticated");
        unauthorized_response(&request_id, failure.as_ref())
    }
    .instrument(span)
    .await
}

/// Header name for a metadata key, `claim_id` becoming `x-auth-user-claim-id`
fn metadata_header_name(key: &str) -> Option<HeaderName> {
    let name = format!(
        "{}{}",
        USER_METADATA_HEADER_PREFIX,
        key.to_lowercase().replace('_', "-")
    );
    HeaderName::from_bytes(name.as_bytes()).ok()
}

/// Echo the request ID byte for byte, so non-ASCII IDs round-trip
fn with_request_id(
    builder: hyper::http::response::Builder,
    request_id: &str,
) -> hyper::http::response::Builder {
    match HeaderValue::from_bytes(request_id.as_bytes()) {
        Ok(value) => builder.header(REQUEST_ID_HEADER, value),
        Err(_) => builder,
    }
}

fn text_response(status: StatusCode, request_id: &str, body: &str) -> Response<String> {
    with_request_id(Response::builder().status(status), request_id)
        .header(CONTENT_TYPE, "text/plain")
        .body(body.to_string())
        .expect("Failed to build text response")
}

fn identity_response(request_id: &str, user: &UserIdentity) -> Response<String> {
    let mut builder = with_request_id(Response::builder().status(StatusCode::OK), request_id)
        .header(CONTENT_TYPE, "text/plain");

    if let Ok(value) = HeaderValue::from_str(&user.id) {
        builder = builder.header(USER_ID_HEADER, value);
    }

    for (key, value) in &user.metadata {
        match (metadata_header_name(key), HeaderValue::from_str(value)) {
            (Some(name), Ok(value)) => builder = builder.header(name, value),
            _ => warn!(metadata.key = %key, "Skipping metadata not representable as a header"),
        }
    }

    builder
        .body("ok".to_string())
        .expect("Failed to build identity response")
}

fn unauthorized_response(request_id: &str, failure: Option<&AuthError>) -> Response<String> {
    let challenge = match failure {
        Some(e) if e.is_token_error() => "Bearer error=\"invalid_token\"",
        _ => "Bearer",
    };

    with_request_id(Response::builder().status(StatusCode::UNAUTHORIZED), request_id)
    .header(CONTENT_TYPE, "text/plain")
    .header(WWW_AUTHENTICATE, challenge)
    .body("Unauthorized".to_string())
    .expect("Failed to build 401 response")
}
