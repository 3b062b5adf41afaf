//! HTTP server implementation
//!
//! One task per connection, HTTP/1.1 via hyper. Every request is collected
//! under the configured body limit and dispatched by [`crate::routes::route`].

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::JwtValidator;
use crate::config::Args;
use crate::db::Store;
use crate::routes::{self, error_response, ApiRequest};
use crate::types::{Result, WridersError};

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub store: Arc<dyn Store>,
    pub jwt: JwtValidator,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, store: Arc<dyn Store>) -> Result<Self> {
        let jwt = match args.jwt_secret() {
            Some(secret) if args.jwt_secret.is_some() => {
                JwtValidator::new(secret, args.jwt_expiry_seconds)?
            }
            Some(_) => {
                warn!("Using development JWT secret - tokens are not secure");
                JwtValidator::new_dev()
            }
            None => {
                return Err(WridersError::Auth(
                    "JWT_SECRET is required in production mode".into(),
                ))
            }
        };

        Ok(Self {
            args,
            store,
            jwt,
            started_at: Instant::now(),
        })
    }
}

/// Run the HTTP server until the listener fails
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Wriders listening on {} (store: {})",
        state.args.listen,
        state.store.backend()
    );

    if state.args.dev_mode {
        warn!("Development mode enabled");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { Ok::<_, Infallible>(serve(state, addr, req).await) }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        debug!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn serve<B>(state: Arc<AppState>, addr: SocketAddr, req: Request<B>) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = handle_request(state, req).await;

    info!(
        peer = %addr,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}

/// Collect the body and dispatch a single request
pub async fn handle_request<B>(state: Arc<AppState>, req: Request<B>) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match ApiRequest::collect(req, state.args.max_body_bytes).await {
        Ok(req) => routes::route(req, state).await,
        Err(err) => error_response(&err),
    }
}
