//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling and a hand-written
//! method/path router. Routing is generic over the request body so tests
//! can drive it with in-memory bodies.

use hyper::body::Incoming;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, ORIGIN,
    VARY,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::{require_owner, AuthGate, CookiePolicy, TokenAuthority};
use crate::config::Args;
use crate::db::schemas::RecommendationFilter;
use crate::db::DocumentStore;
use crate::routes::response::no_content;
use crate::routes::{
    auth_routes, error_response, health, path_param, queries, recommendations, reviews, BoxBody,
};
use crate::services::RecommendationManager;
use crate::types::{AppError, Result};

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub store: Arc<dyn DocumentStore>,
    pub gate: AuthGate,
    pub cookie_policy: CookiePolicy,
    pub recommendations: RecommendationManager,
    allowed_origins: Vec<String>,
}

impl AppState {
    pub fn new(args: Args, store: Arc<dyn DocumentStore>, authority: TokenAuthority) -> Self {
        Self {
            cookie_policy: CookiePolicy::for_mode(args.mode),
            allowed_origins: args.allowed_origins(),
            gate: AuthGate::new(authority),
            recommendations: RecommendationManager::new(Arc::clone(&store)),
            store,
            args,
        }
    }
}

/// Start the HTTP server and serve until Ctrl-C or SIGTERM
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listen = state.args.listen_addr();
    let listener = TcpListener::bind(listen).await?;

    info!(
        "altprod listening on {} as node {} ({} mode, {} store)",
        listen,
        state.args.node_id,
        state.args.mode,
        state.store.backend()
    );

    if state.args.protect_user_routes {
        info!("Per-user routes require a matching token cookie");
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);

                        let service = service_fn(move |req: Request<Incoming>| {
                            let state = Arc::clone(&state);
                            async move { Ok::<_, Infallible>(dispatch(state, addr, req).await) }
                        });

                        if let Err(err) = http1::Builder::new()
                            .serve_connection(io, service)
                            .await
                        {
                            error!("Error serving connection from {}: {:?}", addr, err);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {:?}", e);
                }
            },
            _ = &mut shutdown => {
                info!("Shutting down...");
                break;
            }
        }
    }

    state.store.shutdown().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Handle one request: log it, route it, render errors, apply CORS
pub async fn dispatch<B>(state: Arc<AppState>, addr: SocketAddr, req: Request<B>) -> Response<BoxBody>
where
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let origin = allowed_origin(&state.allowed_origins, req.headers());

    info!("[{}] {} {}", addr, method, path);

    let response = if method == Method::OPTIONS {
        no_content()
    } else {
        match route(&state, req, method.clone(), &path).await {
            Ok(response) => response,
            Err(err) => {
                if err.status_code().is_server_error() {
                    error!("[{}] {} {} failed: {}", addr, method, path, err);
                } else {
                    debug!("[{}] {} {} rejected: {}", addr, method, path, err);
                }
                error_response(err)
            }
        }
    };

    with_cors(response, origin)
}

async fn route<B>(
    state: &AppState,
    mut req: Request<B>,
    method: Method,
    path: &str,
) -> Result<Response<BoxBody>>
where
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match (method, path) {
        (Method::GET, "/") => Ok(health::banner()),
        (Method::GET, "/health") => Ok(health::health_check(state)),

        // Token cookie
        (Method::POST, "/jwt") => auth_routes::handle_issue_token(req, state).await,
        (Method::POST, "/logout") => auth_routes::handle_logout(state),

        // Queries
        (Method::GET, "/Queries") => queries::list_queries(state).await,
        (Method::POST, "/Queries") => queries::create_query(req, state).await,
        (Method::GET, p) if p.starts_with("/Queries/user/") => {
            let email = param(p, "/Queries/user/")?;
            admit_owner(state, &mut req, &email)?;
            queries::list_user_queries(state, &email).await
        }
        (Method::GET, p) if p.starts_with("/Queries/") => {
            queries::get_query(state, &param(p, "/Queries/")?).await
        }
        (Method::GET, p) if p.starts_with("/singleQuery/") => {
            queries::get_query(state, &param(p, "/singleQuery/")?).await
        }
        (Method::PUT, p) if p.starts_with("/updatedQuery/") => {
            let id = param(p, "/updatedQuery/")?;
            queries::update_query(req, state, &id).await
        }
        (Method::DELETE, p) if p.starts_with("/delete/") => {
            queries::delete_query(state, &param(p, "/delete/")?).await
        }
        (Method::GET, "/api/recent-queries") | (Method::GET, "/api/recentQueries") => {
            queries::recent_queries(state).await
        }

        // Recommendations
        (Method::POST, "/addRecommendation") => {
            recommendations::add_recommendation(req, state).await
        }
        (Method::GET, "/addRecommendation") => {
            recommendations::list_recommendations(state, RecommendationFilter::All).await
        }
        (Method::GET, p) if p.starts_with("/recommendations/user/") => {
            let email = param(p, "/recommendations/user/")?;
            admit_owner(state, &mut req, &email)?;
            recommendations::list_recommendations(state, RecommendationFilter::Recommender(email))
                .await
        }
        (Method::GET, p) if p.starts_with("/recommendations/") => {
            let query_id = param(p, "/recommendations/")?;
            recommendations::list_recommendations(state, RecommendationFilter::for_query(&query_id))
                .await
        }
        (Method::GET, p) if p.starts_with("/recommendationForMe/") => {
            let email = param(p, "/recommendationForMe/")?;
            admit_owner(state, &mut req, &email)?;
            recommendations::list_recommendations(state, RecommendationFilter::Target(email)).await
        }
        (Method::DELETE, p) if p.starts_with("/recommendation/delete/") => {
            let id = param(p, "/recommendation/delete/")?;
            recommendations::delete_recommendation(state, &id).await
        }

        // Reviews
        (Method::GET, "/reviews") => reviews::list_reviews(state).await,

        (method, p) => Err(AppError::NotFound(format!("No route for {} {}", method, p))),
    }
}

fn param(path: &str, prefix: &str) -> Result<String> {
    path_param(path.strip_prefix(prefix).unwrap_or_default())
}

/// Gate a per-user route when protection is switched on
fn admit_owner<B>(state: &AppState, req: &mut Request<B>, email: &str) -> Result<()> {
    if !state.args.protect_user_routes {
        return Ok(());
    }
    state.gate.admit(req)?;
    require_owner(req, email)
}

fn allowed_origin(allowed: &[String], headers: &HeaderMap) -> Option<HeaderValue> {
    let origin = headers.get(ORIGIN)?;
    let value = origin.to_str().ok()?.trim_end_matches('/');
    allowed
        .iter()
        .any(|o| o == value)
        .then(|| origin.clone())
}

fn with_cors(mut response: Response<BoxBody>, origin: Option<HeaderValue>) -> Response<BoxBody> {
    let headers = response.headers_mut();
    headers.insert(VARY, HeaderValue::from_static("Origin"));

    if let Some(origin) = origin {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
        );
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("Content-Type"));
        headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    }

    response
}
