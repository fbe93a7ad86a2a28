mod types;

pub use types::{
    AddDomainRequest, ApiError, CheckResponse, DomainsResponse, ErrorKind, ThemeBody,
};

use crate::engine::{validate, BlocklistStore, Theme, ThemeError, ThemeStore};
use anyhow::{Context, Result};
use axum::{
    extract::{Json as AxumJson, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

pub struct ApiState {
    pub blocklist: Arc<BlocklistStore>,
    pub theme: Arc<ThemeStore>,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/domains", get(list_domains).post(add_domain))
        .route("/api/domains/{domain}", delete(remove_domain))
        .route("/api/reload", post(reload_domains))
        .route("/api/check/{host}", get(check_host))
        .route("/api/theme", get(get_theme).put(set_theme))
        .route("/api/theme/toggle", post(toggle_theme))
        .with_state(state)
}

pub async fn start_api_server(state: Arc<ApiState>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API server on {}", addr))?;
    info!("API Server listening on http://{}", addr);

    axum::serve(listener, router(state))
        .await
        .context("API server stopped unexpectedly")
}

async fn list_domains(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(DomainsResponse::ok(&state.blocklist.list()))
}

async fn add_domain(
    State(state): State<Arc<ApiState>>,
    AxumJson(payload): AxumJson<AddDomainRequest>,
) -> impl IntoResponse {
    match state.blocklist.add(&payload.domain).await {
        Ok(domains) => (StatusCode::OK, Json(DomainsResponse::ok(&domains))),
        Err(e) => {
            let body = DomainsResponse::failed(&state.blocklist.list(), &e);
            (ApiError::from(&e).status(), Json(body))
        }
    }
}

async fn remove_domain(
    State(state): State<Arc<ApiState>>,
    Path(raw): Path<String>,
) -> impl IntoResponse {
    // Anything that does not validate cannot be in the list
    let domain = match validate(&raw) {
        Ok(domain) => domain,
        Err(_) => {
            debug!("Remove of non-domain '{}' ignored", raw);
            return (
                StatusCode::OK,
                Json(DomainsResponse::ok(&state.blocklist.list())),
            );
        }
    };

    match state.blocklist.remove(&domain).await {
        Ok(domains) => (StatusCode::OK, Json(DomainsResponse::ok(&domains))),
        Err(e) => {
            let body = DomainsResponse::failed(&state.blocklist.list(), &e);
            (ApiError::from(&e).status(), Json(body))
        }
    }
}

async fn reload_domains(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    match state.blocklist.load().await {
        Ok(domains) => (StatusCode::OK, Json(DomainsResponse::ok(&domains))),
        Err(e) => {
            let body = DomainsResponse::failed(&state.blocklist.list(), &e);
            (ApiError::from(&e).status(), Json(body))
        }
    }
}

async fn check_host(
    State(state): State<Arc<ApiState>>,
    Path(host): Path<String>,
) -> impl IntoResponse {
    let matcher = state.blocklist.matcher();
    let matched = matcher.check(&host).map(str::to_string);
    Json(CheckResponse {
        host,
        blocked: matched.is_some(),
        matched,
    })
}

async fn get_theme(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(ThemeBody {
        theme: state.theme.current(),
        error: None,
    })
}

async fn set_theme(
    State(state): State<Arc<ApiState>>,
    AxumJson(payload): AxumJson<ThemeBody>,
) -> impl IntoResponse {
    theme_response(&state, state.theme.set(payload.theme).await)
}

async fn toggle_theme(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    theme_response(&state, state.theme.toggle().await)
}

fn theme_response(
    state: &ApiState,
    result: Result<Theme, ThemeError>,
) -> (StatusCode, Json<ThemeBody>) {
    match result {
        Ok(theme) => (StatusCode::OK, Json(ThemeBody { theme, error: None })),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ThemeBody {
                theme: state.theme.current(),
                error: Some(e.to_string()),
            }),
        ),
    }
}
