use crate::api;
use crate::config::AppConfig;
use crate::session::SessionRegistry;
use axum::Router;
use axum::routing::{get, post, put};
use http::{HeaderName, HeaderValue};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(config: AppConfig, sessions: SessionRegistry) -> Self {
        Self {
            config: Arc::new(config),
            sessions,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let sessions = Router::new()
        .route("/", post(api::create_session))
        .route("/{id}", get(api::get_session).delete(api::delete_session))
        .route("/{id}/problem", put(api::set_problem))
        .route("/{id}/step", put(api::set_step))
        .route("/{id}/display-mode", put(api::set_display_mode))
        .route("/{id}/config", axum::routing::patch(api::patch_config))
        .route("/{id}/questions/next", post(api::next_questions))
        .route("/{id}/answers", post(api::save_answer))
        .route(
            "/{id}/answers/{question_id}",
            axum::routing::delete(api::remove_answer),
        )
        .route("/{id}/feedback", post(api::save_feedback))
        .route("/{id}/reset", post(api::reset));

    let mut app = Router::new()
        .route("/widget.js", get(api::serve_loader))
        .route("/widget", get(api::serve_widget_page))
        .route("/healthz", get(api::healthz))
        .nest("/api/widget/sessions", sessions)
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(TraceLayer::new_for_http());

    if state.config.enable_cors {
        app = app.layer(CorsLayer::permissive());
    }
    app.with_state(state)
}

pub async fn run(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(?err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
