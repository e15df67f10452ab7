//! HTTP surface: axum router, caller extraction and the response envelope.

pub mod error;
pub mod handlers;
pub mod identity;
pub mod response;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::league::LeagueManager;

#[derive(Clone)]
pub struct AppState {
    pub leagues: Arc<LeagueManager>,
}

/// Build the application router. Used by both `main` and the integration tests.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/slots", post(handlers::create_slot).get(handlers::list_slots))
        .route("/slots/{division}/{slot_id}", patch(handlers::patch_slot))
        .route("/slots/{division}/{slot_id}/cancel", patch(handlers::cancel_slot))
        .route(
            "/slots/{division}/{slot_id}/requests",
            post(handlers::claim_slot).get(handlers::list_claims),
        )
        .route(
            "/slots/{division}/{slot_id}/requests/deny-pending",
            patch(handlers::deny_pending),
        )
        .route(
            "/slots/{division}/{slot_id}/requests/{request_id}/approve",
            patch(handlers::approve_claim),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
