/*
 * Responsibility
 * - URL 構造を定義 (/health, /drinks, /drinks-detail, /drinks/{id})
 * - route ごとに要求 permission を route_layer で掛ける
 * - 未知の path は 404、未対応の method は 405 (どちらも JSON envelope)
 */
use axum::{
    Router,
    http::StatusCode,
    response::Response,
    routing::{delete, get, patch, post},
};

use crate::{
    api::handlers::{
        drinks::{create_drink, delete_drink, list_drinks, list_drinks_detail, update_drink},
        health::health,
    },
    error::envelope,
    middleware::auth::require_permission,
    state::AppState,
};

async fn not_found() -> Response {
    envelope(StatusCode::NOT_FOUND, "resource not found")
}

async fn method_not_allowed() -> Response {
    envelope(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
}

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route(
            "/drinks",
            require_permission(state, "get:drinks", get(list_drinks))
                .merge(require_permission(state, "post:drinks", post(create_drink))),
        )
        .route(
            "/drinks-detail",
            require_permission(state, "get:drinks-detail", get(list_drinks_detail)),
        )
        .route(
            "/drinks/{id}",
            require_permission(state, "patch:drinks", patch(update_drink))
                .merge(require_permission(state, "delete:drinks", delete(delete_drink))),
        )
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
}
