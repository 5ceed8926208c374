//! route ごとの permission 要求 → AuthGuard 実行 → Claims を extensions に入れる
//!
//! - handler (business logic) は Guard が `Authorized` に到達した時だけ呼ばれる
//! - route_layer なので body の extract より前に実行される
//! - 失敗時は AuthError → AppError で JSON envelope を返す

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Clone)]
struct Requirement {
    state: AppState,
    permission: &'static str,
}

/// `route` に `permission` の要求を掛ける。
///
/// 例：
/// ```ignore
/// .route(
///     "/drinks",
///     require_permission(&state, "get:drinks", get(list_drinks))
///         .merge(require_permission(&state, "post:drinks", post(create_drink))),
/// )
/// ```
pub fn require_permission(
    state: &AppState,
    permission: &'static str,
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    let requirement = Requirement {
        state: state.clone(),
        permission,
    };
    route.route_layer(middleware::from_fn_with_state(requirement, permission_middleware))
}

async fn permission_middleware(
    State(requirement): State<Requirement>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    // Non-UTF8 values become "" and are rejected as malformed, not missing.
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .map(|v| v.to_str().unwrap_or_default().to_owned());

    let response = requirement
        .state
        .auth
        .guard(
            authorization.as_deref(),
            requirement.permission,
            |claims| async move {
                // middleware → extractor への受け渡し
                req.extensions_mut().insert(claims);
                next.run(req).await
            },
        )
        .await?;

    Ok(response)
}
