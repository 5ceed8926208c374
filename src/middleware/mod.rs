/*
 * Responsibility
 * - middleware の公開インターフェース (re-export)
 * - auth::require_permission(...), http::apply(...)
 */
pub mod auth;
pub mod http;
