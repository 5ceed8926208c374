/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - db: SqlitePool, auth: AuthGuard (内部に key-set cache を持つ)
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::services::auth::AuthGuard;

#[derive(Clone, Debug)]
pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub auth: Arc<AuthGuard>,
}

impl AppState {
    pub fn new(db: sqlx::SqlitePool, auth: Arc<AuthGuard>) -> Self {
        Self { db, auth }
    }
}
