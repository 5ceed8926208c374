/*
 * Responsibility
 * - 環境変数や設定の読み込み (DATABASE_URL, Auth0 issuer/audience, JWKS 取得設定など)
 * - 設定値のバリデーション (不足なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub database_url: String,
    pub db_reset_on_start: bool,

    pub auth_issuer: String,
    pub auth_audience: String,
    pub auth_jwks_url: Url,
    pub access_token_leeway_seconds: u64,
    pub jwks_fetch_timeout: Duration,
    pub jwks_refresh_cooldown: Duration,

    pub request_timeout: Duration,
    pub request_body_limit_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup (env in production, a map in tests).
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port: u16 = parse_or(&var, "PORT", 5000)?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(var("APP_ENV"));

        let database_url = var("DATABASE_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "sqlite://database.db".to_string());
        let db_reset_on_start = parse_bool(&var, "DB_RESET_ON_START")?;

        // AUTH_ISSUER wins; otherwise derive the Auth0 tenant issuer from AUTH0_DOMAIN.
        let auth_issuer = match (var("AUTH_ISSUER"), var("AUTH0_DOMAIN")) {
            (Some(issuer), _) if !issuer.trim().is_empty() => issuer.trim().to_string(),
            (_, Some(domain)) if !domain.trim().is_empty() => {
                format!("https://{}/", domain.trim().trim_end_matches('/'))
            }
            _ => return Err(ConfigError::Missing("AUTH_ISSUER")),
        };

        let auth_audience = var("AUTH_AUDIENCE")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("AUTH_AUDIENCE"))?;

        let auth_jwks_url = match var("AUTH_JWKS_URL").filter(|s| !s.trim().is_empty()) {
            Some(raw) => Url::parse(raw.trim()).map_err(|_| ConfigError::Invalid("AUTH_JWKS_URL"))?,
            None => default_jwks_url(&auth_issuer)?,
        };

        let access_token_leeway_seconds = parse_or(&var, "ACCESS_TOKEN_LEEWAY_SECONDS", 60)?;
        let jwks_fetch_timeout =
            Duration::from_secs(parse_or(&var, "JWKS_FETCH_TIMEOUT_SECONDS", 5)?);
        if jwks_fetch_timeout.is_zero() {
            return Err(ConfigError::Invalid("JWKS_FETCH_TIMEOUT_SECONDS"));
        }
        let jwks_refresh_cooldown =
            Duration::from_secs(parse_or(&var, "JWKS_REFRESH_COOLDOWN_SECONDS", 30)?);

        let request_timeout = Duration::from_secs(parse_or(&var, "REQUEST_TIMEOUT_SECONDS", 30)?);
        let request_body_limit_bytes = parse_or(&var, "REQUEST_BODY_LIMIT_BYTES", 1024 * 1024)?;

        Ok(Self {
            addr,
            app_env,
            database_url,
            db_reset_on_start,
            auth_issuer,
            auth_audience,
            auth_jwks_url,
            access_token_leeway_seconds,
            jwks_fetch_timeout,
            jwks_refresh_cooldown,
            request_timeout,
            request_body_limit_bytes,
        })
    }
}

fn parse_or<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|_| ConfigError::Invalid(key))
        }
        _ => Ok(default),
    }
}

fn parse_bool(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<bool, ConfigError> {
    match var(key).map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("0") | Some("false") | Some("no") => Ok(false),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some(_) => Err(ConfigError::Invalid(key)),
    }
}

// `<issuer>/.well-known/jwks.json`, keeping any issuer path prefix.
fn default_jwks_url(issuer: &str) -> Result<Url, ConfigError> {
    let mut base = Url::parse(issuer).map_err(|_| ConfigError::Invalid("AUTH_ISSUER"))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(".well-known/jwks.json")
        .map_err(|_| ConfigError::Invalid("AUTH_ISSUER"))
}
