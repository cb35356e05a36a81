use std::{env, path::PathBuf};

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// treated as immutable afterwards; pulled into handlers through `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and secret fallbacks.
    pub env: Env,
    // Postgres connection string. `None` is only accepted in local mode (in-memory store).
    pub db_url: Option<String>,
    // HS256 secret for 15-minute access tokens.
    pub jwt_secret: String,
    // HS256 secret for 7-day refresh tokens. Must differ from `jwt_secret`.
    pub jwt_refresh_secret: String,
    pub port: u16,
    // Directory under which `uploads/` lives.
    pub storage_root: PathBuf,
    // Fixed host for absolute media URLs; skips interface probing when set.
    pub server_host: Option<String>,
    // Lowercased emails of the privileged operators (super-admins).
    pub privileged_operators: Vec<String>,
    // Transactional mail API endpoint. Local mode logs messages when unset.
    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub mail_from: String,
}

/// Env
///
/// Runtime context: pretty logs and relaxed secrets locally, JSON logs and
/// mandatory secrets in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

const DEFAULT_PORT: u16 = 5000;
const LOCAL_ACCESS_SECRET: &str = "local-access-secret-change-me";
const LOCAL_REFRESH_SECRET: &str = "local-refresh-secret-change-me";

impl Default for AppConfig {
    /// default
    ///
    /// Non-panicking configuration for tests and state scaffolding.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            jwt_secret: "test-access-secret-value".to_string(),
            jwt_refresh_secret: "test-refresh-secret-value".to_string(),
            port: DEFAULT_PORT,
            storage_root: PathBuf::from("."),
            server_host: Some("127.0.0.1".to_string()),
            privileged_operators: vec!["operator@example.com".to_string()],
            mail_api_url: None,
            mail_api_key: None,
            mail_from: "no-reply@localhost".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from the environment and fails fast.
    ///
    /// # Panics
    /// Panics in production when a secret, the database URL or the mail transport
    /// is missing, and whenever `PORT` is set but is not a valid port number.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let port = match env::var("PORT") {
            Ok(value) => value
                .parse::<u16>()
                .unwrap_or_else(|_| panic!("FATAL: PORT `{}` is not a valid port", value)),
            Err(_) => DEFAULT_PORT,
        };

        let privileged_operators = parse_operator_list(
            &env::var("PRIVILEGED_OPERATORS").unwrap_or_default(),
        );
        let storage_root = env::var("STORAGE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));
        let server_host = env::var("SERVER_HOST").ok().filter(|h| !h.trim().is_empty());
        let mail_from =
            env::var("MAIL_FROM").unwrap_or_else(|_| "no-reply@localhost".to_string());

        match env {
            Env::Local => Self {
                env: Env::Local,
                db_url: env::var("DATABASE_URL").ok(),
                jwt_secret: env::var("JWT_SECRET")
                    .unwrap_or_else(|_| LOCAL_ACCESS_SECRET.to_string()),
                jwt_refresh_secret: env::var("JWT_REFRESH_SECRET")
                    .unwrap_or_else(|_| LOCAL_REFRESH_SECRET.to_string()),
                port,
                storage_root,
                server_host,
                privileged_operators,
                mail_api_url: env::var("MAIL_API_URL").ok(),
                mail_api_key: env::var("MAIL_API_KEY").ok(),
                mail_from,
            },
            Env::Production => Self {
                env: Env::Production,
                db_url: Some(
                    env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
                ),
                jwt_secret: env::var("JWT_SECRET").expect("FATAL: JWT_SECRET required in prod"),
                jwt_refresh_secret: env::var("JWT_REFRESH_SECRET")
                    .expect("FATAL: JWT_REFRESH_SECRET required in prod"),
                port,
                storage_root,
                server_host,
                privileged_operators,
                mail_api_url: Some(
                    env::var("MAIL_API_URL").expect("FATAL: MAIL_API_URL required in prod"),
                ),
                mail_api_key: Some(
                    env::var("MAIL_API_KEY").expect("FATAL: MAIL_API_KEY required in prod"),
                ),
                mail_from,
            },
        }
    }

    /// True when `email` is on the configured privileged-operator allowlist.
    pub fn is_privileged_operator(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.privileged_operators.iter().any(|op| *op == email)
    }
}

fn parse_operator_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}
