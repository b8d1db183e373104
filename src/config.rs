use std::{env, fmt::Display, str::FromStr};

/// Runtime settings read from the environment (and `.env`, when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub session_key: Option<String>,
    pub cookie_secure: bool,
    pub admin_username: String,
    pub admin_password: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        if dotenvy::dotenv().is_ok() {
            log::info!("Loaded environment overrides from .env");
        }

        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let admin_password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| {
            log::warn!("ADMIN_PASSWORD not set, seeding admin with the default password");
            "admin123".to_string()
        });

        Ok(Self {
            database_url,
            bind_addr: try_load("BIND_ADDR", "127.0.0.1:8080".to_string()),
            db_max_connections: try_load("DB_MAX_CONNECTIONS", 8),
            session_key: env::var("SESSION_KEY").ok(),
            cookie_secure: try_load("COOKIE_SECURE", false),
            admin_username: try_load("ADMIN_USERNAME", "admin".to_string()),
            admin_password,
        })
    }
}

/// Parse `key` from the environment, falling back to `default` when it is
/// missing or unparsable.
fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => parse_or_default(key, &raw, default),
        Err(_) => default,
    }
}

fn parse_or_default<T>(key: &str, raw: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match raw.trim().parse() {
        Ok(v) => v,
        Err(e) => {
            log::warn!("Invalid {key} value '{raw}': {e}; using default {default}");
            default
        }
    }
}
