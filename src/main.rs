use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::{App, HttpServer, cookie::Key, middleware, web};

use ormawa::auth::rate_limit::RateLimiter;
use ormawa::config::Config;
use ormawa::{db, handlers};

/// Session signing key from `SESSION_KEY` (hex), or a random one.
fn session_key(config: &Config) -> Key {
    match config.session_key.as_deref().map(hex::decode) {
        Some(Ok(bytes)) if bytes.len() >= 64 => {
            log::info!("Using SESSION_KEY from environment");
            Key::from(bytes.as_slice())
        }
        Some(Ok(bytes)) => {
            log::warn!("SESSION_KEY too short ({} bytes, need 64+), generating random key", bytes.len());
            Key::generate()
        }
        Some(Err(e)) => {
            log::warn!("SESSION_KEY is not valid hex ({e}), generating random key");
            Key::generate()
        }
        None => {
            log::warn!("No SESSION_KEY set, generating random key (sessions lost on restart)");
            Key::generate()
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = Config::from_env().map_err(std::io::Error::other)?;

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    db::seed_admin(&pool, &config.admin_username, &config.admin_password)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    let secret_key = session_key(&config);
    let limiter = RateLimiter::new();
    let bind_addr = config.bind_addr.clone();
    let cookie_secure = config.cookie_secure;

    log::info!("Starting server at http://{bind_addr}");

    HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
            .cookie_secure(cookie_secure)
            .cookie_http_only(true)
            .build();

        App::new()
            .wrap(session_mw)
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(limiter.clone()))
            .app_data(web::Data::new(config.clone()))
            .configure(handlers::configure)
            // Default 404 handler (must be registered last)
            .default_service(web::to(handlers::not_found))
    })
    .bind(bind_addr)?
    .run()
    .await
}
