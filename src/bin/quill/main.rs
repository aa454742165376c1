use actix_files::Files;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::Key;
use actix_web::http::StatusCode;
use actix_web::middleware::{ErrorHandlers, Logger};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use env_logger::Env;
use quill::config::Config;
use quill::db::{create_schema, init_db};
use quill::middleware::ClientCtx;
use quill::upload::MediaStore;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_lib_mods();
    let config = Config::from_env()?;

    let db = init_db(&config)
        .await
        .context("Database connection was not established.")?;
    if config.create_schema {
        create_schema(&db)
            .await
            .context("Failed to create the database schema.")?;
    }

    let secret_key = match &config.secret_key {
        Some(key) => Key::from(key.as_slice()),
        None => {
            log::warn!("SECRET_KEY is not set; sessions will not survive a restart.");
            Key::generate()
        }
    };
    let secure_cookies = config.secure_cookies;
    let db = Data::new(db);
    let media = Data::new(MediaStore::new(&config.media_root));
    let site_time = Data::new(config.site_time);
    let media_root = config.media_root.clone();

    log::info!("listening on {}", config.bind_address);
    HttpServer::new(move || {
        // Order of middleware IS IMPORTANT and is in REVERSE EXECUTION ORDER.
        // However, services are read top->down, higher traffic routes should be
        // placed higher
        App::new()
            .app_data(db.clone())
            .app_data(media.clone())
            .app_data(site_time.clone())
            .wrap(
                ErrorHandlers::new()
                    .handler(StatusCode::FORBIDDEN, quill::web::error::render_403)
                    .handler(StatusCode::NOT_FOUND, quill::web::error::render_404)
                    .handler(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        quill::web::error::render_500,
                    ),
            )
            .wrap(ClientCtx::default())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                    .cookie_secure(secure_cookies)
                    .build(),
            )
            .wrap(Logger::new("%a %r %s %T"))
            .service(Files::new("/static", "static"))
            .service(Files::new("/media", &media_root))
            .configure(quill::web::configure)
    })
    .bind(&config.bind_address)?
    .run()
    .await?;

    Ok(())
}

/// Initialize third party crates we rely on but don't have control over.
fn init_lib_mods() {
    // A missing .env file is fine; the environment may already be set.
    if let Err(e) = dotenv::dotenv() {
        eprintln!("dotenv: {}", e);
    }
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}
