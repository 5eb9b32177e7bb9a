use std::sync::Arc;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use hrm_requests::api::AppEngine;
use hrm_requests::config::Config;
use hrm_requests::db::init_db;
use hrm_requests::docs::ApiDoc;
use hrm_requests::engine::Engine;
use hrm_requests::routes;
use hrm_requests::store::mysql::MySqlStore;

#[get("/")]
async fn index() -> impl Responder {
    "Hello World!"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await;
    let engine: AppEngine = Engine::new(Arc::new(MySqlStore::new(pool.clone())));

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    // Prime page 1 of each kind's reviewer list
    let engine_for_warmup = engine.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = engine_for_warmup.query().warmup().await {
            eprintln!("Failed to warm up request caches: {:?}", e);
        }
    });

    // Forward confirmed transitions to the log until a push channel for
    // reviewers is wired up.
    let mut transitions = engine.subscribe();
    actix_web::rt::spawn(async move {
        while let Ok(event) = transitions.recv().await {
            info!(
                request_id = event.request_id,
                kind = %event.kind,
                transition = %event.transition,
                "request transition"
            );
        }
    });

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(engine.clone()))
            .app_data(Data::new(config.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
