#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use actix_web::dev::Server;
use actix_web::{get, post, web, App, HttpResponse, HttpServer};
use serde_json::json;
use tracing::{error, info};

use crate::domain::AppState;
use crate::service::{request_stop, StatusReport};

#[get("/healthz")]
pub async fn healthz() -> HttpResponse {
    HttpResponse::Ok().json(json!({"status":"ok"}))
}

#[get("/status")]
pub async fn status(data: web::Data<AppState>) -> HttpResponse {
    let now = chrono::Utc::now().timestamp();
    HttpResponse::Ok().json(StatusReport::collect(&data, now))
}

#[post("/stop")]
pub async fn stop(data: web::Data<AppState>) -> HttpResponse {
    let first = request_stop(&data, "http");
    info!(first, "stop request");
    HttpResponse::Ok().json(json!({"status":"ok","already_stopping":!first}))
}

#[get("/metrics")]
pub async fn scrape_metrics(data: web::Data<AppState>) -> HttpResponse {
    match data.metrics.encode_text() {
        Ok(buf) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(buf),
        Err(e) => {
            error!(error=%format!("{e:#}"), "encode metrics failed");
            HttpResponse::InternalServerError().body("encode metrics failed")
        }
    }
}

/// Builds the metrics server without running it; the caller drives the
/// returned future and stops it through [`Server::handle`].
pub fn server(bind: &str, state: AppState) -> std::io::Result<Server> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(healthz)
            .service(status)
            .service(stop)
            .service(scrape_metrics)
    })
    .workers(1)
    .disable_signals()
    .bind(bind)?
    .run();
    Ok(server)
}
