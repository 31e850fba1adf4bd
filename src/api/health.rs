use actix_web::{HttpResponse, Responder, get, web};
use serde::Serialize;
use tracing::{debug, warn};

use crate::api::search::SearchService;

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    engine: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    searches_in_flight: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Health check endpoint
///
/// General health check including the search engine state.
/// Use for load balancers and uptime monitors.
#[get("/health")]
async fn health_check(service: web::Data<SearchService>) -> impl Responder {
    let coordinator = service.coordinator();
    if coordinator.is_accepting() {
        debug!("Health check passed");
        HttpResponse::Ok().json(HealthResponse {
            status: "healthy".to_string(),
            engine: "accepting".to_string(),
            searches_in_flight: Some(coordinator.in_flight()),
            error: None,
        })
    } else {
        warn!("Health check failed: engine is shutting down");
        HttpResponse::ServiceUnavailable().json(HealthResponse {
            status: "unhealthy".to_string(),
            engine: "shutting_down".to_string(),
            searches_in_flight: Some(coordinator.in_flight()),
            error: Some("Search engine is shutting down".to_string()),
        })
    }
}

/// Readiness check endpoint
///
/// Checks if the service can run searches: the engine is accepting and at
/// least one source adapter is registered.
/// Returns 503 otherwise so the instance is taken out of rotation.
#[get("/ready")]
async fn readiness_check(service: web::Data<SearchService>) -> impl Responder {
    let coordinator = service.coordinator();
    let error = if !coordinator.is_accepting() {
        Some("Search engine is shutting down".to_string())
    } else if coordinator.adapters().is_empty() {
        Some("No source adapters registered".to_string())
    } else {
        None
    };

    match error {
        None => HttpResponse::Ok().json(HealthResponse {
            status: "ready".to_string(),
            engine: "accepting".to_string(),
            searches_in_flight: None,
            error: None,
        }),
        Some(e) => {
            warn!("Readiness check failed: {}", e);
            HttpResponse::ServiceUnavailable().json(HealthResponse {
                status: "not_ready".to_string(),
                engine: "unavailable".to_string(),
                searches_in_flight: None,
                error: Some(e),
            })
        }
    }
}

/// Liveness check endpoint
///
/// Simple check that the process is alive. Does not check the engine.
#[get("/live")]
async fn liveness_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "alive".to_string(),
        engine: "not_checked".to_string(),
        searches_in_flight: None,
        error: None,
    })
}

pub fn health_config(config: &mut web::ServiceConfig) {
    config
        .service(health_check)
        .service(readiness_check)
        .service(liveness_check);
}
