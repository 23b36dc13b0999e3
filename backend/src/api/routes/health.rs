use actix_web::{get, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

use crate::AppState;

/// Vérification de santé du service
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str, // "healthy", "degraded"
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
    pub services: Vec<ServiceHealth>,
}

/// Santé d'une dépendance
#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub service: &'static str,
    pub status: &'static str,
    pub response_time_ms: Option<u64>,
    pub error: Option<String>,
}

/// Endpoint de santé pour les probes Kubernetes/Docker
///
/// Une base indisponible rend le service `degraded`, pas indisponible: le
/// coaching continue avec les consignes par défaut.
#[get("/health")]
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let database = match &state.database {
        Some(database) => {
            let started = Instant::now();
            match database.ping().await {
                Ok(()) => ServiceHealth {
                    service: "database",
                    status: "ok",
                    response_time_ms: Some(started.elapsed().as_millis() as u64),
                    error: None,
                },
                Err(e) => ServiceHealth {
                    service: "database",
                    status: "unavailable",
                    response_time_ms: None,
                    error: Some(e.to_string()),
                },
            }
        }
        None => ServiceHealth {
            service: "database",
            status: "not_configured",
            response_time_ms: None,
            error: None,
        },
    };

    let status = if database.status == "unavailable" { "degraded" } else { "healthy" };

    HttpResponse::Ok().json(HealthStatus {
        status,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
        services: vec![database],
    })
}
