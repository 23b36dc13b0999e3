pub mod routes;

use actix_web::web;

use crate::infrastructure::error::AppError;

/// Configure toutes les routes de l'API
///
/// `max_message_bytes` borne aussi bien les corps JSON que les messages
/// WebSocket (voir `Config::max_message_bytes`).
pub fn config(max_message_bytes: usize) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(
            web::JsonConfig::default()
                .limit(max_message_bytes)
                .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
        );

        cfg.service(
            web::scope("/api")
                // Coaching IA: WebSocket streamé et repli requête/réponse
                .service(routes::coaching_stream::coaching_stream)
                .service(routes::coaching::coach),
        );

        // Endpoint de santé
        cfg.service(routes::health::health_check);
    }
}
