use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jobboard_backend::{api, utils::config::Config, AppState};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Chargement de la configuration
    let config = Config::from_env()?;

    // Initialisation du logging
    setup_tracing(&config);
    info!("🚀 Démarrage de {} v{}", jobboard_backend::NAME, jobboard_backend::VERSION);
    info!("🔧 Mode: {}", config.run_mode);

    // Création de l'état de l'application
    let app_state = web::Data::new(AppState::from_config(config.clone())?);

    let bind_address = format!("{}:{}", config.server_host, config.server_port);
    let frontend_url = config.frontend_url.clone();
    let any_origin = config.allows_any_origin();
    let max_message_bytes = config.max_message_bytes;

    if config.is_production() && any_origin {
        warn!("⚠️  FRONTEND_URL=* en production: toutes les origines sont acceptées");
    }

    // Configuration du serveur Actix-Web
    let server = HttpServer::new(move || {
        let cors = if any_origin {
            Cors::default().allow_any_origin()
        } else {
            Cors::default().allowed_origin(&frontend_url)
        }
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(app_state.clone())
            .configure(api::config(max_message_bytes))
    })
    .bind(&bind_address)?
    .workers(config.workers)
    .shutdown_timeout(10);

    info!("✅ Backend démarré avec succès!");
    info!("🔗 API disponible sur http://{}", bind_address);
    info!("🔗 Relais de coaching: ws://{}/api/ai-coaching-stream", bind_address);

    server.run().await?;

    info!("Arrêt du serveur");
    Ok(())
}

/// Configure le tracing pour le logging structuré
fn setup_tracing(config: &Config) {
    let log_level = config
        .log_level
        .parse()
        .unwrap_or(tracing::Level::INFO);

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::level_filters::LevelFilter::from_level(log_level).into());

    let fmt_layer = if config.logging_format == "json" {
        Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(true),
        ) as Box<dyn tracing_subscriber::Layer<_> + Send + Sync>
    } else {
        Box::new(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_line_number(true)
                .with_file(true),
        ) as Box<dyn tracing_subscriber::Layer<_> + Send + Sync>
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
