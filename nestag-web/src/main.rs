//! Servidor HTTP do serviço de reconhecimento de entidades aninhadas.

mod config;
mod handlers;
mod params;

use std::sync::Arc;

use tracing::info;

use nestag_core::{LexiconTagger, ModelRegistry, Tagger};

use crate::config::ServerConfig;
use crate::handlers::AppState;

/// Modelos servidos: especificação `nome:alias:…` e URL de agradecimentos.
const MODEL_SPECS: &[(&str, &str)] = &[(
    "ptbr-lexicon-250301:pt:por",
    "https://example.org/nestag/models#ptbr-lexicon-250301",
)];

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ServerConfig::from_env();

    let specs: Vec<(&str, &str, _)> = MODEL_SPECS
        .iter()
        .map(|(spec, ack)| {
            (*spec, *ack, || Arc::new(LexiconTagger::builtin()) as Arc<dyn Tagger>)
        })
        .collect();
    let registry = match ModelRegistry::new(&specs, &config.default_model) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("cannot initialize models: {}", e);
            std::process::exit(1);
        }
    };

    let bind = config.bind.clone();
    let app = handlers::router(Arc::new(AppState { registry, config }));

    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("cannot bind {}: {}", bind, e);
            std::process::exit(1);
        }
    };
    info!("listening on {}", bind);
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("server error: {}", e);
        std::process::exit(1);
    }
}
