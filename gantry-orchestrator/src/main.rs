use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod context;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod stages;

use crate::config::Config;
use crate::context::Context;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gantry_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Gantry Orchestrator...");

    let config = Config::from_env().expect("Failed to load configuration");
    config.validate().expect("Invalid configuration");

    tracing::info!(
        "Deployment mode: {:?}, main branch: {}, {} reviewer(s)",
        config.mode,
        config.main_branch,
        config.reviewers.len()
    );
    for env in config.environments() {
        tracing::info!(
            "Environment {}: registry {}, state {}, approval required: {}",
            env.name,
            env.registry_ref,
            env.state_backend_ref,
            env.requires_approval
        );
    }

    let addr = config.bind_addr.clone();
    let ctx = Context::new(config);

    // Build router with all API endpoints
    let app = api::create_router(ctx);

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
