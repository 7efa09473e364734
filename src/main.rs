//! Dual-mode entrypoint: Lambda or local dev server.
//!
//! Detects Lambda runtime via `AWS_LAMBDA_RUNTIME_API` env var.
//! - Lambda: `lambda_http::run(app)`
//! - Local: `axum::serve(listener, app)`

use std::env;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

use edge_auth_gateway::config::Config;
use edge_auth_gateway::oidc::OidcClient;
use edge_auth_gateway::page::RedirectPage;
use edge_auth_gateway::{AppState, create_app};

#[tokio::main]
async fn main() {
    let is_lambda = env::var("AWS_LAMBDA_RUNTIME_API").is_ok();

    // Init tracing: JSON for Lambda, pretty for local
    if is_lambda {
        fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    } else {
        // Load .env for local dev
        let _ = dotenvy::dotenv();
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    }

    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(?config, "Configuration loaded");

    let page = RedirectPage::builtin().expect("Failed to parse redirect page");
    let login = OidcClient::discover(reqwest::Client::new(), &config)
        .await
        .expect("Failed to discover OIDC provider");

    let port = config.port;
    tracing::info!(backend = ?config.session_backend, "Session backend selected");
    let state = Arc::new(AppState::new(config, login, page));
    let app = create_app(state);

    if is_lambda {
        tracing::info!("Starting in Lambda mode");
        lambda_http::run(app).await.expect("Lambda runtime error");
    } else {
        let addr = format!("0.0.0.0:{port}");
        tracing::info!("Starting local server on {}", addr);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind");
        axum::serve(listener, app).await.expect("Server error");
    }
}
