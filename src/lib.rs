//! Edge authentication gateway for CloudFront signed cookies.
//!
//! Visitors log in through an OIDC provider (or skip login from an allowlisted
//! address) and receive CloudFront signed cookies for the restricted path.
//! Same Axum router runs in both Lambda and local dev contexts.
//! Detection via `AWS_LAMBDA_RUNTIME_API` env var.

pub mod config;
pub mod error;
pub mod gateway;
pub mod ocsf;
pub mod oidc;
pub mod page;
pub mod presign;
pub mod routes;
pub mod session;

use axum::Router;
use axum::middleware::from_fn;
use axum::routing::get;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::{Config, SessionBackendKind};
use crate::gateway::{SuccessHook, presign_on_success};
use crate::oidc::{LoginFlow, OidcClient};
use crate::page::RedirectPage;
use crate::presign::Presigner;
use crate::session::AnyBackend;
use crate::session::memory::InMemoryBackend;
use crate::session::middleware::{SessionLayer, session_middleware};
use crate::session::signed::SignedCookieBackend;

/// Path prefix for all gateway endpoints.
pub const AUTH_PREFIX: &str = "/__auth";

/// Shared application state available to all route handlers.
pub struct AppState<F: LoginFlow = OidcClient> {
    pub config: Config,
    pub presigner: Arc<Presigner>,
    pub page: RedirectPage,
    pub login: F,
    pub on_success: SuccessHook,
    pub session_layer: Arc<SessionLayer<AnyBackend>>,
}

impl<F: LoginFlow> AppState<F> {
    /// Wire up the presigner, success hook and session backend from `config`.
    pub fn new(config: Config, login: F, page: RedirectPage) -> Self {
        let presigner = Arc::new(Presigner::new(&config));
        let on_success = presign_on_success(presigner.clone());

        let backend = match config.session_backend {
            SessionBackendKind::Cookie => {
                AnyBackend::Cookie(SignedCookieBackend::new(config.session_secret.clone()))
            }
            SessionBackendKind::Memory => {
                AnyBackend::Memory(InMemoryBackend::new(config.session_secret.clone()))
            }
        };
        let session_layer = Arc::new(SessionLayer {
            backend: Arc::new(backend),
            cookie_name: config.session_cookie_name.clone(),
            https_only: config.secure_cookies(),
        });

        Self {
            config,
            presigner,
            page,
            login,
            on_success,
            session_layer,
        }
    }

    /// Replace the hook run after a completed login.
    pub fn with_success_hook(mut self, hook: SuccessHook) -> Self {
        self.on_success = hook;
        self
    }
}

/// Build the Axum router with all middleware and routes.
pub fn create_app<F: LoginFlow + 'static>(state: Arc<AppState<F>>) -> Router {
    let session_layer = state.session_layer.clone();

    let auth_routes = Router::new()
        .route("/redirect", get(routes::login::login_redirect::<F>))
        .route("/callback", get(routes::callback::oauth_callback::<F>))
        .route("/logout", get(routes::logout::logout))
        .route("/unauthorized", get(routes::unauthorized::unauthorized::<F>));

    Router::new()
        .nest(AUTH_PREFIX, auth_routes)
        .layer(from_fn(move |req, next| {
            let layer = session_layer.clone();
            session_middleware(layer, req, next)
        }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
