//! Test utilities: fixture keys, a fake login flow, test app builder, IdP fixtures.

#![allow(dead_code)]

use axum::http::HeaderMap;
use axum::http::header::SET_COOKIE;
use axum::response::Response;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use edge_auth_gateway::config::{Config, SigningKey};
use edge_auth_gateway::gateway::{SuccessHook, presign_on_success};
use edge_auth_gateway::oidc::{
    CallbackParams, CompletedLogin, LoginFlow, OidcError, PendingLogin, check_callback,
    store_pending, take_pending,
};
use edge_auth_gateway::page::RedirectPage;
use edge_auth_gateway::session::middleware::SessionHandle;
use edge_auth_gateway::{AppState, create_app};
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const SIGNING_KEY_PEM: &str = include_str!("../fixtures/signing_key_pkcs1.pem");
pub const IDP_KEY_PEM: &str = include_str!("../fixtures/idp_key_pkcs1.pem");

pub const FAKE_STATE: &str = "fake-state";
pub const FAKE_IDP_URL: &str = "https://idp.example/authorize?state=fake-state";
pub const BYPASS_IP: &str = "10.0.0.5";

pub fn signing_key() -> SigningKey {
    SigningKey::from_pem(SIGNING_KEY_PEM).expect("fixture key parses")
}

/// Test config with one bypass address.
pub fn test_config() -> Config {
    let mut config = Config::test_default(signing_key());
    config.bypass_ips = vec![BYPASS_IP.into()];
    config
}

/// Login flow that never leaves the process.
///
/// `begin` stores a pending login with a fixed state; `complete` accepts
/// any code except `deny`, which fails the way a disallowed domain would.
pub struct FakeFlow;

impl LoginFlow for FakeFlow {
    async fn begin(&self, session: &SessionHandle, return_to: String) -> Result<String, OidcError> {
        let pending = PendingLogin {
            state: FAKE_STATE.into(),
            nonce: "fake-nonce".into(),
            return_to,
        };
        store_pending(session, &pending).await?;
        Ok(FAKE_IDP_URL.into())
    }

    async fn complete(
        &self,
        session: &SessionHandle,
        params: CallbackParams,
    ) -> Result<CompletedLogin, OidcError> {
        let pending = take_pending(session).await.ok_or(OidcError::NoPendingLogin)?;
        let code = check_callback(&pending, &params)?;
        if code == "deny" {
            return Err(OidcError::DomainNotAllowed("evil.com".into()));
        }
        Ok(CompletedLogin {
            subject: "user-1".into(),
            email: Some("alice@example.com".into()),
            return_to: pending.return_to,
        })
    }
}

/// Build a test app over `FakeFlow`.
pub fn build_test_app(config: Config) -> (axum::Router, Arc<AppState<FakeFlow>>) {
    let page = RedirectPage::builtin().expect("builtin page parses");
    let state = Arc::new(AppState::new(config, FakeFlow, page));
    let app = create_app(state.clone());
    (app, state)
}

/// Build a test app whose success hook counts its invocations.
pub fn build_counting_app(
    config: Config,
) -> (axum::Router, Arc<AppState<FakeFlow>>, Arc<AtomicUsize>) {
    let page = RedirectPage::builtin().expect("builtin page parses");
    let state = AppState::new(config, FakeFlow, page);
    let (hook, calls) = counting_hook(presign_on_success(state.presigner.clone()));
    let state = Arc::new(state.with_success_hook(hook));
    let app = create_app(state.clone());
    (app, state, calls)
}

/// Wrap `inner`, counting calls.
pub fn counting_hook(inner: SuccessHook) -> (SuccessHook, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let hook: SuccessHook = Arc::new(
        move |login: &CompletedLogin, session: &SessionHandle, headers: &mut HeaderMap| {
            counter.fetch_add(1, Ordering::SeqCst);
            inner(login, session, headers)
        },
    );
    (hook, calls)
}

/// All `Set-Cookie` header values of a response.
pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// The `Set-Cookie` value for cookie `name`, if present.
pub fn find_cookie<'a>(cookies: &'a [String], name: &str) -> Option<&'a str> {
    let prefix = format!("{name}=");
    cookies
        .iter()
        .find(|c| c.starts_with(&prefix))
        .map(String::as_str)
}

/// Just the value part of a `Set-Cookie` header.
pub fn cookie_value(set_cookie: &str) -> &str {
    let pair = set_cookie.split(';').next().unwrap();
    pair.split_once('=').unwrap().1
}

/// JWKS document for the fixture IdP key.
pub fn idp_jwks(kid: &str) -> serde_json::Value {
    let key = RsaPrivateKey::from_pkcs1_pem(IDP_KEY_PEM).unwrap();
    json!({
        "keys": [{
            "kid": kid,
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "n": URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
        }]
    })
}

/// Sign `claims` as an RS256 ID token with the fixture IdP key.
pub fn sign_id_token(kid: &str, claims: &serde_json::Value) -> String {
    let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
    header.kid = Some(kid.into());
    let key = jsonwebtoken::EncodingKey::from_rsa_pem(IDP_KEY_PEM.as_bytes()).unwrap();
    jsonwebtoken::encode(&header, claims, &key).expect("failed to sign JWT")
}

pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}
