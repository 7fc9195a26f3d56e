#![cfg(not(tarpaulin_include))]

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use log::{info, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::DashboardError;

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "session";

// Constants
const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds

/// Authentication state of one browser session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
}

impl AuthState {
    /// The credential-check transition
    ///
    /// An unauthenticated session becomes authenticated only when `attempt`
    /// matches the shared password; an authenticated session stays so.
    ///
    /// # Errors
    /// * Returns an error if the stored hash cannot be parsed
    pub fn submit(self, gate: &PasswordGate, attempt: &str) -> Result<AuthState, DashboardError> {
        match self {
            AuthState::Authenticated => Ok(AuthState::Authenticated),
            AuthState::Unauthenticated => {
                if gate.verify(attempt)? {
                    Ok(AuthState::Authenticated)
                } else {
                    Ok(AuthState::Unauthenticated)
                }
            }
        }
    }
}

/// The shared dashboard password, kept only as an Argon2 hash
#[derive(Debug, Clone)]
pub struct PasswordGate {
    password_hash: String,
}

impl PasswordGate {
    /// Hash the configured password once at startup
    ///
    /// # Errors
    /// * Returns an error if the password is empty or hashing fails
    pub fn new(password: &str) -> Result<Self, DashboardError> {
        if password.is_empty() {
            return Err(DashboardError::Config(
                "the dashboard password cannot be empty".to_string(),
            ));
        }
        Ok(PasswordGate {
            password_hash: hash_password(password)?,
        })
    }

    pub fn verify(&self, attempt: &str) -> Result<bool, DashboardError> {
        verify_password(attempt, &self.password_hash)
    }
}

/// Hash a password using Argon2
fn hash_password(password: &str) -> Result<String, DashboardError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(e) => Err(DashboardError::PasswordHash(e.to_string())),
    }
}

/// Verify a password against a stored hash
fn verify_password(password: &str, hash: &str) -> Result<bool, DashboardError> {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(hash) => hash,
        Err(e) => return Err(DashboardError::PasswordHash(e.to_string())),
    };

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false), // Password didn't match
    }
}

/// An authenticated session
#[derive(Debug, Clone)]
pub struct Session {
    /// Time when the session expires
    pub expires_at: SystemTime,
}

/// Authenticated sessions keyed by cookie value
///
/// A session id missing from the store, or expired, is unauthenticated.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of the session identified by `session_id`
    pub fn state(&self, session_id: Option<&str>) -> AuthState {
        let Some(session_id) = session_id else {
            return AuthState::Unauthenticated;
        };
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        match sessions.get(session_id) {
            Some(session) if session.expires_at > SystemTime::now() => AuthState::Authenticated,
            _ => AuthState::Unauthenticated,
        }
    }

    /// Run the credential check for a session
    ///
    /// On success the session gets a fresh id, which is returned so the caller
    /// can set the cookie.
    pub fn login(
        &self,
        session_id: Option<&str>,
        gate: &PasswordGate,
        attempt: &str,
    ) -> Result<Option<String>, DashboardError> {
        match self.state(session_id).submit(gate, attempt)? {
            AuthState::Authenticated => {
                if let Some(old) = session_id {
                    self.remove(old);
                }
                Ok(Some(self.create()))
            }
            AuthState::Unauthenticated => Ok(None),
        }
    }

    /// Drop a session; it becomes unauthenticated
    pub fn remove(&self, session_id: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(session_id);
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn create(&self) -> String {
        let session_id = Uuid::new_v4().to_string();
        let now = SystemTime::now();
        let expires_at = now + Duration::from_secs(SESSION_DURATION);

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, session| session.expires_at > now);
        sessions.insert(session_id.clone(), Session { expires_at });

        session_id
    }
}

/// Login form data
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub password: String,
}

/// Serve the login page HTML
pub async fn serve_login_page() -> Html<&'static str> {
    Html(include_str!("./static/login.html"))
}

/// Handle login requests
///
/// Checks the submitted password and, if it is correct, sets a fresh session
/// cookie and redirects to the dashboard.
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let current = jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_string());

    match state.sessions.login(current.as_deref(), &state.gate, &form.password) {
        Ok(Some(session_id)) => {
            info!("dashboard login succeeded");
            let cookie = Cookie::build((SESSION_COOKIE, session_id))
                .path("/")
                .http_only(true);
            (jar.add(cookie), Redirect::to("/")).into_response()
        }
        Ok(None) => {
            warn!("dashboard login rejected: incorrect password");
            (StatusCode::UNAUTHORIZED, "Incorrect password").into_response()
        }
        Err(e) => {
            warn!("dashboard login failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error").into_response()
        }
    }
}

/// Handle logout
///
/// Drops the session and clears the cookie.
pub async fn handle_logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(cookie.value());
    }

    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Redirect::to("/login"),
    )
}

/// Authentication middleware
///
/// Lets authenticated sessions through. Otherwise pages redirect to the
/// login form and data endpoints answer 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let session_id = jar.get(SESSION_COOKIE).map(|cookie| cookie.value());
    if state.sessions.state(session_id) == AuthState::Authenticated {
        return next.run(request).await;
    }

    let path = request.uri().path();
    if path.starts_with("/api/") || path.starts_with("/chart/") || path.starts_with("/export/") {
        return (StatusCode::UNAUTHORIZED, "Login required").into_response();
    }
    Redirect::to("/login").into_response()
}
