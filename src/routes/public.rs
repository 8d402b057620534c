use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that are unauthenticated and accessible to any client. These are
/// the identity gateway (register, login) and the liveness probe; everything
/// else in the API sits behind the access guard.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated liveness endpoint for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /user/register
        // Creates a user and their role assignment. Passwords are hashed
        // before storage; the chosen access level must be a seeded role.
        .route("/user/register", post(handlers::register_user))
        // POST /user/login
        // Verifies credentials and issues the signed bearer token.
        .route("/user/login", post(handlers::login_user))
}
