use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// The guarded operational surface. The paths are kept flat under /user/* for
/// compatibility with existing clients rather than nested under a prefix.
///
/// Access Control:
/// The whole group is wrapped in a router layer that authenticates the caller
/// with the `AuthUser` extractor; each handler then enforces the admin access
/// level before touching the repository.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /user/getlist
        // The rated user list, served through the 60-second cache snapshot.
        .route("/user/getlist", get(handlers::get_user_list))
        // POST /user/edit/{id}
        // Partial profile update plus role reassignment.
        .route("/user/edit/{id}", post(handlers::edit_user))
        // POST /user/delete/{id}
        // Permanent removal of a user record.
        .route("/user/delete/{id}", post(handlers::delete_user))
        // POST /user/vote
        // Runs the voting engine as the token's caller.
        .route("/user/vote", post(handlers::cast_vote))
}
