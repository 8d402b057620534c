/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated modules.
/// Access control is applied explicitly at the module level (via Axum layers),
/// preventing accidental exposure of protected endpoints.

/// Routes accessible to all clients: registration, login, health.
pub mod public;

/// Routes restricted to callers whose token resolves to the admin access
/// level: listing, editing, deleting users and casting votes. Authentication
/// happens in the router layer; the privilege floor is enforced per handler.
pub mod admin;
