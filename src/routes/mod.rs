/// Router Module Index
///
/// Routes are grouped by who may reach them. Authentication is applied per
/// group as a layer; role and ownership decisions happen in the services.

/// Routes reachable without a token.
pub mod public;

/// Routes behind the `AuthUser` middleware layer.
pub mod authenticated;

/// Administration routes, nested under `/admin`.
pub mod admin;
