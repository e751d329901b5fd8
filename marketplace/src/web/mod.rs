// marketplace/src/web/mod.rs

pub mod extractors;
pub mod handlers;
pub mod routes;

pub use extractors::{AuthenticatedUser, USER_ID_HEADER};
pub use routes::configure_app_routes;
