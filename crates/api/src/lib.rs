//! HTTP query surface for the post harvester.

pub mod response;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::AppState;
