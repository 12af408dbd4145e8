pub mod configuration;
pub mod logging;
pub mod openapi;
pub mod routes;
pub mod state;

pub use state::AppState;
