//! HTTP surface of the proxy.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod security;
pub mod server;
pub mod state;

pub use routes::create_router;
pub use security::SecurityHeaders;
pub use server::{Shutdown, serve};
pub use state::AppState;
