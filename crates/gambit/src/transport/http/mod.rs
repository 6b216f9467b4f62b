mod routes;
mod server;
mod ws;

pub use routes::{HealthCheckResponse, routes};
pub use server::{ServerConfig, serve, serve_on};
pub use ws::handle_socket;
