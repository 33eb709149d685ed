pub mod handlers;
pub mod listener;
pub mod server;
pub mod tls;
