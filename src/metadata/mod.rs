pub mod client;
pub mod snapshot;
