pub mod credentials;
pub mod exchange;
pub mod federated;
pub mod request;
