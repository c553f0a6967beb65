//! Adapters for external services.

mod http_secret_store;

pub use http_secret_store::HttpSecretStore;
