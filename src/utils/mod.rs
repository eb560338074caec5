//! Shared helpers: HTTP retry and rate limiting, credential files

pub mod credentials;
pub mod http;

pub use credentials::{read_secret, CredentialError};
