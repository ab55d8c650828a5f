//! Edge nonce proxy library.
//!
//! Sits between clients and an origin, stamping every response with a
//! per-request CSP nonce, security headers and content-type-driven caching.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod policy;
pub mod security;

pub use config::schema::EdgeConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
