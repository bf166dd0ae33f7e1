//! # bossoidc-observe - Observability Layer
//!
//! Structured logging setup shared by the boss-oidc binaries and tests.

pub mod logging;

pub use logging::{LogConfig, LogFormat, init_logging, login_span, record_login_outcome};
