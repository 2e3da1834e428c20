//! Web framework integrations.
//!
//! | Framework | Feature Flag | Module |
//! |-----------|--------------|--------|
//! | Axum | `axum-integration` | `axum` |
//!
//! The handlers are thin: request parsing and response mapping live in
//! [`service`](crate::service), conversions in
//! [`Converter`](crate::Converter).

#[cfg(feature = "axum-integration")]
pub mod axum;
