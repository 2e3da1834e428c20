//! Traits at the seam between the converter and the rendering engine.
//!
//! - **Health monitoring**: [`Healthcheck`] for verifying the session is alive
//! - **Protocol surface**: [`DevToolsSession`] for the handful of DevTools
//!   actions the conversion pipeline needs
//!
//! The Chrome implementation lives in [`factory`](crate::factory); with the
//! `test-utils` feature a scripted `MockSession` is available for tests that
//! must not launch a browser.

mod devtools;
mod healthcheck;

pub use devtools::{DevToolsSession, ListenerId, LoadListener, PdfParams};
pub use healthcheck::Healthcheck;
