//! Convenient imports for common usage patterns.
//!
//! ```rust,ignore
//! use html2pdf_service::prelude::*;
//! ```
//!
//! This imports:
//!
//! - [`Converter`], [`ConversionRequest`], [`ConversionResult`]
//! - [`BrowserSessionManager`], [`ChromeSessionFactory`], [`SessionFactory`]
//! - [`ServiceConfig`], [`ServiceConfigBuilder`]
//! - [`RenderError`], [`Result`]
//! - [`DevToolsSession`], [`Healthcheck`]
//! - [`ConversionStats`]

pub use crate::config::{ServiceConfig, ServiceConfigBuilder};
pub use crate::error::{RenderError, Result};
pub use crate::factory::{ChromeSessionFactory, SessionFactory};
pub use crate::service::{ConversionRequest, ConversionResult, Converter, HtmlRequest};
pub use crate::session::BrowserSessionManager;
pub use crate::stats::ConversionStats;
pub use crate::traits::{DevToolsSession, Healthcheck};

#[cfg(feature = "env-config")]
pub use crate::config::env::from_env;
