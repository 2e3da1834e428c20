//! Configuration for the conversion service.
//!
//! This module provides [`ServiceConfig`] and [`ServiceConfigBuilder`] for
//! configuring the HTTP listener, log labels, the browser binary and the
//! conversion pipeline.
//!
//! # Example
//!
//! ```rust
//! use html2pdf_service::ServiceConfigBuilder;
//! use std::time::Duration;
//!
//! let config = ServiceConfigBuilder::new()
//!     .port(9000)
//!     .conversion_timeout(Duration::from_secs(30))
//!     .build()
//!     .expect("Invalid config");
//!
//! assert_eq!(config.port, 9000);
//! assert_eq!(config.conversion_timeout.as_secs(), 30);
//! ```
//!
//! # Environment Configuration
//!
//! When the `env-config` feature is enabled, configuration can be loaded
//! from `app.env` and the process environment:
//!
//! | Variable | Type | Default | Description |
//! |----------|------|---------|-------------|
//! | `PORT` | u16 | 8080 | HTTP listen port |
//! | `LOG_APPLICATION` | String | `APP_NAME` or empty | `labels.application` in logs |
//! | `LOG_ENVIRONMENT` | String | `DOMAIN` or empty | `labels.environment` in logs |
//! | `SWAGGER_ENABLED` | bool | false | Serve `/swagger.json` |
//! | `CHROME_PATH` | String | auto | Custom Chrome binary path |
//! | `CONVERSION_TIMEOUT_SECONDS` | u64 | 20 | Deadline per pipeline attempt |

use std::time::Duration;

/// Default deadline for one pipeline attempt.
pub const DEFAULT_CONVERSION_TIMEOUT: Duration = Duration::from_secs(20);

/// Default selector of the element revealed by the make-visible script.
pub const DEFAULT_REVEAL_SELECTOR: &str = "#hash_assinatura";

/// Default delay before the make-visible script reveals its element.
pub const DEFAULT_REVEAL_DELAY: Duration = Duration::from_secs(3);

/// Service configuration.
///
/// Use [`ServiceConfigBuilder`] for validated construction, or
/// [`Default::default()`] for the documented defaults.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Port the public HTTP listener binds to.
    ///
    /// Default: 8080
    pub port: u16,

    /// Application label attached to every log line.
    pub log_application: String,

    /// Environment label attached to every log line.
    pub log_environment: String,

    /// Whether `/swagger.json` is served.
    ///
    /// Default: false
    pub swagger_enabled: bool,

    /// Custom Chrome binary. `None` lets `headless_chrome` auto-detect.
    pub chrome_path: Option<String>,

    /// Deadline applied to each pipeline attempt.
    ///
    /// The retry attempt gets a fresh deadline of the same length, so a
    /// conversion that falls back can take up to twice this value.
    ///
    /// Default: 20 seconds
    pub conversion_timeout: Duration,

    /// CSS selector of the element the make-visible script reveals.
    ///
    /// Default: `#hash_assinatura`
    pub reveal_selector: String,

    /// Delay before the element is revealed.
    ///
    /// Default: 3 seconds
    pub reveal_delay: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            log_application: String::new(),
            log_environment: String::new(),
            swagger_enabled: false,
            chrome_path: None,
            conversion_timeout: DEFAULT_CONVERSION_TIMEOUT,
            reveal_selector: DEFAULT_REVEAL_SELECTOR.to_string(),
            reveal_delay: DEFAULT_REVEAL_DELAY,
        }
    }
}

/// Builder for [`ServiceConfig`] with validation.
///
/// # Example
///
/// ```rust
/// use html2pdf_service::ServiceConfigBuilder;
///
/// let config = ServiceConfigBuilder::new()
///     .log_application("html2pdf")
///     .log_environment("staging")
///     .swagger_enabled(true)
///     .build()
///     .unwrap();
///
/// assert!(config.swagger_enabled);
/// ```
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            config: ServiceConfig::default(),
        }
    }

    /// Set the HTTP listen port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the application log label.
    pub fn log_application<S: Into<String>>(mut self, application: S) -> Self {
        self.config.log_application = application.into();
        self
    }

    /// Set the environment log label.
    pub fn log_environment<S: Into<String>>(mut self, environment: S) -> Self {
        self.config.log_environment = environment.into();
        self
    }

    /// Enable or disable the API document route.
    pub fn swagger_enabled(mut self, enabled: bool) -> Self {
        self.config.swagger_enabled = enabled;
        self
    }

    /// Set a custom Chrome binary path.
    pub fn chrome_path<S: Into<String>>(mut self, path: S) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    /// Set the per-attempt pipeline deadline.
    pub fn conversion_timeout(mut self, timeout: Duration) -> Self {
        self.config.conversion_timeout = timeout;
        self
    }

    /// Set the selector revealed by the make-visible script.
    pub fn reveal_selector<S: Into<String>>(mut self, selector: S) -> Self {
        self.config.reveal_selector = selector.into();
        self
    }

    /// Set the delay before the element is revealed.
    pub fn reveal_delay(mut self, delay: Duration) -> Self {
        self.config.reveal_delay = delay;
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// - `conversion_timeout` is zero
    /// - `reveal_selector` is blank
    pub fn build(self) -> std::result::Result<ServiceConfig, String> {
        if self.config.conversion_timeout.is_zero() {
            return Err("conversion_timeout must be greater than 0".to_string());
        }

        if self.config.reveal_selector.trim().is_empty() {
            return Err("reveal_selector must not be empty".to_string());
        }

        Ok(self.config)
    }
}

impl Default for ServiceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Environment Configuration (feature-gated)
// ============================================================================

/// Environment-based configuration loading.
///
/// Requires the `env-config` feature.
#[cfg(feature = "env-config")]
pub mod env {
    use super::*;
    use crate::error::RenderError;

    /// Default environment file name.
    pub const ENV_FILE_NAME: &str = "app.env";

    /// Load environment variables from `app.env` if present.
    pub fn load_env_file() -> Result<std::path::PathBuf, dotenvy::Error> {
        dotenvy::from_filename(ENV_FILE_NAME)
    }

    /// Load configuration from the environment.
    ///
    /// Reads `app.env` first (missing file is fine), then the process
    /// environment. Unparseable values fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Configuration`] if validation fails.
    pub fn from_env() -> Result<ServiceConfig, RenderError> {
        match load_env_file() {
            Ok(path) => {
                log::info!("Loaded configuration from: {:?}", path);
            }
            Err(e) => {
                log::debug!(
                    "No {} file found or failed to load: {} (using environment variables and defaults)",
                    ENV_FILE_NAME,
                    e
                );
            }
        }

        let port = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080u16);

        let log_application = non_empty_var("LOG_APPLICATION")
            .or_else(|| non_empty_var("APP_NAME"))
            .unwrap_or_default();

        let log_environment = non_empty_var("LOG_ENVIRONMENT")
            .or_else(|| non_empty_var("DOMAIN"))
            .unwrap_or_default();

        let swagger_enabled = std::env::var("SWAGGER_ENABLED")
            .ok()
            .and_then(|s| parse_bool(&s))
            .unwrap_or(false);

        let timeout_seconds = std::env::var("CONVERSION_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CONVERSION_TIMEOUT.as_secs());

        log::info!("Loading service configuration from environment:");
        log::info!("   - Port: {}", port);
        log::info!("   - Log application: {:?}", log_application);
        log::info!("   - Log environment: {:?}", log_environment);
        log::info!("   - Swagger enabled: {}", swagger_enabled);
        log::info!("   - Conversion timeout: {}s", timeout_seconds);

        let mut builder = ServiceConfigBuilder::new()
            .port(port)
            .log_application(log_application)
            .log_environment(log_environment)
            .swagger_enabled(swagger_enabled)
            .conversion_timeout(Duration::from_secs(timeout_seconds));

        if let Some(path) = chrome_path_from_env() {
            builder = builder.chrome_path(path);
        }

        builder.build().map_err(RenderError::Configuration)
    }

    /// Get Chrome path from the `CHROME_PATH` environment variable.
    pub fn chrome_path_from_env() -> Option<String> {
        non_empty_var("CHROME_PATH")
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    /// Parses the boolean spellings accepted for flags (`true`, `1`, `yes`, `on`).
    pub(crate) fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_bool() {
            assert_eq!(parse_bool("true"), Some(true));
            assert_eq!(parse_bool(" TRUE "), Some(true));
            assert_eq!(parse_bool("1"), Some(true));
            assert_eq!(parse_bool("off"), Some(false));
            assert_eq!(parse_bool("maybe"), None);
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
