//! ECS-formatted JSON logging for the server binary.
//!
//! Installs `env_logger` with a formatter that writes one JSON object per
//! line in the Elastic Common Schema layout:
//!
//! ```json
//! {"@timestamp":"2024-05-01T12:00:00.000Z","log.level":"info","log.logger":"access",
//!  "message":"POST /v1/html2pdf 200 812ms","ecs.version":"1.6.0",
//!  "trace.id":"7d0c...","labels":{"application":"html2pdf","environment":"prod"}}
//! ```
//!
//! `trace.id` is the request's [correlation id](crate::correlation) and is
//! left out for lines logged outside a request.
//!
//! The filter comes from `RUST_LOG` and defaults to `info`.
//!
//! Requires the `server` feature.

use std::io::Write;

use crate::config::ServiceConfig;

const ECS_VERSION: &str = "1.6.0";

/// Install the ECS logger. Does nothing if a logger is already installed.
pub fn init(config: &ServiceConfig) {
    let labels = serde_json::json!({
        "application": config.log_application,
        "environment": config.log_environment,
    });

    let result = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(move |buf, record| {
            let line = ecs_line(
                &buf.timestamp_millis().to_string(),
                record.level(),
                record.target(),
                &record.args().to_string(),
                crate::correlation::current().as_deref(),
                &labels,
            );
            writeln!(buf, "{}", line)
        })
        .try_init();

    if let Err(e) = result {
        log::debug!("Logger already installed: {}", e);
    }
}

/// Render one ECS log line.
pub fn ecs_line(
    timestamp: &str,
    level: log::Level,
    logger: &str,
    message: &str,
    trace_id: Option<&str>,
    labels: &serde_json::Value,
) -> serde_json::Value {
    let mut line = serde_json::json!({
        "@timestamp": timestamp,
        "log.level": level.as_str().to_ascii_lowercase(),
        "log.logger": logger,
        "message": message,
        "ecs.version": ECS_VERSION,
        "labels": labels,
    });
    if let Some(id) = trace_id {
        line["trace.id"] = serde_json::Value::from(id);
    }
    line
}
