//! Logging system demonstration
//!
//! This example shows how to use the logging infrastructure in different modes.
//!
//! Run with:
//! ```bash
//! # Pretty format (default in debug)
//! cargo run --example logging_demo
//!
//! # JSON format
//! cargo run --example logging_demo -- json
//!
//! # Compact format
//! cargo run --example logging_demo -- compact
//!
//! # With custom filter
//! cargo run --example logging_demo -- pretty "core_runtime=trace"
//! ```

use core_runtime::logging::{
    init_logging, redact_if_sensitive, strip_path, LogFormat, LoggingConfig,
};
use std::env;
use tracing::{debug, error, info, span, trace, warn, Level};

fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let format = if args.len() > 1 {
        match args[1].as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    } else {
        LogFormat::default()
    };

    let filter = args.get(2).cloned();

    let mut config = LoggingConfig::default()
        .with_format(format)
        .with_level(Level::TRACE)
        .with_target(true);

    if let Some(f) = filter {
        config = config.with_filter(f);
    }

    init_logging(config).expect("Failed to initialize logging");

    info!("=== Logging System Demo ===");
    info!(format = ?format, "Logging initialized");

    demo_log_levels();
    demo_structured_logging();
    demo_redaction();

    info!("=== Demo Complete ===");
}

fn demo_log_levels() {
    let span = span!(Level::INFO, "log_levels");
    let _enter = span.enter();

    trace!("This is a TRACE level log");
    debug!("This is a DEBUG level log");
    info!("This is an INFO level log");
    warn!("This is a WARN level log");
    error!("This is an ERROR level log");
}

fn demo_structured_logging() {
    let span = span!(Level::INFO, "structured_logging");
    let _enter = span.enter();

    info!("Simple message without fields");

    info!(
        file_id = "id:abc123",
        name = "report.pdf",
        size = 2_048_576,
        "Remote entry information"
    );

    info!(
        chunks_sent = 12,
        bytes_committed = 1_228_800,
        "Upload session progress"
    );
}

fn demo_redaction() {
    let span = span!(Level::INFO, "redaction");
    let _enter = span.enter();

    // These values are redacted by the helper before they reach any sink
    let token = "secret_access_token_12345";
    let email = "user@example.com";
    let path = "/home/user/private/docs/report.pdf";

    info!(
        token = %redact_if_sensitive("access_token", token),
        email = %redact_if_sensitive("email", email),
        file = %strip_path(path),
        "Sensitive data example"
    );

    // Better still: don't log sensitive values at all
    info!("Authentication successful");
}
