// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Node Logging
//!
//! The exchange logs through `tracing` under three targets:
//!
//! | Target           | What                                                    |
//! |------------------|---------------------------------------------------------|
//! | `ethx_contracts` | accepted conversions at `info`, rejected calls at `debug` |
//! | `ethx_protocol`  | database commits at `debug`                             |
//! | `ethx_node`      | startup, shutdown, persistence failures                 |
//!
//! HTTP requests are traced by `tower_http`. Everything goes to stderr;
//! stdout belongs to `ethx-node status`.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter,
};

/// Filter for `run` when `RUST_LOG` is unset or unusable.
pub const DEFAULT_FILTER: &str =
    "ethx_node=info,ethx_contracts=info,ethx_protocol=info,tower_http=info";

/// Filter for one-shot commands such as `init`.
pub const COMMAND_FILTER: &str = "ethx_node=info";

/// Log output format, selected with `--log-format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Colored, multi-line events with source locations.
    #[default]
    Pretty,
    /// One JSON object per event, for log shippers.
    Json,
}

/// Builds the filter from `RUST_LOG`, falling back to `default_filter`.
///
/// The second value is the rejected `RUST_LOG` directive, if one was set but
/// could not be parsed.
fn build_filter(default_filter: &str) -> (EnvFilter, Option<String>) {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) => match EnvFilter::try_new(&directives) {
            Ok(filter) => (filter, None),
            Err(_) => (EnvFilter::new(default_filter), Some(directives)),
        },
        Err(_) => (EnvFilter::new(default_filter), None),
    }
}

/// Installs the global subscriber. Call once per process.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(default_filter: &str, format: LogFormat) -> Result<(), TryInitError> {
    let (filter, rejected) = build_filter(default_filter);

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            )
            .try_init()?,
    }

    if let Some(directives) = rejected {
        tracing::warn!(%directives, fallback = default_filter, "ignoring unparsable RUST_LOG");
    }
    Ok(())
}
