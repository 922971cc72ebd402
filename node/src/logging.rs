//! # Logging
//!
//! Sets up one global `tracing` subscriber for the binary. Library crates
//! only emit events; this is the single place that decides where they go.
//!
//! Events are written to stderr. Stdout carries the scenario report and
//! nothing else, so `vault-node run -s x.json > report.json` stays clean.
//!
//! Filtering uses `EnvFilter` directives. `RUST_LOG`, when set, replaces the
//! filter passed on the command line:
//!
//! ```text
//! RUST_LOG=vault_contracts=debug vault-node run -s withdraw.json
//! ```
//!
//! shows every reverted call together with its reason.

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Colored, multi-field lines for a terminal.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Installs the global subscriber.
///
/// `filter` is used unless `RUST_LOG` is set. Fails if the active directives
/// do not parse or a subscriber is already installed.
pub fn init_logging(filter: &str, format: LogFormat) -> Result<()> {
    let env_filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => parse_filter(&directives)?,
        _ => parse_filter(filter)?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            )
            .try_init(),
    }
    .context("a tracing subscriber is already installed")?;

    tracing::debug!(?format, "logging ready");
    Ok(())
}

fn parse_filter(directives: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directives).with_context(|| format!("invalid log filter '{directives}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_parse_case_insensitively() {
        assert_eq!(LogFormat::from_str("json", true), Ok(LogFormat::Json));
        assert_eq!(LogFormat::from_str("Pretty", true), Ok(LogFormat::Pretty));
        assert!(LogFormat::from_str("xml", true).is_err());
    }

    #[test]
    fn filter_directives_are_validated() {
        assert!(parse_filter("vault_node=debug,vault_contracts=info").is_ok());
        assert!(parse_filter("vault_node=loud").is_err());
    }
}
