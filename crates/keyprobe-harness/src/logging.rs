//! `tracing` subscriber setup shared by the harness binaries.
//!
//! Diagnostics always go to stderr so stdout stays reserved for the
//! operator-facing progress lines and final results.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Filter directives for the harness, e.g. `keyprobe_harness=debug`.
pub const ENV_LOG: &str = "KEYPROBE_LOG";
/// `json` switches to one JSON object per event.
pub const ENV_LOG_FORMAT: &str = "KEYPROBE_LOG_FORMAT";
/// Consulted when [`ENV_LOG`] is unset.
pub const ENV_RUST_LOG: &str = "RUST_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

static INIT: Once = Once::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Pick the filter directive: [`ENV_LOG`], then [`ENV_RUST_LOG`], then `info`.
#[must_use]
pub fn filter_directive(keyprobe_log: Option<&str>, rust_log: Option<&str>) -> String {
    [keyprobe_log, rust_log]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or(DEFAULT_DIRECTIVE)
        .to_owned()
}

fn env_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|err| {
        eprintln!("WARN invalid log filter {directive:?} ({err}); using {DEFAULT_DIRECTIVE}");
        EnvFilter::new(DEFAULT_DIRECTIVE)
    })
}

/// Install the global subscriber. Later calls are no-ops, as is the first
/// one if another subscriber is already installed.
pub fn init_tracing() {
    INIT.call_once(|| {
        let directive = filter_directive(
            std::env::var(ENV_LOG).ok().as_deref(),
            std::env::var(ENV_RUST_LOG).ok().as_deref(),
        );
        let format = LogFormat::parse(std::env::var(ENV_LOG_FORMAT).ok().as_deref());
        let builder = tracing_subscriber::fmt()
            .with_env_filter(env_filter(&directive))
            .with_writer(std::io::stderr)
            .with_target(true);

        let installed = match format {
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Text => builder.try_init(),
        };
        if installed.is_err() {
            tracing::debug!("global tracing subscriber already installed");
        }
    });
}
