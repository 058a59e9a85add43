//! Diagnostic logging to stderr.

use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const LOG_FILTER_ENV: &str = "WREN_LOG";
const DEFAULT_FILTER: &str = "warn";

/// Install the global subscriber. Later calls are no-ops and return false.
pub fn init_logging() -> bool {
    let directive = filter_directive(
        std::env::var(LOG_FILTER_ENV).ok(),
        std::env::var("RUST_LOG").ok(),
    );
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(filter = %directive, "logging initialized");
    }
    installed
}

/// `WREN_LOG` wins over `RUST_LOG`; blank values are ignored.
pub fn filter_directive(wren_log: Option<String>, rust_log: Option<String>) -> String {
    [wren_log, rust_log]
        .into_iter()
        .flatten()
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

#[cfg(test)]
mod tests {
    use super::filter_directive;

    #[test]
    fn wren_log_takes_precedence() {
        assert_eq!(
            filter_directive(Some("wren_sync=debug".to_string()), Some("info".to_string())),
            "wren_sync=debug"
        );
        assert_eq!(filter_directive(Some("  ".to_string()), Some("info".to_string())), "info");
        assert_eq!(filter_directive(None, None), "warn");
    }
}
