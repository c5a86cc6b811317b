//! Terminal detection and log subscriber setup.

/// Installs the stderr log subscriber.
///
/// `RUST_LOG` wins over `default_level` unless `force_cli_level` is set.
pub(crate) fn init_tracing(default_level: &str, force_cli_level: bool) {
    let filter = if force_cli_level {
        tracing_subscriber::EnvFilter::new(default_level)
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level))
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

pub(crate) fn should_show_progress(stderr_is_terminal: bool, quiet: bool, dumb_terminal: bool) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}

#[cfg(test)]
mod tests {
    use super::should_show_progress;

    #[test]
    fn test_progress_only_on_interactive_stderr() {
        assert!(should_show_progress(true, false, false));
        assert!(!should_show_progress(false, false, false));
        assert!(!should_show_progress(true, true, false));
        assert!(!should_show_progress(true, false, true));
    }
}
