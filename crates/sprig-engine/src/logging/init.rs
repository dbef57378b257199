use std::sync::Once;

const DEFAULT_FILTER: &str = "info";

/// Logger configuration.
///
/// `env_filter` uses `env_logger` directives (e.g. `"sprig_engine=debug,wgpu=warn"`).
/// When unset, `RUST_LOG` applies, then `info`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

impl LoggingConfig {
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self {
            env_filter: Some(filter.into()),
            ..Self::default()
        }
    }
}

static INIT: Once = Once::new();

/// Installs the global logger. Only the first call has an effect.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = resolve_filter(config.env_filter, std::env::var("RUST_LOG").ok());

        env_logger::Builder::new()
            .parse_filters(&filter)
            .write_style(config.write_style)
            .init();

        log::debug!("logging initialized with filter `{filter}`");
    });
}

fn resolve_filter(explicit: Option<String>, env: Option<String>) -> String {
    let non_blank = |f: &String| !f.trim().is_empty();

    explicit
        .filter(non_blank)
        .or_else(|| env.filter(non_blank))
        .unwrap_or_else(|| DEFAULT_FILTER.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_filter_wins() {
        let f = resolve_filter(Some("warn".into()), Some("trace".into()));
        assert_eq!(f, "warn");
    }

    #[test]
    fn env_filter_is_next() {
        assert_eq!(resolve_filter(None, Some("debug".into())), "debug");
    }

    #[test]
    fn blank_explicit_filter_defers_to_env() {
        assert_eq!(resolve_filter(Some("  ".into()), Some("debug".into())), "debug");
        assert_eq!(resolve_filter(Some(String::new()), Some(" ".into())), "info");
    }

    #[test]
    fn falls_back_to_info() {
        assert_eq!(resolve_filter(None, None), "info");
        assert_eq!(resolve_filter(Some("  ".into()), None), "info");
    }
}
