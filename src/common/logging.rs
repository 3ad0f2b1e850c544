use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::env::{self, EnvKey, EnvSource, ProcessEnv};

/// Installs the global subscriber.
///
/// `RUST_LOG` selects what is logged (default `info`); `LOG_FORMAT=json`
/// switches to one JSON object per line.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json_requested(&ProcessEnv) {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_current_span(true))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(env_filter)
            .init();
    }
}

fn json_requested(source: &impl EnvSource) -> bool {
    env::get(source, EnvKey::LogFormat).is_some_and(|v| v.trim().eq_ignore_ascii_case("json"))
}
