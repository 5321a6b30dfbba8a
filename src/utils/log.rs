// src/utils/log.rs

//! Logging setup and formatting helpers.
//!
//! Everything logs through the `log` facade; `init` installs `env_logger`
//! when the `logger` feature is enabled.

/// Initialize logging. `RUST_LOG` wins over the configured level.
#[cfg(feature = "logger")]
pub fn init(level: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .try_init();
}

/// Render a summary line: `title (key: value, key: value)`.
pub fn format_summary(title: &str, items: &[(&str, String)]) -> String {
    let body = items
        .iter()
        .map(|(key, value)| format!("{key}: {value}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("[SUMMARY] {title} ({body})")
}

/// Log a summary section at INFO.
pub fn summary(title: &str, items: &[(&str, String)]) {
    log::info!("{}", format_summary(title, items));
}
