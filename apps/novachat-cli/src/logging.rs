//! Tracing bootstrap for the terminal client.

use std::env;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn,novachat=info,client_remote=info";

/// Initialize the global subscriber, writing to stderr so the conversation
/// on stdout stays readable.
///
/// Precedence:
/// 1) `RUST_LOG`
/// 2) `NOVACHAT_LOG`
/// 3) internal default filter
pub fn init() {
    let env_filter = filter_from(env::var("NOVACHAT_LOG").ok());
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_env_filter(env_filter)
        .try_init();
}

fn filter_from(app_filter: Option<String>) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    if let Some(value) = app_filter.filter(|v| !v.trim().is_empty())
        && let Ok(filter) = EnvFilter::try_new(value)
    {
        return filter;
    }

    EnvFilter::new(DEFAULT_FILTER)
}
