//! Tracing subscriber setup for the server binary.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter directives for a `GAMBIT_LOG` value.
///
/// The level applies to this crate and the server binary. Dependencies
/// (axum, hyper, tungstenite) stay at `warn`.
fn default_directives(gambit_log: Option<&str>) -> String {
    let level = match gambit_log {
        Some("debug") => "debug",
        Some("trace") => "trace",
        Some("warn") | Some("warning") => "warn",
        Some("error") => "error",
        _ => "info",
    };
    format!("warn,gambit={level},gambit_server={level}")
}

/// Build the log filter. `RUST_LOG` wins when set.
fn env_filter() -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    let gambit_log = std::env::var("GAMBIT_LOG").ok();
    EnvFilter::new(default_directives(gambit_log.as_deref()))
}

/// Install the global subscriber. Logs go to stderr; `LOG_FORMAT=json`
/// switches to JSON lines. Calling this twice is harmless.
pub fn init_tracing() {
    let filter = env_filter();
    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}
