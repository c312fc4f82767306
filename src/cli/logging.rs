//! Log subscriber setup for the binary.

use tracing_subscriber::filter::{EnvFilter, LevelFilter};

/// Installs a stderr subscriber. `RUST_LOG` wins over `verbose`.
///
/// Calling this twice is harmless; the second call keeps the first
/// subscriber.
pub fn init(verbose: u8) {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(filter(verbose))
        .try_init();
}

fn filter(verbose: u8) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default_level(verbose).into())
        .from_env_lossy()
}

fn default_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}
