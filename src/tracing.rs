use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// - Create a formatting subscriber for outputting logs to stdout
/// - In the formatting subscriber, filter using the `RUST_LOG` env variable
/// - If `RUST_LOG` is not set, filter using the `verbose`/`quiet` arguments:
///     - quiet: error
///     - 0: warn
///     - 1: info
///     - 2: debug
///     - 3+: trace
pub fn init(verbose: u8, quiet: bool) {
    let tracing_registry = tracing_subscriber::registry();

    let env_filter = EnvFilter::try_from_default_env().ok();

    let env_filter = env_filter.unwrap_or(if quiet {
        EnvFilter::from("error")
    } else {
        match verbose {
            0 => EnvFilter::from("warn"),
            1 => EnvFilter::from("info"),
            2 => EnvFilter::from("debug"),
            _ => EnvFilter::from("trace"),
        }
    });
    let env_layer = tracing_subscriber::fmt::layer().with_filter(env_filter);

    tracing_registry.with(env_layer).init();
}
