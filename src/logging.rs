use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "CREDSYNC_LOG";

/// Install the stderr diagnostics subscriber. `CREDSYNC_LOG` takes an
/// `EnvFilter` directive and wins over `--verbose`.
pub fn init(verbose: bool) {
    let default = if verbose { "credsync=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
