use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging to stderr so program output on stdout stays clean.
///
/// `RUST_LOG` overrides the default filter, which is `warn`, or `debug`
/// for this crate when `verbose` is set.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("warn,bf_vm=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
