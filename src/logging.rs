//! Log output for the command-line tool

use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

/// Install the global subscriber, writing to stderr
///
/// `RUST_LOG` wins over `verbose` when it is set.
pub fn init(verbose: bool) {
    let default = if verbose {
        "file_validator_rs=debug"
    } else {
        "file_validator_rs=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
