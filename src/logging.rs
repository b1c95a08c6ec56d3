use tracing::Level;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Install the global subscriber. `RUST_LOG` directives are honoured; `verbose`
/// adds debug output for this crate. Log lines go to stderr so stdout carries
/// only the summaries.
pub fn init_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));
    if verbose {
        env_filter = env_filter.add_directive("banana_suitability=debug".parse()?);
    }

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        );

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
