use color_eyre::eyre::{Report, WrapErr};
use tracing_error::ErrorLayer;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

/// Installs the global subscriber. `RUST_LOG` overrides the default `info` filter.
pub fn init() -> Result<(), Report> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    let subscriber = Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .with(ErrorLayer::default());
    tracing::subscriber::set_global_default(subscriber).wrap_err("installing tracing subscriber")
}
