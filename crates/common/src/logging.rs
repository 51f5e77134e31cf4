use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt::MakeWriter};

/// Installs the fmt subscriber and routes `log` records (reqwest,
/// cookie_store) into it. `RUST_LOG` overrides `default_directives`.
pub fn init<W>(default_directives: &str, writer: W) -> Result<()>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));
    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}
