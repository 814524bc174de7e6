use std::fs;
use std::io;
use std::path::Path;

use clap::{parser::ValueSource, CommandFactory, FromArgMatches};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mzisogrouper::{MZIsoGrouper, MZIsoGrouperError};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn default_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy()
}

fn configure_log(log_file: Option<&Path>) -> io::Result<Option<WorkerGuard>> {
    tracing_log::LogTracer::init().map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(fs::File::create(path)?);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_timer(fmt::time::ChronoLocal::rfc_3339())
                .with_writer(writer)
                .with_filter(default_filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(Level::TRACE.into()))
        .with(
            fmt::layer()
                .compact()
                .with_timer(fmt::time::ChronoLocal::rfc_3339())
                .with_writer(io::stderr)
                .with_filter(default_filter()),
        )
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    Ok(guard)
}

/// Layer the configuration sources, each overriding the last: built-in defaults,
/// `mzisogrouper.toml`, `--config-file`, `MZISOGROUPER_` environment variables, and
/// finally whatever was given explicitly on the command line.
fn load_config() -> Result<MZIsoGrouper, MZIsoGrouperError> {
    let matches = MZIsoGrouper::command().get_matches();
    let args = match MZIsoGrouper::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(e) => e.exit(),
    };

    let explicit: serde_json::Map<String, serde_json::Value> = match serde_json::to_value(&args)? {
        serde_json::Value::Object(fields) => fields
            .into_iter()
            .filter(|(k, _)| matches!(matches.value_source(k), Some(ValueSource::CommandLine)))
            .collect(),
        _ => Default::default(),
    };

    let mut config =
        Figment::from(Serialized::defaults(&args)).merge(Toml::file("mzisogrouper.toml"));
    if let Some(path) = args.config_file.as_ref() {
        config = config.merge(Toml::file_exact(path));
    }
    let config = config
        .merge(Env::prefixed("MZISOGROUPER_"))
        .merge(Serialized::defaults(explicit));
    Ok(config.extract()?)
}

fn main() -> Result<(), MZIsoGrouperError> {
    let args = load_config()?;
    let _guard = configure_log(args.log_file.as_deref())?;
    args.main()
}
