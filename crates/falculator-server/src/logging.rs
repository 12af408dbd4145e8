use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Once;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::configuration::LogFormat;

const DEFAULT_DIRECTIVES: &str = "falculator=debug,falculator_server=info,tower_http=info,warn";
const LOG_FILE_PREFIX: &str = "falculator-server.log";

static INIT: Once = Once::new();

fn env_filter() -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_DIRECTIVES))
        .context("invalid log filter")
}

/// Console output goes to stderr so the `extract` command can keep stdout for
/// its JSON. A JSON file layer is added when `log_dir` is set.
pub fn setup_logging(format: LogFormat, log_dir: Option<&Path>) -> Result<()> {
    let mut result = Ok(());

    INIT.call_once(|| {
        result = (|| {
            let console = fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr);
            let console = match format {
                LogFormat::Plain => console.boxed(),
                LogFormat::Json => console.json().boxed(),
            };

            let mut layers = vec![console.with_filter(env_filter()?).boxed()];

            if let Some(dir) = log_dir {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create log directory {}", dir.display()))?;
                let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
                let file_layer = fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(appender)
                    .with_ansi(false)
                    .json();
                layers.push(file_layer.with_filter(env_filter()?).boxed());
            }

            Registry::default()
                .with(layers)
                .try_init()
                .context("Failed to set global subscriber")
        })();
    });

    result
}
