use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{overwrite::overwrite_str, CircleDemoConfig, Error};

const ARM_APPS_CONFIG_ENV_NAME: &str = "ARM_APPS_CONFIG_PATH";
const ARM_APPS_LOG_DIR_ENV_NAME: &str = "ARM_APPS_LOG_DIR";

/// Get config path from input or env ARM_APPS_CONFIG_PATH
pub fn get_apps_config_path(config: Option<PathBuf>) -> Option<PathBuf> {
    if config.is_some() {
        config
    } else {
        std::env::var(ARM_APPS_CONFIG_ENV_NAME)
            .map(|s| {
                warn!("### ENV VAR {s} is used ###");
                PathBuf::from(s)
            })
            .ok()
    }
}

/// Resolves `path` against the directory containing `base_path`.
///
/// Absolute paths are returned unchanged.
pub fn resolve_relative_path(base_path: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<PathBuf, Error> {
    let path = path.as_ref();
    if path.is_absolute() {
        return Ok(path.to_owned());
    }
    let base_path = base_path.as_ref();
    Ok(base_path
        .parent()
        .ok_or_else(|| Error::NoParentDirectory(base_path.to_owned()))?
        .join(path))
}

/// Loads the demo config, applying `overwrite` scripts first.
///
/// Without a path the built-in config is used.
pub fn resolve_circle_demo_config(
    config_path: Option<&Path>,
    overwrite: Option<&str>,
) -> Result<CircleDemoConfig, Error> {
    match (config_path, overwrite) {
        (Some(config_path), Some(overwrite)) => {
            let s = fs_err::read_to_string(config_path)
                .map_err(|e| Error::NoFile(config_path.to_owned(), e))?;
            let s = overwrite_str(&s, overwrite)?;
            CircleDemoConfig::from_str(&s, config_path)
        }
        (Some(config_path), None) => CircleDemoConfig::try_new(config_path),
        (None, overwrite) => {
            let mut config = CircleDemoConfig::default();
            if let Some(overwrite) = overwrite {
                let s = toml::to_string(&config).map_err(anyhow::Error::from)?;
                let s = overwrite_str(&s, overwrite)?;
                config = toml::from_str(&s)
                    .map_err(|e| Error::TomlParseFailure(PathBuf::from("<default>"), e))?;
            }
            Ok(config)
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Logs to stderr, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

/// Logs to stderr and, if ARM_APPS_LOG_DIR is set, to hourly rotated files
/// named `<prefix>.<date-hour>` in that directory.
///
/// Keep the returned guard alive until exit, pending logs are flushed when it is dropped.
pub fn init_tracing_with_file_appender(prefix: &str) -> Option<WorkerGuard> {
    let Some(log_dir) = std::env::var_os(ARM_APPS_LOG_DIR_ENV_NAME) else {
        init_tracing();
        return None;
    };
    let file_appender = tracing_appender::rolling::hourly(&log_dir, prefix);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();
    debug!("logging to {log_dir:?}");
    Some(guard)
}
