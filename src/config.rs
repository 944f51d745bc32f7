use std::{env, fmt::Display, net::{SocketAddr, ToSocketAddrs as _}, str::FromStr, time::Duration};

use sea_orm::ConnectOptions;
use thiserror::Error;
use tracing::{info, warn};

use crate::consts::{DEFAULT_FEED_CAPACITY, DEFAULT_REPORT_TIMEOUT, MAX_IN_CLAUSE};

pub struct Config {
    pub host_address: SocketAddr,

    pub database_opt: ConnectOptions,

    pub jwt_key: String,

    pub feed_capacity: usize,

    pub settings: Settings,
}

/// Tunables handed to request handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Staff ids per batched query, never above [`MAX_IN_CLAUSE`]
    pub batch_size: usize,
    /// How long a payroll request waits for its view to load
    pub report_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            batch_size: MAX_IN_CLAUSE,
            report_timeout: DEFAULT_REPORT_TIMEOUT,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment `{0}` is required to be set")]
    Missing(&'static str),

    #[error("environment `{name}` is not valid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

pub fn load() -> Result<Config, ConfigError> {
    Ok(Config {
        host_address: load_host_address()?,
        database_opt: load_required("DATABASE_URL")?.into(),
        jwt_key: load_required("JWT_SECRET")?,
        feed_capacity: parse("CHANGE_FEED_CAPACITY", env::var("CHANGE_FEED_CAPACITY").ok(), DEFAULT_FEED_CAPACITY)?,
        settings: Settings {
            batch_size: clamp_batch_size(parse("FANOUT_BATCH_SIZE", env::var("FANOUT_BATCH_SIZE").ok(), MAX_IN_CLAUSE)?),
            report_timeout: Duration::from_secs(parse(
                "REPORT_TIMEOUT_SECS",
                env::var("REPORT_TIMEOUT_SECS").ok(),
                DEFAULT_REPORT_TIMEOUT.as_secs(),
            )?),
        },
    })
}

fn load_host_address() -> Result<SocketAddr, ConfigError> {
    info!("Loading environment `HOST_ADDRESS`");

    let var = env::var("HOST_ADDRESS").unwrap_or_else(|_| "127.0.0.1:0".to_string());
    let invalid = |reason: String| ConfigError::Invalid { name: "HOST_ADDRESS", reason };

    var.to_socket_addrs()
        .map_err(|err| invalid(err.to_string()))?
        .next()
        .ok_or_else(|| invalid("unable to resolve host".to_string()))
}

fn load_required(name: &'static str) -> Result<String, ConfigError> {
    info!("Loading environment `{name}`");

    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse<T>(name: &'static str, var: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    info!("Loading environment `{name}`");

    match var {
        Some(var) => var.trim().parse().map_err(|err: T::Err| ConfigError::Invalid { name, reason: err.to_string() }),
        None => Ok(default),
    }
}

fn clamp_batch_size(batch_size: usize) -> usize {
    let clamped = batch_size.clamp(1, MAX_IN_CLAUSE);

    if clamped != batch_size {
        warn!(requested = batch_size, using = clamped, "`FANOUT_BATCH_SIZE` out of range");
    }

    clamped
}
