//! Command-line flags and the validated runtime configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use url::Url;

pub const DEFAULT_URL: &str = "https://github.com";
pub const DEFAULT_KEYFILE: &str = ".ssh/authorized_keys";
/// Upper bound for `--interval` and `--timeout`.
pub const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Parser, Debug)]
#[command(name = "keysync", version)]
#[command(
    about = "A bot for keeping your ssh authorized_keys up to date with users' GitHub keys",
    long_about = None
)]
pub struct Cli {
    /// File to update with the authorized keys [default: ~/.ssh/authorized_keys]
    #[arg(long, env = "KEYSYNC_KEYFILE", value_name = "PATH")]
    pub keyfile: Option<PathBuf>,

    /// GitHub or GitHub Enterprise URL
    #[arg(long, env = "KEYSYNC_URL", default_value = DEFAULT_URL)]
    pub url: String,

    /// GitHub username to fetch keys for (repeatable)
    #[arg(
        long = "user",
        env = "KEYSYNC_USERS",
        value_name = "NAME",
        value_delimiter = ','
    )]
    pub users: Vec<String>,

    /// Update interval (ex. 5ms, 10s, 1m, 3h)
    #[arg(long, env = "KEYSYNC_INTERVAL", default_value = "30s")]
    pub interval: String,

    /// Per-request timeout for key fetches
    #[arg(long, env = "KEYSYNC_TIMEOUT", default_value = "30s")]
    pub timeout: String,

    /// Maximum number of key fetches in flight at once
    #[arg(long, env = "KEYSYNC_CONCURRENCY", default_value_t = 1)]
    pub concurrency: usize,

    /// Run once and exit, do not run as a daemon
    #[arg(long, env = "KEYSYNC_ONCE")]
    pub once: bool,

    /// Enable debug logging
    #[arg(short, long, env = "KEYSYNC_DEBUG")]
    pub debug: bool,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("you must pass at least one username")]
    NoUsers,

    #[error("invalid username {0:?}: must be non-empty and contain no whitespace")]
    InvalidUsername(String),

    #[error("you must pass a file to save the authorized keys into or use the default")]
    NoKeyfile,

    #[error("cannot derive the default key file: home directory is unknown")]
    NoHomeDir,

    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid URL {0:?}: scheme must be http or https")]
    UnsupportedScheme(String),

    #[error("invalid {field} {value:?}: {source}")]
    DurationParseFailed {
        field: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("{field} {value:?} exceeds the maximum of 365 days")]
    DurationTooLong { field: &'static str, value: String },

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
}

/// Validated runtime parameters, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub keyfile: PathBuf,
    /// Origin keys are fetched from, without a trailing `/`.
    pub host: String,
    /// Fetch order; duplicates are kept.
    pub users: Vec<String>,
    pub interval: Duration,
    pub timeout: Duration,
    pub concurrency: usize,
    pub once: bool,
    pub debug: bool,
}

impl TryFrom<Cli> for Config {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        if cli.users.is_empty() {
            return Err(ConfigError::NoUsers);
        }
        if let Some(bad) = cli
            .users
            .iter()
            .find(|u| u.is_empty() || u.chars().any(char::is_whitespace))
        {
            return Err(ConfigError::InvalidUsername(bad.clone()));
        }

        let keyfile = match cli.keyfile {
            Some(path) if path.as_os_str().is_empty() => return Err(ConfigError::NoKeyfile),
            Some(path) => path,
            None => default_keyfile().ok_or(ConfigError::NoHomeDir)?,
        };

        let host = parse_host(&cli.url)?;
        let interval = parse_duration("interval", &cli.interval)?;
        let timeout = parse_duration("timeout", &cli.timeout)?;

        if cli.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        Ok(Config {
            keyfile,
            host,
            users: cli.users,
            interval,
            timeout,
            concurrency: cli.concurrency,
            once: cli.once,
            debug: cli.debug,
        })
    }
}

/// `~/.ssh/authorized_keys` for the invoking user, if a home directory is known.
pub fn default_keyfile() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DEFAULT_KEYFILE))
}

fn parse_host(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|source| ConfigError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::UnsupportedScheme(raw.to_string()));
    }
    Ok(trimmed.to_string())
}

fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let duration =
        humantime::parse_duration(value).map_err(|source| ConfigError::DurationParseFailed {
            field,
            value: value.to_string(),
            source,
        })?;
    if duration.is_zero() {
        return Err(ConfigError::ZeroDuration(field));
    }
    if duration > MAX_DURATION {
        return Err(ConfigError::DurationTooLong {
            field,
            value: value.to_string(),
        });
    }
    Ok(duration)
}
