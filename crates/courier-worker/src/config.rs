//! Worker configuration, loaded from the environment.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port.
    pub port: u16,
    /// Directory holding the session and status documents.
    pub data_dir: PathBuf,
    /// Recipient domain suffix, e.g. `c.us`.
    pub domain_suffix: String,
    /// Pacing window for outbound sends.
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Session backup interval while connected.
    pub backup_interval: Duration,
    /// First reconnect delay after a disconnect.
    pub backoff_initial: Duration,
    /// Cap on the reconnect delay.
    pub backoff_max: Duration,
    /// Reconnect attempt ceiling per episode.
    pub max_reconnect_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            port: 3001,
            data_dir: home.join(".courier-worker"),
            domain_suffix: "c.us".into(),
            min_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(4000),
            backup_interval: Duration::from_secs(300),
            backoff_initial: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
            max_reconnect_attempts: 10,
        }
    }
}

impl Config {
    /// Load configuration from the process environment and create the data
    /// directory.
    ///
    /// # Errors
    /// Returns an error for unparsable values, an inverted pacing window, or
    /// a data directory that cannot be created.
    pub fn load() -> anyhow::Result<Self> {
        let config = Self::from_env(|key| std::env::var(key).ok())?;
        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("cannot create data directory {}", config.data_dir.display())
        })?;
        Ok(config)
    }

    /// Build a config from an environment lookup. Split out from [`load`]
    /// so tests can inject variables without touching the process env.
    pub fn from_env(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(port) = get("PORT") {
            config.port = port.parse().context("PORT must be a port number")?;
        }
        if let Some(dir) = get("COURIER_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(suffix) = get("COURIER_DOMAIN_SUFFIX") {
            config.domain_suffix = suffix;
        }
        if let Some(ms) = get("COURIER_MIN_DELAY_MS") {
            config.min_delay = Duration::from_millis(
                ms.parse().context("COURIER_MIN_DELAY_MS must be milliseconds")?,
            );
        }
        if let Some(ms) = get("COURIER_MAX_DELAY_MS") {
            config.max_delay = Duration::from_millis(
                ms.parse().context("COURIER_MAX_DELAY_MS must be milliseconds")?,
            );
        }
        if let Some(secs) = get("COURIER_BACKUP_INTERVAL_SECS") {
            config.backup_interval = Duration::from_secs(
                secs.parse()
                    .context("COURIER_BACKUP_INTERVAL_SECS must be seconds")?,
            );
        }
        if let Some(ms) = get("COURIER_BACKOFF_INITIAL_MS") {
            config.backoff_initial = Duration::from_millis(
                ms.parse()
                    .context("COURIER_BACKOFF_INITIAL_MS must be milliseconds")?,
            );
        }
        if let Some(ms) = get("COURIER_BACKOFF_MAX_MS") {
            config.backoff_max = Duration::from_millis(
                ms.parse()
                    .context("COURIER_BACKOFF_MAX_MS must be milliseconds")?,
            );
        }
        if let Some(attempts) = get("COURIER_MAX_RECONNECT_ATTEMPTS") {
            config.max_reconnect_attempts = attempts
                .parse()
                .context("COURIER_MAX_RECONNECT_ATTEMPTS must be a count")?;
        }

        anyhow::ensure!(
            config.backoff_initial <= config.backoff_max,
            "backoff window is inverted: initial {}ms > max {}ms",
            config.backoff_initial.as_millis(),
            config.backoff_max.as_millis()
        );
        anyhow::ensure!(
            config.min_delay <= config.max_delay,
            "pacing window is inverted: min {}ms > max {}ms",
            config.min_delay.as_millis(),
            config.max_delay.as_millis()
        );
        Ok(config)
    }
}
