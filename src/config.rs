//! Application configuration loaded from command-line flags.
//!
//! # Flags
//!
//! - `-p`, `--port` (`PORT`): TCP port to listen on (default: 8080)
//! - `-d`, `--delay` (`PROCESSING_DELAY_SECS`): artificial delay in seconds
//!   applied before a response is produced (default: 5)
//!
//! A `.env` file is loaded before parsing, so either flag may also be set
//! through the environment.
//!
//! # Unset Values
//!
//! A value of `0` means "unset" and is replaced by the default the first time
//! it is read. Defaulting never fails: configuration comes from the local
//! operator and is trusted.

use std::ffi::OsString;
use std::time::Duration;

use clap::Parser;
use tracing::{error, warn};

/// Port used when none is configured.
pub const DEFAULT_LISTEN_PORT: u16 = 8080;

/// Processing delay (seconds) used when none is configured.
pub const DEFAULT_PROCESSING_DELAY_SECS: u64 = 5;

/// Interface the listener binds to.
const LISTEN_HOST: &str = "0.0.0.0";

/// Command-line interface.
#[derive(Debug, Parser)]
#[command(name = "hash_service", version, about = "Hash service host")]
pub struct Cli {
    /// Port to listen on
    #[arg(short = 'p', long = "port", env = "PORT", default_value_t = DEFAULT_LISTEN_PORT)]
    pub port: u16,

    /// Amount to delay hash response in seconds
    #[arg(
        short = 'd',
        long = "delay",
        env = "PROCESSING_DELAY_SECS",
        default_value_t = DEFAULT_PROCESSING_DELAY_SECS
    )]
    pub delay: u64,
}

impl Cli {
    /// Load a `.env` file if present, then parse the process arguments.
    ///
    /// Expects tracing to be initialised already: `.env` and usage errors
    /// are logged before clap prints its message and exits.
    pub fn load() -> Self {
        Self::load_from(std::env::args_os()).unwrap_or_else(|e| {
            if e.use_stderr() {
                error!(kind = ?e.kind(), "Invalid command line");
            }
            e.exit()
        })
    }

    /// [`Cli::load`] over explicit arguments, returning usage errors.
    pub fn load_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match dotenvy::dotenv() {
            Err(e) if !e.not_found() => warn!(error = %e, "Failed to load .env file"),
            _ => {}
        }
        Self::try_parse_from(args)
    }
}

/// Application configuration.
///
/// # Example
///
/// ```rust
/// use hash_service::Config;
///
/// let mut config = Config { listen_port: 0, processing_delay_secs: 0 };
/// assert_eq!(config.listen_addr(), "0.0.0.0:8080");
///
/// config.apply_defaults();
/// assert_eq!(config.listen_port, 8080);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// TCP port to bind (0 = unset)
    pub listen_port: u16,

    /// Artificial delay in seconds before producing a response (0 = unset)
    pub processing_delay_secs: u64,
}

impl Config {
    /// Fill unset values with their defaults.
    ///
    /// Idempotent: applying it a second time changes nothing.
    pub fn apply_defaults(&mut self) {
        self.listen_port = self.effective_port();
        self.processing_delay_secs = self.effective_delay_secs();
    }

    /// By-value form of [`Config::apply_defaults`].
    pub fn with_defaults(mut self) -> Self {
        self.apply_defaults();
        self
    }

    /// Bindable listen address, e.g. `0.0.0.0:8080`.
    pub fn listen_addr(&self) -> String {
        format!("{LISTEN_HOST}:{}", self.effective_port())
    }

    /// Processing delay as a [`Duration`].
    pub fn processing_delay(&self) -> Duration {
        Duration::from_secs(self.effective_delay_secs())
    }

    fn effective_port(&self) -> u16 {
        match self.listen_port {
            0 => DEFAULT_LISTEN_PORT,
            port => port,
        }
    }

    fn effective_delay_secs(&self) -> u64 {
        match self.processing_delay_secs {
            0 => DEFAULT_PROCESSING_DELAY_SECS,
            secs => secs,
        }
    }
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            listen_port: cli.port,
            processing_delay_secs: cli.delay,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_LISTEN_PORT,
            processing_delay_secs: DEFAULT_PROCESSING_DELAY_SECS,
        }
    }
}
