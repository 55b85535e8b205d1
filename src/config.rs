use crate::managers::timer::{Clock, SystemClock};
use crate::services::{poll::PollConfig, session::SessionConfig};
use color_eyre::eyre::{Report, WrapErr};
use std::env;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_PUBLIC_URL: &str = "http://localhost:8080";
const DEFAULT_QR_ENDPOINT: &str = "https://api.qrserver.com/v1/create-qr-code/?size=200x200&data=";

#[derive(Clone)]
pub struct Config {
    pub bind: String,
    pub public_url: String,
    pub qr_endpoint: String,
    /// How often observers re-read the ledger.
    pub sync_interval: Duration,
    pub tick_interval: Duration,
    pub submit_delay: Duration,
    pub clock: Arc<dyn Clock>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_owned(),
            public_url: DEFAULT_PUBLIC_URL.to_owned(),
            qr_endpoint: DEFAULT_QR_ENDPOINT.to_owned(),
            sync_interval: Duration::from_millis(500),
            tick_interval: Duration::from_millis(1000),
            submit_delay: Duration::from_millis(200),
            clock: Arc::new(SystemClock),
        }
    }
}

impl Config {
    /// Reads `LIVEPOLL_*` variables. Call `dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, Report> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Report>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let millis = |name: &str, default: Duration| -> Result<Duration, Report> {
            match lookup(name) {
                Some(value) => value
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .wrap_err_with(|| format!("{} must be a number of milliseconds, got {:?}", name, value)),
                None => Ok(default),
            }
        };
        Ok(Self {
            bind: lookup("LIVEPOLL_BIND").unwrap_or(defaults.bind),
            public_url: lookup("LIVEPOLL_PUBLIC_URL").unwrap_or(defaults.public_url),
            qr_endpoint: lookup("LIVEPOLL_QR_ENDPOINT").unwrap_or(defaults.qr_endpoint),
            sync_interval: millis("LIVEPOLL_SYNC_INTERVAL_MS", defaults.sync_interval)?,
            tick_interval: millis("LIVEPOLL_TICK_INTERVAL_MS", defaults.tick_interval)?,
            submit_delay: millis("LIVEPOLL_SUBMIT_DELAY_MS", defaults.submit_delay)?,
            clock: defaults.clock,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            clock: self.clock.clone(),
            tick_interval: self.tick_interval,
            submit_delay: self.submit_delay,
        }
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            public_url: self.public_url.clone(),
            qr_endpoint: self.qr_endpoint.clone(),
            clock: self.clock.clone(),
            tick_interval: self.tick_interval,
        }
    }
}
