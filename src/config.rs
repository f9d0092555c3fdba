use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ScraperError;

const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_NETWORK_IDLE: Duration = Duration::from_millis(500);
const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub headless: bool,
    /// Chrome/Chromium binary. `None` lets chromiumoxide search the usual locations.
    pub chrome_executable: Option<PathBuf>,
    pub no_sandbox: bool,
    /// Upper bound on a single navigation, network-idle wait included.
    pub navigation_timeout: Duration,
    /// Quiet period with no in-flight requests that counts as network idle.
    pub network_idle: Duration,
    /// How long to wait for already-delivered responses to finish reading
    /// once navigation has settled.
    pub settle_timeout: Duration,
    /// Per-command CDP timeout.
    pub request_timeout: Duration,
    pub server_addr: SocketAddr,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_executable: None,
            no_sandbox: false,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            network_idle: DEFAULT_NETWORK_IDLE,
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            server_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
        }
    }
}

impl ScraperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the configuration from the process environment. Unset variables
    /// keep their defaults; malformed ones are an error.
    pub fn from_env() -> Result<Self, ScraperError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ScraperError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(headless) = lookup("HEADLESS") {
            config.headless = parse_bool("HEADLESS", &headless)?;
        }
        if let Some(no_sandbox) = lookup("NO_SANDBOX") {
            config.no_sandbox = parse_bool("NO_SANDBOX", &no_sandbox)?;
        }
        config.chrome_executable = lookup("CHROME_PATH")
            .or_else(|| lookup("CHROMIUM_PATH"))
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        if let Some(secs) = lookup("NAVIGATION_TIMEOUT_SECS") {
            config.navigation_timeout =
                Duration::from_secs(parse_number("NAVIGATION_TIMEOUT_SECS", &secs)?);
        }
        if let Some(ms) = lookup("NETWORK_IDLE_MS") {
            config.network_idle = Duration::from_millis(parse_number("NETWORK_IDLE_MS", &ms)?);
        }
        if let Some(ms) = lookup("SETTLE_TIMEOUT_MS") {
            config.settle_timeout = Duration::from_millis(parse_number("SETTLE_TIMEOUT_MS", &ms)?);
        }
        if let Some(secs) = lookup("CDP_REQUEST_TIMEOUT_SECS") {
            config.request_timeout =
                Duration::from_secs(parse_number("CDP_REQUEST_TIMEOUT_SECS", &secs)?);
        }

        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let ip = IpAddr::from_str(host.trim())
            .map_err(|e| ScraperError::Config(format!("invalid HOST {:?}: {}", host, e)))?;
        let port = match lookup("PORT") {
            Some(port) => port
                .trim()
                .parse::<u16>()
                .map_err(|e| ScraperError::Config(format!("invalid PORT {:?}: {}", port, e)))?,
            None => DEFAULT_PORT,
        };
        config.server_addr = SocketAddr::new(ip, port);

        Ok(config)
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_executable = Some(path.into());
        self
    }

    pub fn with_no_sandbox(mut self, no_sandbox: bool) -> Self {
        self.no_sandbox = no_sandbox;
        self
    }

    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    pub fn with_network_idle(mut self, idle: Duration) -> Self {
        self.network_idle = idle;
        self
    }

    pub fn with_settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = timeout;
        self
    }

    pub fn with_server_addr(mut self, addr: SocketAddr) -> Self {
        self.server_addr = addr;
        self
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ScraperError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ScraperError::Config(format!(
            "invalid {}: expected a boolean, got {:?}",
            key, other
        ))),
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64, ScraperError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| ScraperError::Config(format!("invalid {} {:?}: {}", key, value, e)))
}
