//! Server configuration from the environment.

use std::path::PathBuf;

use anyhow::Context;

/// Environment variable name for the host address.
pub const HOST_ENV_VAR: &str = "MOCKUP_HOST";
/// Environment variable name for the port number.
pub const PORT_ENV_VAR: &str = "MOCKUP_PORT";
/// Environment variable name for the directory rendered mockups are written to.
pub const RESULTS_DIR_ENV_VAR: &str = "MOCKUP_RESULTS_DIR";
/// Environment variable name for the request body limit in bytes.
pub const MAX_UPLOAD_ENV_VAR: &str = "MOCKUP_MAX_UPLOAD_BYTES";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_RESULTS_DIR: &str = "results";
/// Two full-size phone photos fit comfortably.
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub results_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    /// Reads the process environment, falling back to defaults for unset variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let host = lookup(HOST_ENV_VAR).unwrap_or(defaults.host);
        let port = match lookup(PORT_ENV_VAR) {
            Some(raw) => raw.parse::<u16>().context(format!("Invalid {PORT_ENV_VAR} value: {raw}"))?,
            None => defaults.port,
        };
        let results_dir = lookup(RESULTS_DIR_ENV_VAR).map(PathBuf::from).unwrap_or(defaults.results_dir);
        let max_upload_bytes = match lookup(MAX_UPLOAD_ENV_VAR) {
            Some(raw) => raw
                .parse::<usize>()
                .context(format!("Invalid {MAX_UPLOAD_ENV_VAR} value: {raw}"))?,
            None => defaults.max_upload_bytes,
        };

        Ok(Self { host, port, results_dir, max_upload_bytes })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
