//! Server configuration
//!
//! Values come from builder setters or from the environment via
//! [`Config::from_env`]. The listen port resolves in order: explicit
//! port, then `REEF_PORT`, then [`DEFAULT_PORT`].

use crate::pool::DEFAULT_MAX_IDLE;
use crate::{Error, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Port used when neither the config nor the environment names one
pub const DEFAULT_PORT: u16 = 8080;

pub const PORT_ENV: &str = "REEF_PORT";
pub const DEBUG_ENV: &str = "REEF_DEBUG";
pub const CERT_FILE_ENV: &str = "REEF_CERT_FILE";
pub const KEY_FILE_ENV: &str = "REEF_KEY_FILE";

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Explicit listen port; takes precedence over `REEF_PORT`
    pub port: Option<u16>,
    pub hostname: String,
    /// Runtime worker threads
    pub workers: usize,
    /// Log route registration and per-request dispatch details
    pub debug: bool,
    /// PEM certificate chain for the TLS listener
    pub cert_file: Option<PathBuf>,
    /// PEM private key for the TLS listener
    pub key_file: Option<PathBuf>,
    /// Idle objects each pool keeps between requests
    pub max_idle_objects: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: None,
            hostname: "0.0.0.0".to_string(),
            workers: num_cpus::get(),
            debug: false,
            cert_file: None,
            key_file: None,
            max_idle_objects: DEFAULT_MAX_IDLE,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with `REEF_DEBUG`, `REEF_CERT_FILE` and
    /// `REEF_KEY_FILE`
    ///
    /// `REEF_PORT` is consulted later, by [`listen_addr`](Self::listen_addr).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(value) = lookup(DEBUG_ENV) {
            config.debug = parse_flag(&value);
        }
        config.cert_file = lookup(CERT_FILE_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        config.key_file = lookup(KEY_FILE_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        config
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn cert_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cert_file = Some(path.into());
        self
    }

    pub fn key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_file = Some(path.into());
        self
    }

    pub fn max_idle_objects(mut self, max_idle: usize) -> Self {
        self.max_idle_objects = max_idle;
        self
    }

    /// Port after applying the fallback chain
    pub fn resolve_port(&self) -> u16 {
        resolve_port(self.port, std::env::var(PORT_ENV).ok().as_deref())
    }

    /// Socket address the server binds to
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let port = self.resolve_port();
        let addr = if self.hostname.contains(':') {
            format!("[{}]:{}", self.hostname, port)
        } else {
            format!("{}:{}", self.hostname, port)
        };

        addr.parse()
            .map_err(|e| Error::InvalidAddress(format!("{addr}: {e}")))
    }

    /// Certificate and key paths, both required for a TLS listener
    pub fn tls_files(&self) -> Result<(PathBuf, PathBuf)> {
        let cert = self
            .cert_file
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(Error::MissingCertificate)?;
        let key = self
            .key_file
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(Error::MissingPrivateKey)?;
        Ok((cert, key))
    }
}

/// Parse a listen port, rejecting values outside `1..=65535`
pub fn parse_port(value: &str) -> Result<u16> {
    match value.trim().parse::<u32>() {
        Ok(port @ 1..=65535) => Ok(port as u16),
        _ => Err(Error::InvalidPort(value.to_string())),
    }
}

fn resolve_port(explicit: Option<u16>, env: Option<&str>) -> u16 {
    if let Some(port) = explicit.filter(|p| *p != 0) {
        return port;
    }

    if let Some(value) = env {
        match parse_port(value) {
            Ok(port) => return port,
            Err(e) => tracing::debug!(error = %e, "ignoring {}", PORT_ENV),
        }
    }

    DEFAULT_PORT
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
