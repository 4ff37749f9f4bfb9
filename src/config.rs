//! Host list and timeout configuration, loadable from a YAML file.
//!
//! Gearman itself has no YAML-based wire format (unlike beanstalkd's
//! `stats`/`list-tubes` admin responses), so this is the one place the
//! `serde`/`serde_yaml` pair earns its keep in this crate: as a convenience
//! for loading a server list from a config file rather than hardcoding it.

use std::time::Duration;

use serde::Deserialize;

/// Default Gearman job server TCP port.
pub const DEFAULT_PORT: u16 = 4730;
/// Default timeout for a single admin request/response round trip.
pub const DEFAULT_ADMIN_TIMEOUT: Duration = Duration::from_secs(10);
/// Default timeout for one worker poll iteration.
pub const DEFAULT_WORKER_POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// A single `host[:port]` server entry.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ServerAddr {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl ServerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl From<(&str, u16)> for ServerAddr {
    fn from((host, port): (&str, u16)) -> Self {
        Self::new(host, port)
    }
}

/// Configuration shared by the client, worker, and admin front-ends.
///
/// Only `servers` is required; the rest default to the values Gearman
/// clients conventionally use.
#[derive(Clone, Debug, Deserialize)]
pub struct GearmanConfig {
    pub servers: Vec<ServerAddr>,
    #[serde(default = "default_admin_timeout_secs")]
    pub admin_timeout_secs: f64,
    #[serde(default = "default_worker_poll_timeout_secs")]
    pub worker_poll_timeout_secs: f64,
}

fn default_admin_timeout_secs() -> f64 {
    DEFAULT_ADMIN_TIMEOUT.as_secs_f64()
}

fn default_worker_poll_timeout_secs() -> f64 {
    DEFAULT_WORKER_POLL_TIMEOUT.as_secs_f64()
}

impl GearmanConfig {
    pub fn new(servers: Vec<ServerAddr>) -> Self {
        Self {
            servers,
            admin_timeout_secs: DEFAULT_ADMIN_TIMEOUT.as_secs_f64(),
            worker_poll_timeout_secs: DEFAULT_WORKER_POLL_TIMEOUT.as_secs_f64(),
        }
    }

    /// Parses a config file in YAML format.
    ///
    /// ```yaml
    /// servers:
    ///   - host: 127.0.0.1
    ///     port: 4730
    /// admin_timeout_secs: 10
    /// ```
    pub fn from_yaml(input: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(input)
    }

    pub fn admin_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.admin_timeout_secs)
    }

    pub fn worker_poll_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.worker_poll_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_yaml() {
        let cfg = GearmanConfig::from_yaml(
            "servers:\n  - host: 127.0.0.1\n    port: 4730\n",
        )
        .unwrap();
        assert_eq!(cfg.servers, vec![ServerAddr::new("127.0.0.1", 4730)]);
        assert_eq!(cfg.admin_timeout(), DEFAULT_ADMIN_TIMEOUT);
        assert_eq!(cfg.worker_poll_timeout(), DEFAULT_WORKER_POLL_TIMEOUT);
    }

    #[test]
    fn parses_overridden_timeouts() {
        let cfg = GearmanConfig::from_yaml(
            "servers:\n  - host: job1\n    port: 5000\nadmin_timeout_secs: 2.5\n",
        )
        .unwrap();
        assert_eq!(cfg.admin_timeout_secs, 2.5);
        assert_eq!(cfg.servers[0].port, 5000);
    }
}
