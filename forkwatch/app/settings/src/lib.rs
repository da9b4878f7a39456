// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Deserializer};
use std::fmt::{Display, Formatter};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct SocketAddress {
    pub host: String,
    pub port: u32,
}

impl Display for SocketAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl ToSocketAddrs for SocketAddress {
    type Iter = <String as ToSocketAddrs>::Iter;

    fn to_socket_addrs(&self) -> std::io::Result<Self::Iter> {
        self.to_string().to_socket_addrs()
    }
}

impl TryInto<SocketAddr> for SocketAddress {
    type Error = std::io::Error;

    fn try_into(self) -> Result<SocketAddr, Self::Error> {
        self.to_socket_addrs()?
            .next()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::AddrNotAvailable))
    }
}

/// Which flavour of endpoint a client entry speaks.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ClientKind {
    /// Plain JSON-RPC endpoint, reached through `url`.
    Rpc,
    /// Infura, reached through the configured endpoint and key.
    Infura,
    /// Alchemy, reached through the configured endpoint and key.
    Alchemy,
    /// Etherscan REST proxy.
    Etherscan,
    /// Deterministic in-process chains for trying out the dashboard.
    TestnodeCanon,
    TestnodeForkOld,
    TestnodeForkRecent,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientSettings {
    pub name: String,
    pub kind: ClientKind,
    #[serde(default)]
    pub url: String,
    /// Allowed RPC operations per second; 0 means unlimited.
    #[serde(default)]
    pub ratelimit: u32,
    /// Extra `key: value` headers sent with every request.
    #[serde(default)]
    pub auth_headers: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsSettings {
    pub enabled: bool,
    /// HTTP listen address where Prometheus metrics are hosted.
    pub listen: SocketAddress,
    #[serde(default)]
    pub namespace: String,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: SocketAddress {
                host: "127.0.0.1".to_string(),
                port: 9187,
            },
            namespace: String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// How often to run a round of checks.
    #[serde(
        default = "default_reload_interval",
        deserialize_with = "duration_str"
    )]
    pub reload_interval: Duration,
    /// Listen address of the dashboard; empty disables it.
    #[serde(default)]
    pub server_address: String,
    /// Label used in the report and the page title.
    #[serde(default)]
    pub chain_name: String,

    #[serde(default)]
    pub infura_key: String,
    #[serde(default = "default_infura_endpoint")]
    pub infura_endpoint: String,
    #[serde(default)]
    pub alchemy_key: String,
    #[serde(default = "default_alchemy_endpoint")]
    pub alchemy_endpoint: String,
    #[serde(default)]
    pub etherscan_key: String,
    #[serde(default = "default_etherscan_endpoint")]
    pub etherscan_endpoint: String,

    /// Header database location.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Directory the report artifacts are written to and served from.
    #[serde(default = "default_www_root")]
    pub www_root: PathBuf,

    #[serde(default)]
    pub metrics: MetricsSettings,
    #[serde(default)]
    pub clients: Vec<ClientSettings>,
}

fn default_reload_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_infura_endpoint() -> String {
    "https://mainnet.infura.io/v3/".to_string()
}

fn default_alchemy_endpoint() -> String {
    "https://eth-mainnet.alchemyapi.io/v2/".to_string()
}

fn default_etherscan_endpoint() -> String {
    "https://api.etherscan.io/api".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("blockdb")
}

fn default_www_root() -> PathBuf {
    PathBuf::from("www")
}

/// Durations are given as strings like "10s" or "1m 30s".
fn duration_str<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
}

impl Settings {
    /// Load the configuration file, apply overrides from the local
    /// environment (with a prefix of FW), and parse it.
    ///
    /// e.g. `FW_CHAIN_NAME=goerli forkwatch run monitor.toml` overrides
    /// the chain label.
    pub fn new(config_file: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(config_file))
            .add_source(
                Environment::with_prefix("fw")
                    .prefix_separator("_")
                    .separator("__")
                    .ignore_empty(true),
            )
            .build()?
            .try_deserialize()
    }
}

// Run these tests serially because some of them modify the environment.
#[serial_test::serial]
#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use super::{ClientKind, Settings};

    const EXAMPLE: &str = r#"
reload_interval = "10s"
server_address = "localhost:8080"
chain_name = "mainnet"
etherscan_key = "apikey"

[metrics]
enabled = true
listen = { host = "127.0.0.1", port = 9187 }

[[clients]]
name = "geth-local"
kind = "rpc"
url = "http://localhost:8545"
ratelimit = 10

[[clients]]
name = "scan"
kind = "etherscan"

[[clients]]
name = "testchain"
kind = "testnode-canon"
"#;

    fn parse(toml: &str) -> Settings {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        f.write_all(toml.as_bytes()).unwrap();
        Settings::new(f.path()).expect("failed to parse settings")
    }

    #[test]
    fn parses_the_example() {
        let settings = parse(EXAMPLE);
        assert_eq!(settings.reload_interval, Duration::from_secs(10));
        assert_eq!(settings.chain_name, "mainnet");
        assert_eq!(settings.clients.len(), 3);
        assert_eq!(settings.clients[0].kind, ClientKind::Rpc);
        assert_eq!(settings.clients[0].ratelimit, 10);
        assert_eq!(settings.clients[1].kind, ClientKind::Etherscan);
        assert_eq!(settings.clients[2].kind, ClientKind::TestnodeCanon);
        assert!(settings.metrics.enabled);
        assert_eq!(settings.metrics.listen.to_string(), "127.0.0.1:9187");
    }

    #[test]
    fn defaults_fill_the_gaps() {
        let settings = parse("chain_name = \"x\"\n");
        assert_eq!(settings.reload_interval, Duration::from_secs(10));
        assert!(settings.server_address.is_empty());
        assert_eq!(settings.db_path.to_str(), Some("blockdb"));
        assert_eq!(settings.www_root.to_str(), Some("www"));
        assert!(!settings.metrics.enabled);
        assert!(settings.clients.is_empty());
    }

    #[test]
    fn duration_strings_are_parsed() {
        let settings = parse("reload_interval = \"1m 30s\"\n");
        assert_eq!(settings.reload_interval, Duration::from_secs(90));
    }

    #[test]
    fn rejects_bad_durations() {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        f.write_all(b"reload_interval = \"ten seconds\"\n").unwrap();
        assert!(Settings::new(f.path()).is_err());
    }

    #[test]
    fn environment_overrides_the_file() {
        std::env::set_var("FW_CHAIN_NAME", "goerli");
        let settings = parse(EXAMPLE);
        std::env::remove_var("FW_CHAIN_NAME");
        assert_eq!(settings.chain_name, "goerli");
    }
}
