//! Configuration module for billing nodes
//!
//! Loads TOML files, applies `BILLING_*` environment overrides (a `.env`
//! file is honoured) and validates the result.

use crate::errors::{FlowError, FlowResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node: NodeConfig,

    /// The ordering authority is named here, never looked up ambiently
    pub notary: NotaryConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,

    #[serde(default)]
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Legal name of this node (the billing state holder)
    pub name: String,

    /// Legal name of the issuer counter-party
    pub issuer_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotaryConfig {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long to wait for any single counter-party message
    #[serde(default = "default_session_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    #[serde(default)]
    pub json_logs: bool,
}

/// Parameters for the simulated return scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "default_billing_amount")]
    pub billing_amount: i64,

    #[serde(default)]
    pub chip_amounts: Vec<i64>,

    /// External id given to the issued billing state
    #[serde(default = "default_external_id")]
    pub external_id: String,
}

fn default_session_timeout_ms() -> u64 { 30_000 }
fn default_true() -> bool { true }
fn default_billing_amount() -> i64 { 1_000 }
fn default_external_id() -> String { "42".to_string() }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_session_timeout_ms(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: default_true(),
            json_logs: false,
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            billing_amount: default_billing_amount(),
            chip_amounts: Vec::new(),
            external_id: default_external_id(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node: NodeConfig {
                name: "O=Holder,L=London,C=GB".to_string(),
                issuer_name: "O=Issuer,L=New York,C=US".to_string(),
            },
            notary: NotaryConfig {
                name: "O=Notary,L=Zurich,C=CH".to_string(),
            },
            session: SessionConfig::default(),
            monitoring: MonitoringConfig::default(),
            demo: DemoConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// `BILLING_NODE_NAME`, `BILLING_ISSUER_NAME`, `BILLING_NOTARY_NAME`,
    /// `BILLING_SESSION_TIMEOUT_MS`
    pub fn apply_env_overrides(&mut self) -> FlowResult<()> {
        if let Ok(v) = std::env::var("BILLING_NODE_NAME") {
            self.node.name = v;
        }
        if let Ok(v) = std::env::var("BILLING_ISSUER_NAME") {
            self.node.issuer_name = v;
        }
        if let Ok(v) = std::env::var("BILLING_NOTARY_NAME") {
            self.notary.name = v;
        }
        if let Ok(v) = std::env::var("BILLING_SESSION_TIMEOUT_MS") {
            self.session.timeout_ms = v.parse().map_err(|_| {
                FlowError::Configuration(format!("BILLING_SESSION_TIMEOUT_MS is not a number: {}", v))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> FlowResult<()> {
        let names = [&self.node.name, &self.node.issuer_name, &self.notary.name];
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(FlowError::Configuration("party names must not be empty".to_string()));
        }
        if self.node.name == self.node.issuer_name {
            return Err(FlowError::Configuration(
                "node and issuer must be different parties".to_string(),
            ));
        }
        if self.notary.name == self.node.name || self.notary.name == self.node.issuer_name {
            return Err(FlowError::Configuration(
                "notary must not be a billing participant".to_string(),
            ));
        }
        if self.session.timeout_ms == 0 {
            return Err(FlowError::Configuration("session timeout must be positive".to_string()));
        }
        if self.demo.billing_amount < 0 || self.demo.chip_amounts.iter().any(|a| *a < 0) {
            return Err(FlowError::Configuration("amounts must not be negative".to_string()));
        }
        Ok(())
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_from_file_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[node]
name = "Holder"
issuer_name = "Issuer"

[notary]
name = "Notary"

[demo]
chip_amounts = [10, 20]
"#
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.node.name, "Holder");
        assert_eq!(config.session.timeout_ms, 30_000);
        assert!(config.monitoring.enable_metrics);
        assert_eq!(config.demo.chip_amounts, vec![10, 20]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.notary.name = config.node.issuer_name.clone();
        assert!(matches!(config.validate(), Err(FlowError::Configuration(_))));

        let mut config = Config::default();
        config.session.timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.demo.chip_amounts = vec![5, -1];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.node.issuer_name = config.node.name.clone();
        assert!(config.validate().is_err());
    }
}
