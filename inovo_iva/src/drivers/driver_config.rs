use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use crate::IvaError;

pub const DEFAULT_PORT: u16 = 50003;
pub const DEFAULT_PROCEDURE: &str = "iva";

/// Where the control process listens for the IVA runtime, and which runtime
/// procedure to start.
///
/// ```rust
/// use inovo_iva::drivers::IvaConfig;
///
/// let config = IvaConfig::new("0.0.0.0", 50003);
/// config.validate().unwrap();
/// assert_eq!(config.bind_address(), "0.0.0.0:50003");
///
/// let from_file = IvaConfig::from_json(r#"{ "port": 50010, "procedure": "cell_a" }"#).unwrap();
/// assert_eq!(from_file.host, "0.0.0.0");
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct IvaConfig {
    /// Local address to bind; `0.0.0.0` listens on every interface.
    pub host: String,
    pub port: u16,
    /// Runtime procedure that connects back to us.
    pub procedure: String,
    /// Pause between failed accepts.
    pub accept_retry_delay_ms: u64,
}

impl IvaConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_procedure(mut self, procedure: impl Into<String>) -> Self {
        self.procedure = procedure.into();
        self
    }

    pub fn from_json(json: &str) -> Result<Self, IvaError> {
        let config: Self = serde_json::from_str(json).map_err(|e| IvaError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Port 0 is allowed and binds an ephemeral port.
    pub fn validate(&self) -> Result<(), IvaError> {
        if self.host.is_empty() {
            return Err(IvaError::Config("host cannot be empty".to_string()));
        }
        if self.procedure.is_empty() {
            return Err(IvaError::Config("procedure name cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn accept_retry_delay(&self) -> Duration {
        Duration::from_millis(self.accept_retry_delay_ms)
    }

    /// Resolves the bind address, accepting DNS names as well as IPs.
    pub fn resolve(&self) -> Result<SocketAddr, IvaError> {
        let address = self.bind_address();
        address
            .to_socket_addrs()
            .map_err(|e| IvaError::Config(format!("invalid address `{}`: {}", address, e)))?
            .next()
            .ok_or_else(|| IvaError::Config(format!("could not resolve `{}`", address)))
    }
}

impl Default for IvaConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            procedure: DEFAULT_PROCEDURE.to_string(),
            accept_retry_delay_ms: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_runtime() {
        let config = IvaConfig::default();
        assert_eq!(config.port, 50003);
        assert_eq!(config.procedure, "iva");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_host() {
        let config = IvaConfig::new("", 50003);
        assert!(matches!(config.validate(), Err(IvaError::Config(_))));
        assert!(IvaConfig::from_json(r#"{ "procedure": "" }"#).is_err());
    }

    #[test]
    fn resolves_loopback() {
        let addr = IvaConfig::new("127.0.0.1", 50010).resolve().unwrap();
        assert_eq!(addr.port(), 50010);
        assert!(addr.ip().is_loopback());
    }
}
