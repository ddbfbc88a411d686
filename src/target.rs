//! Where alert digests are delivered.

use crate::error::ConfigError;
use std::fmt;

/// Product name used in digest subjects unless overridden.
pub const DEFAULT_PRODUCT: &str = "LOGFAN";

/// Login for the mail server. `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Immutable delivery configuration for one alert sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTarget {
    host: String,
    port: u16,
    credentials: Credentials,
    sender: String,
    recipients: Vec<String>,
    station_id: String,
    product: String,
}

impl DeliveryTarget {
    /// Build a target from raw configuration values.
    ///
    /// `server` must be `host:port` or `[ipv6]:port`. `recipients` is a comma and/or semicolon
    /// separated list; entries are trimmed and deduplicated keeping first occurrence order.
    pub fn new(
        server: &str,
        credentials: Credentials,
        sender: impl Into<String>,
        recipients: &str,
        station_id: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let (host, port) = split_server(server)?;
        let recipients = parse_recipients(recipients);
        if recipients.is_empty() {
            return Err(ConfigError::NoRecipients);
        }
        Ok(Self {
            host,
            port,
            credentials,
            sender: sender.into(),
            recipients,
            station_id: station_id.into(),
            product: DEFAULT_PRODUCT.to_string(),
        })
    }

    /// Override the product name shown in subjects.
    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = product.into();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    /// `"[<STATION>] Error log sent by <product>"`.
    pub fn subject(&self) -> String {
        format!("[{}] Error log sent by {}", self.station_id.to_uppercase(), self.product)
    }

    /// Subject of the separate CRITICAL-only message.
    pub fn critical_subject(&self) -> String {
        format!("[{}] CRITICAL log sent by {}", self.station_id.to_uppercase(), self.product)
    }
}

/// `host:port`, or `[v6-address]:port`. A bare host may not contain `:`.
fn split_server(server: &str) -> Result<(String, u16), ConfigError> {
    let server = server.trim();
    let invalid = || ConfigError::InvalidServerAddress(server.to_string());
    let (host, port) = match server.strip_prefix('[') {
        Some(bracketed) => bracketed.split_once("]:").ok_or_else(invalid)?,
        None => server.split_once(':').ok_or_else(invalid)?,
    };
    let (host, port) = (host.trim(), port.trim());
    if host.is_empty() || port.is_empty() || port.contains(':') {
        return Err(invalid());
    }
    let port = port.parse::<u16>().map_err(|_| ConfigError::InvalidPort {
        address: server.to_string(),
        port: port.to_string(),
    })?;
    Ok((host.to_string(), port))
}

/// Split, trim and deduplicate a recipient list.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for addr in raw.split([',', ';']).map(str::trim).filter(|a| !a.is_empty()) {
        if !out.iter().any(|seen| seen == addr) {
            out.push(addr.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("station@example.org", "hunter2")
    }

    #[test]
    fn parses_server_and_recipients() {
        let target = DeliveryTarget::new(
            "smtp.example.org:587",
            creds(),
            "station@example.org",
            " ops@example.org; dev@example.org ,ops@example.org,,",
            "msp1",
        )
        .unwrap();
        assert_eq!(target.host(), "smtp.example.org");
        assert_eq!(target.port(), 587);
        assert_eq!(target.recipients(), ["ops@example.org", "dev@example.org"]);
        assert_eq!(target.subject(), "[MSP1] Error log sent by LOGFAN");
    }

    #[test]
    fn product_name_is_configurable() {
        let target = DeliveryTarget::new("h:25", creds(), "a@b", "c@d", "aao")
            .unwrap()
            .with_product("PANEL");
        assert_eq!(target.subject(), "[AAO] Error log sent by PANEL");
        assert_eq!(target.critical_subject(), "[AAO] CRITICAL log sent by PANEL");
    }

    #[test]
    fn rejects_missing_port() {
        let err = DeliveryTarget::new("smtp.example.org", creds(), "a@b", "c@d", "x").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidServerAddress(_)));
        let err = DeliveryTarget::new(":25", creds(), "a@b", "c@d", "x").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidServerAddress(_)));
    }

    #[test]
    fn rejects_extra_colons_outside_brackets() {
        let err = DeliveryTarget::new("host:25:26", creds(), "a@b", "c@d", "x").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidServerAddress(_)));
        let err = DeliveryTarget::new("::1:25", creds(), "a@b", "c@d", "x").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidServerAddress(_)));
    }

    #[test]
    fn bracketed_ipv6_host_is_accepted() {
        let target = DeliveryTarget::new("[::1]:2525", creds(), "a@b", "c@d", "x").unwrap();
        assert_eq!(target.host(), "::1");
        assert_eq!(target.port(), 2525);
        let err = DeliveryTarget::new("[::1]", creds(), "a@b", "c@d", "x").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidServerAddress(_)));
    }

    #[test]
    fn rejects_non_numeric_port() {
        let err = DeliveryTarget::new("host:smtp", creds(), "a@b", "c@d", "x").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { .. }));
    }

    #[test]
    fn rejects_empty_recipients() {
        let err = DeliveryTarget::new("host:25", creds(), "a@b", " ; , ", "x").unwrap_err();
        assert!(matches!(err, ConfigError::NoRecipients));
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let shown = format!("{:?}", creds());
        assert!(shown.contains("station@example.org"));
        assert!(!shown.contains("hunter2"));
    }
}
