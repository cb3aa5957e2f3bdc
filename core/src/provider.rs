//! Connection parameters for the gateway.
//!
//! # Design
//! A `Provider` is always complete: every field is resolved when it is built,
//! with omitted inputs taking the built-in default rather than any previous
//! value. Inputs come in three shapes (typed `ProviderOptions`, a dynamic
//! `serde_json::Value`, or the process environment) and all of them funnel
//! through `Provider::from_options` so validation lives in one place.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_BASE: &str = "/api/v0";

/// URL scheme used to reach the gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => f.write_str("http"),
            Protocol::Https => f.write_str("https"),
        }
    }
}

impl FromStr for Protocol {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(GatewayError::Config(format!("unknown protocol '{other}'"))),
        }
    }
}

/// Caller-supplied provider settings. Every field is optional; unknown keys
/// are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinning: Option<bool>,
}

/// Fully resolved connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    pub base: String,
    /// Append `?pin=true` to `/add` calls.
    pub pinning: bool,
}

impl Default for Provider {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            protocol: Protocol::Http,
            base: DEFAULT_BASE.to_string(),
            pinning: true,
        }
    }
}

impl Provider {
    /// Resolve options against the defaults.
    pub fn from_options(options: ProviderOptions) -> Result<Self, GatewayError> {
        let defaults = Provider::default();
        let provider = Provider {
            host: options.host.unwrap_or(defaults.host),
            port: options.port.unwrap_or(defaults.port),
            protocol: options.protocol.unwrap_or(defaults.protocol),
            base: options.base.unwrap_or(defaults.base),
            pinning: options.pinning.unwrap_or(defaults.pinning),
        };
        provider.validate()?;
        Ok(provider)
    }

    /// Resolve a dynamically shaped value. `null` means "all defaults"; any
    /// other non-object value is rejected.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, GatewayError> {
        let options = match value {
            serde_json::Value::Null => ProviderOptions::default(),
            serde_json::Value::Object(_) => ProviderOptions::deserialize(value)
                .map_err(|e| GatewayError::Config(e.to_string()))?,
            other => {
                return Err(GatewayError::Config(format!(
                    "provider must be an object, got {}",
                    json_type_name(other)
                )))
            }
        };
        Self::from_options(options)
    }

    /// Resolve from `GATEWAY_HOST`, `GATEWAY_PORT`, `GATEWAY_PROTOCOL`,
    /// `GATEWAY_BASE` and `GATEWAY_PINNING`.
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GatewayError> {
        let port = lookup("GATEWAY_PORT")
            .map(|raw| {
                raw.parse::<u16>()
                    .map_err(|e| GatewayError::Config(format!("GATEWAY_PORT '{raw}': {e}")))
            })
            .transpose()?;
        let protocol = lookup("GATEWAY_PROTOCOL").map(|raw| raw.parse::<Protocol>()).transpose()?;
        let pinning = lookup("GATEWAY_PINNING")
            .map(|raw| {
                raw.parse::<bool>()
                    .map_err(|e| GatewayError::Config(format!("GATEWAY_PINNING '{raw}': {e}")))
            })
            .transpose()?;
        Self::from_options(ProviderOptions {
            host: lookup("GATEWAY_HOST"),
            port,
            protocol,
            base: lookup("GATEWAY_BASE"),
            pinning,
        })
    }

    fn validate(&self) -> Result<(), GatewayError> {
        if self.host.trim().is_empty() {
            return Err(GatewayError::Config("host must not be empty".to_string()));
        }
        if !self.base.starts_with('/') {
            return Err(GatewayError::Config(format!(
                "base '{}' must start with '/'",
                self.base
            )));
        }
        Ok(())
    }

    /// `<protocol>://<host>:<port><base>`
    pub fn request_base(&self) -> String {
        format!("{}://{}:{}{}", self.protocol, self.host, self.port, self.base)
    }

    /// Full URL for `uri`. The uri is appended verbatim.
    pub fn url_for(&self, uri: &str) -> String {
        let pin = if self.pinning && uri == "/add" { "?pin=true" } else { "" };
        format!("{}{uri}{pin}", self.request_base())
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
