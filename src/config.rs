//! Configuration for the x402 facilitator server.
//!
//! Resolved from a JSON file (default `config.json`, overridable via
//! `--config`/`CONFIG`), with individual string fields optionally deferring
//! to an environment variable via `$VAR`/`${VAR}` syntax (see
//! [`LiteralOrEnv`]). `dotenvy` loads a `.env` file before resolution.

use alloy_primitives::{Address, B256};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "x402-facilitator")]
#[command(about = "x402 facilitator HTTP server")]
pub struct CliArgs {
    /// Path to the JSON configuration file.
    #[arg(long, short, env = "CONFIG", default_value = "config.json")]
    pub config: PathBuf,
}

/// A transparent wrapper that resolves environment variables during
/// deserialization. Supports literal values (`"0xcafe..."`) and environment
/// variable references (`"$PRIVATE_KEY"` or `"${PRIVATE_KEY}"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(pub T);

impl<T> LiteralOrEnv<T> {
    pub fn into_inner(self) -> T {
        self.0
    }

    fn parse_env_var_syntax(s: &str) -> Option<String> {
        if let Some(inner) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
            Some(inner.to_string())
        } else if let Some(var_name) = s.strip_prefix('$') {
            if !var_name.is_empty() && var_name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                Some(var_name.to_string())
            } else {
                None
            }
        } else {
            None
        }
    }
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for LiteralOrEnv<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let value = if let Some(var_name) = Self::parse_env_var_syntax(&s) {
            std::env::var(&var_name).map_err(|_| {
                serde::de::Error::custom(format!(
                    "environment variable '{var_name}' not found (referenced as '{s}')"
                ))
            })?
        } else {
            s
        };
        let parsed = value
            .parse::<T>()
            .map_err(|e| serde::de::Error::custom(format!("failed to parse value: {e}")))?;
        Ok(LiteralOrEnv(parsed))
    }
}

impl<T: Serialize> Serialize for LiteralOrEnv<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// A validated 32-byte EVM private key.
#[derive(Clone, Copy, Debug)]
pub struct EvmPrivateKey(pub B256);

impl FromStr for EvmPrivateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B256::from_str(s)
            .map(Self)
            .map_err(|e| format!("invalid EVM private key: {e}"))
    }
}

mod config_defaults {
    use std::net::IpAddr;

    pub fn default_port() -> u16 {
        std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080)
    }

    pub fn default_host() -> IpAddr {
        std::env::var("HOST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| "0.0.0.0".parse().unwrap())
    }

    pub fn default_max_timeout_seconds() -> u64 {
        60
    }

    pub fn default_settlement_timeout_secs() -> u64 {
        120
    }
}

/// The facilitator's eip155 chain: one RPC, one token, one signing identity.
#[derive(Debug, Clone, Deserialize)]
pub struct Eip155ChainConfig {
    pub chain_id: u64,
    pub rpc_url: Url,
    pub facilitator_private_key: LiteralOrEnv<EvmPrivateKey>,
    pub token_contract_address: Address,
    pub token_decimals: u8,
    pub token_name: String,
    pub token_version: String,
    #[serde(default)]
    pub max_gas_price_gwei: Option<u64>,
}

impl Eip155ChainConfig {
    pub fn network_id(&self) -> String {
        format!("eip155:{}", self.chain_id)
    }
}

/// Configuration consumed by the resource-server middleware (§4.5, §6).
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceServerConfig {
    pub resource_server_address: Address,
    pub facilitator_url: Url,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "config_defaults::default_port")]
    pub port: u16,
    #[serde(default = "config_defaults::default_host")]
    pub host: IpAddr,
    pub chain: Eip155ChainConfig,
    #[serde(default)]
    pub resource_server: Option<ResourceServerConfig>,
    #[serde(default = "config_defaults::default_max_timeout_seconds")]
    pub max_timeout_seconds: u64,
    #[serde(default = "config_defaults::default_settlement_timeout_secs")]
    pub settlement_timeout_secs: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::load_from_path(&args.config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::JsonParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_or_env_resolves_dollar_var_syntax() {
        unsafe {
            std::env::set_var("X402_TEST_VAR", "0x" .to_string() + &"11".repeat(32));
        }
        let parsed: LiteralOrEnv<EvmPrivateKey> =
            serde_json::from_str("\"$X402_TEST_VAR\"").unwrap();
        assert_eq!(parsed.0.0, B256::from([0x11u8; 32]));
    }

    #[test]
    fn literal_or_env_accepts_literal_value() {
        let literal = format!("\"0x{}\"", "22".repeat(32));
        let parsed: LiteralOrEnv<EvmPrivateKey> = serde_json::from_str(&literal).unwrap();
        assert_eq!(parsed.0.0, B256::from([0x22u8; 32]));
    }
}
