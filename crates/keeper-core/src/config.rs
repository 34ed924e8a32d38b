//! Config - 環境変数からの設定読み込み
//!
//! `.env` があれば先に読み込み（無ければ無視）、その後プロセス環境から値を取ります。
//! 必須: `REGISTRY_ADDRESS`, `RPC_URL`, `PRIVATE_KEY`。その他は既定値を持ちます。

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::domain::{Address, Gas, Wei};

pub const DEFAULT_GAS_CEILING: Gas = 500_000;
/// 0.00001 ETH.
pub const DEFAULT_MINIMUM_FUNDING: Wei = Wei::new(10_000_000_000_000);
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CHECK_CONCURRENCY: usize = 1;

pub const ENV_REGISTRY_ADDRESS: &str = "REGISTRY_ADDRESS";
pub const ENV_RPC_URL: &str = "RPC_URL";
pub const ENV_PRIVATE_KEY: &str = "PRIVATE_KEY";
pub const ENV_GAS_CEILING: &str = "KEEPER_GAS_CEILING";
pub const ENV_MINIMUM_FUNDING: &str = "KEEPER_MINIMUM_FUNDING_WEI";
pub const ENV_RECEIPT_TIMEOUT: &str = "KEEPER_RECEIPT_TIMEOUT_SECS";
pub const ENV_CHECK_TIMEOUT: &str = "KEEPER_CHECK_TIMEOUT_SECS";
pub const ENV_PASS_DEADLINE: &str = "KEEPER_PASS_DEADLINE_SECS";
pub const ENV_CHECK_CONCURRENCY: &str = "KEEPER_CHECK_CONCURRENCY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

/// 32-byte signing key. Never printed, wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SignerKey([u8; 32]);

impl SignerKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Account address the in-memory ledger assigns to this key.
    ///
    /// This is not secp256k1 derivation; a real ledger client derives the
    /// address itself.
    pub fn local_address(&self) -> Address {
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&self.0[12..]);
        Address::from_bytes(bytes)
    }
}

impl fmt::Debug for SignerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SignerKey(<redacted>)")
    }
}

impl FromStr for SignerKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let mut bytes = [0u8; 32];
        let decoded = hex::decode_to_slice(digits, &mut bytes).map_err(|err| match err {
            hex::FromHexError::InvalidStringLength | hex::FromHexError::OddLength => {
                format!("expected 64 hex digits, got {}", digits.len())
            }
            other => other.to_string(),
        });
        if let Err(reason) = decoded {
            bytes.zeroize();
            return Err(reason);
        }
        if bytes == [0u8; 32] {
            return Err("key must not be zero".to_string());
        }
        Ok(Self(bytes))
    }
}

#[derive(Debug, Clone)]
pub struct KeeperConfig {
    pub registry_address: Address,
    pub rpc_url: String,
    pub signer_key: SignerKey,
    pub gas_ceiling: Gas,
    /// Registration floor. Enforced by the registry, reported by the keeper.
    pub minimum_funding: Wei,
    pub receipt_timeout: Duration,
    pub check_timeout: Duration,
    pub pass_deadline: Option<Duration>,
    pub check_concurrency: usize,
}

impl KeeperConfig {
    /// `.env` in the working directory, then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env_file(None)
    }

    pub fn load_with_env_file(env_file: Option<&Path>) -> Result<Self, ConfigError> {
        let loaded = match env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
            None => dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
        };
        tracing::debug!(env_file_loaded = loaded, "environment prepared");
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let registry_address = parse(ENV_REGISTRY_ADDRESS, &require(ENV_REGISTRY_ADDRESS)?)?;
        let rpc_url = require(ENV_RPC_URL)?;
        let signer_key = parse(ENV_PRIVATE_KEY, &require(ENV_PRIVATE_KEY)?)?;

        let gas_ceiling = match get(ENV_GAS_CEILING) {
            Some(v) => parse(ENV_GAS_CEILING, &v)?,
            None => DEFAULT_GAS_CEILING,
        };
        let minimum_funding = match get(ENV_MINIMUM_FUNDING) {
            Some(v) => Wei::new(parse(ENV_MINIMUM_FUNDING, &v)?),
            None => DEFAULT_MINIMUM_FUNDING,
        };
        let receipt_timeout = match get(ENV_RECEIPT_TIMEOUT) {
            Some(v) => seconds(ENV_RECEIPT_TIMEOUT, &v)?,
            None => DEFAULT_RECEIPT_TIMEOUT,
        };
        let check_timeout = match get(ENV_CHECK_TIMEOUT) {
            Some(v) => seconds(ENV_CHECK_TIMEOUT, &v)?,
            None => DEFAULT_CHECK_TIMEOUT,
        };
        let pass_deadline = get(ENV_PASS_DEADLINE)
            .map(|v| seconds(ENV_PASS_DEADLINE, &v))
            .transpose()?;
        let check_concurrency = match get(ENV_CHECK_CONCURRENCY) {
            Some(v) => parse(ENV_CHECK_CONCURRENCY, &v)?,
            None => DEFAULT_CHECK_CONCURRENCY,
        };

        if gas_ceiling == 0 {
            return Err(invalid(ENV_GAS_CEILING, "must be greater than zero"));
        }
        if check_concurrency == 0 {
            return Err(invalid(ENV_CHECK_CONCURRENCY, "must be at least 1"));
        }

        Ok(Self {
            registry_address,
            rpc_url,
            signer_key,
            gas_ceiling,
            minimum_funding,
            receipt_timeout,
            check_timeout,
            pass_deadline,
            check_concurrency,
        })
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.into(),
    }
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.parse().map_err(|err: T::Err| invalid(name, err.to_string()))
}

fn seconds(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = parse(name, value)?;
    if secs == 0 {
        return Err(invalid(name, "must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}
