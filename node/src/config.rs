//! # Deployment Configuration
//!
//! The parameters a fresh PPO deployment is bootstrapped with, read from a
//! TOML file. Amounts are given in whole tokens and scaled by `decimals`
//! into base units at deploy time, since TOML integers stop at `i64`.
//!
//! ```toml
//! deployer = "…64 hex chars…"
//!
//! [token]
//! name = "Product Protocol"
//! symbol = "PPO"
//! decimals = 18
//! cap_tokens = 1000000000
//!
//! [bucket]
//! principal = "…"
//! size_tokens = 100000000
//! rate_tokens_per_sec = 100000000
//! withdrawers = ["…"]
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use ppo_contracts::token::{TOKEN_DECIMALS, TOKEN_NAME, TOKEN_SYMBOL};
use ppo_contracts::{Amount, Principal};

/// Default supply cap, in whole tokens.
pub const DEFAULT_CAP_TOKENS: u64 = 1_000_000_000;

/// Default bucket size and refill rate, in whole tokens.
pub const DEFAULT_BUCKET_SIZE_TOKENS: u64 = 100_000_000;
pub const DEFAULT_BUCKET_RATE_TOKENS: u64 = 100_000_000;

/// Largest `decimals` for which `10^decimals` fits in an [`Amount`].
const MAX_DECIMALS: u8 = 38;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Initial Owner of both the token and the bucket.
    pub deployer: Principal,
    pub token: TokenSection,
    pub bucket: BucketSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSection {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub cap_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSection {
    /// Identity the bucket mints with. Granted the Minter role on the token.
    pub principal: Principal,
    pub size_tokens: u64,
    pub rate_tokens_per_sec: u64,
    /// Granted the Minter role on the bucket.
    #[serde(default)]
    pub withdrawers: Vec<Principal>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            deployer: Principal::derive("ppo-deployer"),
            token: TokenSection {
                name: TOKEN_NAME.to_string(),
                symbol: TOKEN_SYMBOL.to_string(),
                decimals: TOKEN_DECIMALS,
                cap_tokens: DEFAULT_CAP_TOKENS,
            },
            bucket: BucketSection {
                principal: Principal::derive("ppo-bucket"),
                size_tokens: DEFAULT_BUCKET_SIZE_TOKENS,
                rate_tokens_per_sec: DEFAULT_BUCKET_RATE_TOKENS,
                withdrawers: vec![Principal::derive("ppo-minter")],
            },
        }
    }
}

impl DeploymentConfig {
    /// Reads and validates a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to render config")
    }

    pub fn validate(&self) -> Result<()> {
        if self.token.name.trim().is_empty() {
            bail!("token.name must not be empty");
        }
        if self.token.symbol.trim().is_empty() {
            bail!("token.symbol must not be empty");
        }
        if self.token.decimals > MAX_DECIMALS {
            bail!(
                "token.decimals is {}, at most {} is supported",
                self.token.decimals,
                MAX_DECIMALS
            );
        }
        if self.deployer.is_zero() || self.bucket.principal.is_zero() {
            bail!("the zero principal cannot be a deployer or a bucket");
        }
        if self.bucket.principal == self.deployer {
            bail!("bucket.principal must differ from the deployer");
        }
        // Surface overflow now rather than at deploy time.
        self.cap()?;
        self.bucket_size()?;
        self.bucket_rate()?;
        Ok(())
    }

    pub fn cap(&self) -> Result<Amount> {
        to_base_units(self.token.cap_tokens, self.token.decimals)
    }

    pub fn bucket_size(&self) -> Result<Amount> {
        to_base_units(self.bucket.size_tokens, self.token.decimals)
    }

    pub fn bucket_rate(&self) -> Result<Amount> {
        to_base_units(self.bucket.rate_tokens_per_sec, self.token.decimals)
    }
}

/// Scales whole tokens to base units.
pub fn to_base_units(tokens: u64, decimals: u8) -> Result<Amount> {
    10u128
        .checked_pow(u32::from(decimals))
        .and_then(|unit| unit.checked_mul(Amount::from(tokens)))
        .with_context(|| format!("{} tokens at {} decimals overflows", tokens, decimals))
}
