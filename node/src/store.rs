//! # Snapshot Store
//!
//! The deployed system (the bucket together with the ledger it is bound
//! to) persisted as a single JSON document. Writes go to a sibling
//! temporary file that is then renamed over the target, so a crash never
//! leaves a half-written snapshot behind.
//!
//! Receive hooks and the clock are runtime-only and are not persisted; a
//! loaded bucket runs on the system clock.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use ppo_contracts::{Bucket, Ledger, SystemClock};

use crate::config::DeploymentConfig;

/// Snapshot format version. Bump on incompatible layout changes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// The bucket, which owns the ledger it mints on.
pub type System = Bucket<Ledger>;

#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub deployed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub system: System,
}

impl Snapshot {
    /// Bootstraps a fresh deployment:
    ///
    /// 1. the ledger, with the deployer as Owner;
    /// 2. the bucket principal as a ledger Minter;
    /// 3. the bucket, with the deployer as Owner;
    /// 4. the configured withdrawers as bucket Minters.
    pub fn deploy(config: &DeploymentConfig) -> Result<Self> {
        config.validate()?;
        let deployer = config.deployer;

        let mut ledger = Ledger::new(
            config.token.name.clone(),
            config.token.symbol.clone(),
            config.token.decimals,
            config.cap()?,
            deployer,
        );
        ledger
            .add_minter(&deployer, config.bucket.principal)
            .context("failed to register the bucket as a token minter")?;

        let mut system = Bucket::new(
            ledger,
            config.bucket.principal,
            config.bucket_size()?,
            config.bucket_rate()?,
            deployer,
            std::sync::Arc::new(SystemClock),
        );
        for withdrawer in &config.bucket.withdrawers {
            system
                .add_minter(&deployer, *withdrawer)
                .with_context(|| format!("failed to register withdrawer {}", withdrawer))?;
        }

        let now = Utc::now();
        info!(
            symbol = %config.token.symbol,
            bucket = %config.bucket.principal,
            withdrawers = config.bucket.withdrawers.len(),
            "deployment bootstrapped"
        );
        Ok(Self {
            version: SNAPSHOT_VERSION,
            deployed_at: now,
            updated_at: now,
            system,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot: {}", path.display()))?;
        let snapshot: Self = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse snapshot: {}", path.display()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            bail!(
                "unsupported snapshot version {} (expected {})",
                snapshot.version,
                SNAPSHOT_VERSION
            );
        }
        debug!(path = %path.display(), "snapshot loaded");
        Ok(snapshot)
    }

    /// Atomically replaces the snapshot at `path`.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.updated_at = Utc::now();
        let json = serde_json::to_string_pretty(self).context("failed to serialize snapshot")?;

        let tmp = temp_path(path);
        std::fs::write(&tmp, json)
            .with_context(|| format!("failed to write snapshot: {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("failed to move snapshot into place: {}", path.display()))?;
        debug!(path = %path.display(), "snapshot saved");
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_wires_roles() {
        let config = DeploymentConfig::default();
        let snapshot = Snapshot::deploy(&config).unwrap();
        let system = &snapshot.system;

        assert!(system.is_owner(&config.deployer));
        assert!(system.token().is_owner(&config.deployer));
        assert!(system.token().is_minter(&config.bucket.principal));
        for w in &config.bucket.withdrawers {
            assert!(system.is_minter(w));
        }
        assert_eq!(system.token().cap(), config.cap().unwrap());
        assert_eq!(system.available(), config.bucket_size().unwrap());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let config = DeploymentConfig::default();

        let mut snapshot = Snapshot::deploy(&config).unwrap();
        let withdrawer = config.bucket.withdrawers[0];
        let to = ppo_contracts::Principal::derive("alice");
        snapshot.system.withdraw(&withdrawer, to, 42).unwrap();
        snapshot.save(&path).unwrap();
        assert!(!temp_path(&path).exists());

        let loaded = Snapshot::load(&path).unwrap();
        assert_eq!(loaded.system.token().balance_of(&to), 42);
        assert_eq!(loaded.system.events().len(), snapshot.system.events().len());
        assert_eq!(loaded.system.token().events().len(), snapshot.system.token().events().len());
    }

    #[test]
    fn large_batch_survives_save_and_load() {
        use crate::ops::{run_batch, Call, Operation};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let config = DeploymentConfig::default();
        let to = ppo_contracts::Principal::derive("alice");
        let amount = 100_000_000 * 10u128.pow(18);

        let mut snapshot = Snapshot::deploy(&config).unwrap();
        let calls = vec![
            Call { caller: config.bucket.withdrawers[0], op: Operation::Withdraw { to, amount } },
            Call { caller: config.deployer, op: Operation::Finalize },
        ];
        assert!(run_batch(&mut snapshot.system, &calls, false).iter().all(|o| o.is_ok()));
        snapshot.save(&path).unwrap();

        let loaded = Snapshot::load(&path).unwrap();
        let token = loaded.system.token();
        assert_eq!(token.total_supply(), amount);
        assert_eq!(token.balance_of(&to), amount);
        assert!(token.finalized());
        assert_eq!(token.events().events().collect::<Vec<_>>(), snapshot.system.token().events().events().collect::<Vec<_>>());
        assert_eq!(loaded.system.events().events().last(), snapshot.system.events().events().last());
    }

    #[test]
    fn load_rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut snapshot = Snapshot::deploy(&DeploymentConfig::default()).unwrap();
        snapshot.version = 99;
        snapshot.save(&path).unwrap();
        assert!(Snapshot::load(&path).is_err());
    }
}
