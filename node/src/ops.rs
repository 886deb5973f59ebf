//! # Operation Batches
//!
//! A batch is a JSON array of calls, each naming its caller explicitly:
//!
//! ```json
//! [
//!   { "caller": "…", "op": { "withdraw": { "to": "…", "amount": 1000 } } },
//!   { "caller": "…", "op": "finalize" },
//!   { "caller": "…", "op": { "transfer": { "to": "…", "amount": 5, "data": "68656c6c6f" } } }
//! ]
//! ```
//!
//! Calls are applied strictly in order against the deployed system. Each
//! one either commits in full or is rejected with no effect; a rejection is
//! reported and, unless the batch runs fail-fast, the next call proceeds.

use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use thiserror::Error;
use tracing::{debug, warn};

use ppo_contracts::{Amount, LedgerError, Notification, Principal};

use crate::store::System;

/// Why a single call was rejected.
#[derive(Debug, Error)]
pub enum OpError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The `data` payload was not valid hex.
    #[error("invalid data payload: {0}")]
    InvalidData(#[from] hex::FromHexError),
}

/// One call in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub caller: Principal,
    pub op: Operation,
}

/// Every state-changing operation the deployed system exposes.
///
/// Role variants without a `bucket_` prefix act on the token's registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Mint { to: Principal, amount: Amount },
    Burn { amount: Amount },
    Finalize,
    Transfer {
        to: Principal,
        amount: Amount,
        /// Hex-encoded payload.
        #[serde(default)]
        data: Option<String>,
    },
    TransferFrom {
        from: Principal,
        to: Principal,
        amount: Amount,
        #[serde(default)]
        data: Option<String>,
    },
    Approve { spender: Principal, amount: Amount },
    IncreaseApproval { spender: Principal, amount: Amount },
    DecreaseApproval { spender: Principal, amount: Amount },
    AddOwner { who: Principal },
    DeleteOwner { who: Principal },
    AddMinter { who: Principal },
    DeleteMinter { who: Principal },
    Withdraw { to: Principal, amount: Amount },
    SetBucketSize { size: Amount },
    SetBucketRate { rate: Amount },
    SetBucketSizeAndRate { size: Amount, rate: Amount },
    BucketAddOwner { who: Principal },
    BucketDeleteOwner { who: Principal },
    BucketAddMinter { who: Principal },
    BucketDeleteMinter { who: Principal },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Mint { .. } => "mint",
            Operation::Burn { .. } => "burn",
            Operation::Finalize => "finalize",
            Operation::Transfer { .. } => "transfer",
            Operation::TransferFrom { .. } => "transfer_from",
            Operation::Approve { .. } => "approve",
            Operation::IncreaseApproval { .. } => "increase_approval",
            Operation::DecreaseApproval { .. } => "decrease_approval",
            Operation::AddOwner { .. } => "add_owner",
            Operation::DeleteOwner { .. } => "delete_owner",
            Operation::AddMinter { .. } => "add_minter",
            Operation::DeleteMinter { .. } => "delete_minter",
            Operation::Withdraw { .. } => "withdraw",
            Operation::SetBucketSize { .. } => "set_bucket_size",
            Operation::SetBucketRate { .. } => "set_bucket_rate",
            Operation::SetBucketSizeAndRate { .. } => "set_bucket_size_and_rate",
            Operation::BucketAddOwner { .. } => "bucket_add_owner",
            Operation::BucketDeleteOwner { .. } => "bucket_delete_owner",
            Operation::BucketAddMinter { .. } => "bucket_add_minter",
            Operation::BucketDeleteMinter { .. } => "bucket_delete_minter",
        }
    }
}

/// Applies one call.
pub fn apply(system: &mut System, call: &Call) -> Result<(), OpError> {
    let caller = &call.caller;
    match &call.op {
        Operation::Mint { to, amount } => system.token_mut().mint(caller, *to, *amount)?,
        Operation::Burn { amount } => system.token_mut().burn(caller, *amount)?,
        Operation::Finalize => system.token_mut().finalize(caller)?,
        Operation::Transfer { to, amount, data } => match decode(data)? {
            Some(bytes) => system.token_mut().transfer_with_data(caller, *to, *amount, bytes)?,
            None => system.token_mut().transfer(caller, *to, *amount)?,
        },
        Operation::TransferFrom { from, to, amount, data } => match decode(data)? {
            Some(bytes) => system
                .token_mut()
                .transfer_from_with_data(caller, *from, *to, *amount, bytes)?,
            None => system.token_mut().transfer_from(caller, *from, *to, *amount)?,
        },
        Operation::Approve { spender, amount } => system.token_mut().approve(caller, *spender, *amount)?,
        Operation::IncreaseApproval { spender, amount } => {
            system.token_mut().increase_approval(caller, *spender, *amount)?
        }
        Operation::DecreaseApproval { spender, amount } => {
            system.token_mut().decrease_approval(caller, *spender, *amount)?
        }
        Operation::AddOwner { who } => system.token_mut().add_owner(caller, *who)?,
        Operation::DeleteOwner { who } => system.token_mut().delete_owner(caller, *who)?,
        Operation::AddMinter { who } => system.token_mut().add_minter(caller, *who)?,
        Operation::DeleteMinter { who } => system.token_mut().delete_minter(caller, *who)?,
        Operation::Withdraw { to, amount } => system.withdraw(caller, *to, *amount)?,
        Operation::SetBucketSize { size } => system.set_size(caller, *size)?,
        Operation::SetBucketRate { rate } => system.set_rate(caller, *rate)?,
        Operation::SetBucketSizeAndRate { size, rate } => system.set_size_and_rate(caller, *size, *rate)?,
        Operation::BucketAddOwner { who } => system.add_owner(caller, *who)?,
        Operation::BucketDeleteOwner { who } => system.delete_owner(caller, *who)?,
        Operation::BucketAddMinter { who } => system.add_minter(caller, *who)?,
        Operation::BucketDeleteMinter { who } => system.delete_minter(caller, *who)?,
    }
    Ok(())
}

fn decode(data: &Option<String>) -> Result<Option<Vec<u8>>, hex::FromHexError> {
    data.as_deref()
        .map(|s| hex::decode(s.strip_prefix("0x").unwrap_or(s)))
        .transpose()
}

/// Result of one call within a batch.
#[derive(Debug, Serialize)]
pub struct Outcome {
    pub index: usize,
    pub op: &'static str,
    pub caller: Principal,
    /// `None` on success, the rejection reason otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Applies `calls` in order. With `fail_fast`, stops after the first
/// rejection; otherwise every call is attempted.
pub fn run_batch(system: &mut System, calls: &[Call], fail_fast: bool) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(calls.len());
    for (index, call) in calls.iter().enumerate() {
        let result = apply(system, call);
        let outcome = Outcome {
            index,
            op: call.op.name(),
            caller: call.caller,
            error: result.err().map(|e| e.to_string()),
        };
        match &outcome.error {
            None => debug!(index, op = outcome.op, caller = %call.caller, "call applied"),
            Some(reason) => warn!(index, op = outcome.op, caller = %call.caller, %reason, "call rejected"),
        }
        let stop = fail_fast && !outcome.is_ok();
        outcomes.push(outcome);
        if stop {
            break;
        }
    }
    outcomes
}

/// A notification tagged with the log it came from.
#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum Feed<'a> {
    Token(&'a Notification),
    Bucket(&'a Notification),
}

/// Writes one JSON line per outcome, then one per new token and bucket
/// notification (`{"token": ...}` / `{"bucket": ...}`).
///
/// Everything is serialized straight to `out`; amounts are `u128` and do
/// not survive a round trip through `serde_json::Value`.
pub fn write_batch_report<W: Write>(
    out: &mut W,
    outcomes: &[Outcome],
    token: &[Notification],
    bucket: &[Notification],
) -> io::Result<()> {
    for outcome in outcomes {
        serde_json::to_writer(&mut *out, outcome)?;
        writeln!(out)?;
    }
    let feed = token.iter().map(Feed::Token).chain(bucket.iter().map(Feed::Bucket));
    for entry in feed {
        serde_json::to_writer(&mut *out, &entry)?;
        writeln!(out)?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeploymentConfig;
    use crate::store::Snapshot;

    fn p(label: &str) -> Principal {
        Principal::derive(label)
    }

    fn deployed() -> (DeploymentConfig, System) {
        let config = DeploymentConfig::default();
        let system = Snapshot::deploy(&config).unwrap().system;
        (config, system)
    }

    #[test]
    fn parses_batch_json() {
        let deployer = DeploymentConfig::default().deployer;
        let json = format!(
            r#"[
                {{ "caller": "{d}", "op": "finalize" }},
                {{ "caller": "{d}", "op": {{ "transfer": {{ "to": "{a}", "amount": 100000000000000000000000000 }} }} }}
            ]"#,
            d = deployer,
            a = p("alice"),
        );
        let calls: Vec<Call> = serde_json::from_str(&json).unwrap();
        assert_eq!(calls[0].op, Operation::Finalize);
        assert_eq!(
            calls[1].op,
            Operation::Transfer {
                to: p("alice"),
                amount: 100_000_000 * 10u128.pow(18),
                data: None,
            }
        );
    }

    #[test]
    fn batch_continues_past_rejections() {
        let (config, mut system) = deployed();
        let minter = config.bucket.withdrawers[0];
        let calls = vec![
            Call { caller: minter, op: Operation::Withdraw { to: p("a"), amount: 100 } },
            Call { caller: p("a"), op: Operation::Transfer { to: p("b"), amount: 1, data: None } },
            Call { caller: config.deployer, op: Operation::Finalize },
            Call { caller: p("a"), op: Operation::Transfer { to: p("b"), amount: 1, data: Some("0x6869".into()) } },
        ];
        let outcomes = run_batch(&mut system, &calls, false);
        let ok: Vec<bool> = outcomes.iter().map(Outcome::is_ok).collect();
        assert_eq!(ok, vec![true, false, true, true]);
        assert_eq!(system.token().balance_of(&p("a")), 99);
        assert_eq!(system.token().balance_of(&p("b")), 1);
    }

    #[test]
    fn fail_fast_stops_at_first_rejection() {
        let (config, mut system) = deployed();
        let calls = vec![
            Call { caller: p("nobody"), op: Operation::Finalize },
            Call { caller: config.deployer, op: Operation::Finalize },
        ];
        let outcomes = run_batch(&mut system, &calls, true);
        assert_eq!(outcomes.len(), 1);
        assert!(!system.token().finalized());
    }

    #[test]
    fn bad_hex_payload_is_rejected_before_touching_state() {
        let (config, mut system) = deployed();
        system.token_mut().finalize(&config.deployer).unwrap();
        let call = Call {
            caller: p("a"),
            op: Operation::Transfer { to: p("b"), amount: 0, data: Some("zz".into()) },
        };
        assert!(matches!(apply(&mut system, &call), Err(OpError::InvalidData(_))));
    }

    #[test]
    fn size_and_rate_change_in_one_call() {
        let (config, mut system) = deployed();
        let call = Call {
            caller: config.deployer,
            op: Operation::SetBucketSizeAndRate { size: 500, rate: 7 },
        };
        apply(&mut system, &call).unwrap();
        assert_eq!(system.size(), 500);
        assert_eq!(system.rate(), 7);
        assert_eq!(system.available(), 500);

        let denied = Call {
            caller: p("nobody"),
            op: Operation::SetBucketSizeAndRate { size: 1, rate: 1 },
        };
        assert!(matches!(apply(&mut system, &denied), Err(OpError::Ledger(LedgerError::Unauthorized { .. }))));
    }

    #[test]
    fn parses_size_and_rate_call() {
        let json = format!(
            r#"{{ "caller": "{d}", "op": {{ "set_bucket_size_and_rate": {{ "size": 10, "rate": 2 }} }} }}"#,
            d = p("owner"),
        );
        let call: Call = serde_json::from_str(&json).unwrap();
        assert_eq!(call.op, Operation::SetBucketSizeAndRate { size: 10, rate: 2 });
    }

    #[test]
    fn report_carries_amounts_beyond_u64() {
        let (config, mut system) = deployed();
        let token_cursor = system.token().events().next_sequence();
        let bucket_cursor = system.events().next_sequence();

        let whole = 10u128.pow(18);
        let amount = 10_000_000 * whole;
        let left = config.bucket_size().unwrap() - amount;
        assert!(amount > u128::from(u64::MAX));
        assert!(left > u128::from(u64::MAX));

        let calls = vec![
            Call { caller: config.bucket.withdrawers[0], op: Operation::Withdraw { to: p("alice"), amount } },
            Call { caller: config.deployer, op: Operation::Finalize },
        ];
        let outcomes = run_batch(&mut system, &calls, false);
        assert!(outcomes.iter().all(Outcome::is_ok));

        let mut out = Vec::new();
        write_batch_report(
            &mut out,
            &outcomes,
            system.token().events().since(token_cursor),
            system.events().since(bucket_cursor),
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        // 2 outcomes, Mint + Transfer + Finalize + MintFinished, one Leak.
        assert_eq!(lines.len(), 7);
        assert!(lines[2].starts_with(r#"{"token":"#));
        assert!(lines[2].contains(&format!(r#""amount":{amount}"#)));
        assert!(lines[6].starts_with(r#"{"bucket":"#));
        assert!(lines[6].contains(&format!(r#""left":{left}"#)));
    }

    #[test]
    fn bucket_administration_goes_to_the_bucket_registry() {
        let (config, mut system) = deployed();
        let call = Call { caller: config.deployer, op: Operation::BucketAddMinter { who: p("bot") } };
        apply(&mut system, &call).unwrap();
        assert!(system.is_minter(&p("bot")));
        assert!(!system.token().is_minter(&p("bot")));
    }
}
