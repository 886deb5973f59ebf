//! # Withdrawal Bucket
//!
//! A token bucket in front of a [`MintableToken`]. Bucket Minters may draw
//! newly minted value out of it, but never faster than the refill rate and
//! never more than `size` in one burst. This keeps a compromised or buggy
//! automated minter from draining the remaining cap in a single call.
//!
//! Accrual is lazy: the bucket stores what was left after the last
//! withdrawal and when that happened, and derives the current allowance as
//!
//! ```text
//! available = min(size, left_on_last_withdrawal + rate * (now - last_withdrawal_at))
//! ```
//!
//! All of it is saturating, so huge rates or long idle periods simply clamp
//! at `size`.
//!
//! The bucket mints on its token as [`Bucket::principal`], so that
//! principal must hold the Minter role on the token. Bucket withdrawers are
//! managed in the bucket's own [`RoleRegistry`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clock::{system_clock, SharedClock};
use crate::error::{LedgerError, LedgerResult};
use crate::events::{Event, EventLog};
use crate::principal::{Amount, Principal};
use crate::rbac::RoleRegistry;
use crate::token::MintableToken;

/// Rate-limited minting front-end bound to one token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Bucket<T> {
    /// Identity the bucket uses when minting on `token`.
    principal: Principal,
    /// Maximum accruable allowance.
    size: Amount,
    /// Refill speed in base units per second.
    rate: Amount,
    left_on_last_withdrawal: Amount,
    /// Unix seconds. Never moves backwards.
    last_withdrawal_at: u64,
    roles: RoleRegistry,
    events: EventLog,
    token: T,
    #[serde(skip, default = "system_clock")]
    clock: SharedClock,
}

impl<T: MintableToken> Bucket<T> {
    /// Binds a new, full bucket to `token`. `owner` becomes the bucket's
    /// sole Owner.
    pub fn new(
        token: T,
        principal: Principal,
        size: Amount,
        rate: Amount,
        owner: Principal,
        clock: SharedClock,
    ) -> Self {
        let now = clock.now();
        info!(principal = %principal, size = %size, rate = %rate, owner = %owner, "bucket created");
        Self {
            principal,
            size,
            rate,
            left_on_last_withdrawal: size,
            last_withdrawal_at: now,
            roles: RoleRegistry::new(owner),
            events: EventLog::new(),
            token,
            clock,
        }
    }

    // -- reads --------------------------------------------------------------

    /// Allowance accrued as of now. Does not touch stored state.
    pub fn available(&self) -> Amount {
        self.available_at(self.clock.now())
    }

    pub fn size(&self) -> Amount {
        self.size
    }

    pub fn rate(&self) -> Amount {
        self.rate
    }

    pub fn principal(&self) -> Principal {
        self.principal
    }

    pub fn last_withdrawal_at(&self) -> u64 {
        self.last_withdrawal_at
    }

    pub fn token(&self) -> &T {
        &self.token
    }

    /// Direct access to the bound token, for operations the bucket does not
    /// front (finalize, transfers, role administration).
    pub fn token_mut(&mut self) -> &mut T {
        &mut self.token
    }

    pub fn is_owner(&self, who: &Principal) -> bool {
        self.roles.is_owner(who)
    }

    pub fn is_minter(&self, who: &Principal) -> bool {
        self.roles.is_minter(who)
    }

    pub fn roles(&self) -> &RoleRegistry {
        &self.roles
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Swaps the time source, e.g. after restoring from a snapshot.
    pub fn set_clock(&mut self, clock: SharedClock) {
        self.clock = clock;
    }

    // -- withdrawal -----------------------------------------------------------

    /// Mints `amount` to `to` through the bound token, if the bucket has
    /// accrued enough.
    ///
    /// The bucket is only debited once the token has accepted the mint, so
    /// a token-side rejection (cap, finalization, missing Minter role on the
    /// bucket principal) leaves the bucket exactly as it was.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Unauthorized`] unless the caller is a bucket Minter,
    /// [`LedgerError::InsufficientBucketBalance`] if `amount` exceeds
    /// [`available`](Self::available), or whatever the token returns.
    pub fn withdraw(&mut self, caller: &Principal, to: Principal, amount: Amount) -> LedgerResult<()> {
        self.roles.require_minter_role(caller)?;

        let now = self.clock.now();
        let available = self.available_at(now);
        if amount > available {
            return Err(LedgerError::InsufficientBucketBalance {
                available,
                requested: amount,
            });
        }

        let principal = self.principal;
        self.token.mint(&principal, to, amount)?;

        let left = available - amount;
        self.left_on_last_withdrawal = left;
        self.last_withdrawal_at = self.last_withdrawal_at.max(now);
        self.emit(Event::Leak { to, left });
        info!(caller = %caller, to = %to, amount = %amount, left = %left, "bucket leak");
        Ok(())
    }

    // -- parameters -----------------------------------------------------------

    /// Changes the bucket size. Time accrued so far is settled at the old
    /// parameters first.
    pub fn set_size(&mut self, caller: &Principal, size: Amount) -> LedgerResult<()> {
        self.roles.require_owner_role(caller)?;
        self.checkpoint();
        self.size = size;
        info!(owner = %caller, size = %size, "bucket size updated");
        Ok(())
    }

    /// Changes the refill rate. Time accrued so far is settled at the old
    /// rate first.
    pub fn set_rate(&mut self, caller: &Principal, rate: Amount) -> LedgerResult<()> {
        self.roles.require_owner_role(caller)?;
        self.checkpoint();
        self.rate = rate;
        info!(owner = %caller, rate = %rate, "bucket rate updated");
        Ok(())
    }

    pub fn set_size_and_rate(&mut self, caller: &Principal, size: Amount, rate: Amount) -> LedgerResult<()> {
        self.roles.require_owner_role(caller)?;
        self.checkpoint();
        self.size = size;
        self.rate = rate;
        info!(owner = %caller, size = %size, rate = %rate, "bucket size and rate updated");
        Ok(())
    }

    // -- role administration -----------------------------------------------

    pub fn add_owner(&mut self, caller: &Principal, who: Principal) -> LedgerResult<()> {
        let event = self.roles.add_owner(caller, who)?;
        self.emit(event);
        Ok(())
    }

    pub fn delete_owner(&mut self, caller: &Principal, who: Principal) -> LedgerResult<()> {
        let event = self.roles.delete_owner(caller, who)?;
        self.emit(event);
        Ok(())
    }

    pub fn add_minter(&mut self, caller: &Principal, who: Principal) -> LedgerResult<()> {
        let event = self.roles.add_minter(caller, who)?;
        self.emit(event);
        Ok(())
    }

    pub fn delete_minter(&mut self, caller: &Principal, who: Principal) -> LedgerResult<()> {
        let event = self.roles.delete_minter(caller, who)?;
        self.emit(event);
        Ok(())
    }

    // -- internals ------------------------------------------------------------

    fn available_at(&self, now: u64) -> Amount {
        let elapsed = Amount::from(now.saturating_sub(self.last_withdrawal_at));
        self.rate
            .saturating_mul(elapsed)
            .saturating_add(self.left_on_last_withdrawal)
            .min(self.size)
    }

    /// Records `event` stamped with the bucket's clock.
    fn emit(&mut self, event: Event) {
        let at = i64::try_from(self.clock.now())
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_default();
        self.events.record_at(event, at);
    }

    fn checkpoint(&mut self) {
        let now = self.clock.now();
        self.left_on_last_withdrawal = self.available_at(now);
        self.last_withdrawal_at = self.last_withdrawal_at.max(now);
    }
}

impl<T: MintableToken> MintableToken for Bucket<T> {
    fn mint(&mut self, caller: &Principal, to: Principal, amount: Amount) -> LedgerResult<()> {
        self.withdraw(caller, to, amount)
    }
}
