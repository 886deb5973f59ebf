//! # PPO Token Ledger
//!
//! A capped, mintable and burnable balance store whose transferability is
//! locked until an Owner finalizes it.
//!
//! ## Lifecycle
//!
//! ```text
//! Active ──finalize()──▶ Finalized   (terminal)
//! ```
//!
//! While `Active`, Minters may mint up to the cap and holders may burn, but
//! no transfer or approval of any kind is accepted, not even from Owners.
//! Finalizing closes minting for good and opens transfers. Exhausting the
//! cap does not change the phase: further mints are rejected with
//! `CapExceeded` and transfers stay locked until `finalize()`.
//!
//! ## Security Model
//!
//! - **Role gating**: mint needs the Minter role, finalize and role
//!   administration need the Owner role. Both live in the ledger's own
//!   [`RoleRegistry`].
//! - **Atomicity**: every check runs and every new value is computed before
//!   the first write, so a rejected call leaves no trace.
//! - **Receiver hooks**: a recipient registered with
//!   [`Ledger::register_receiver`] is notified after the balances have been
//!   committed. A failing hook is logged and never rolls the transfer back.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::events::{Event, EventLog};
use crate::principal::{Amount, Principal};
use crate::rbac::RoleRegistry;

/// Display name of the Product Protocol token.
pub const TOKEN_NAME: &str = "Product Protocol";
/// Ticker of the Product Protocol token.
pub const TOKEN_SYMBOL: &str = "PPO";
/// Decimal places of the Product Protocol token.
pub const TOKEN_DECIMALS: u8 = 18;

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Capability of a contract-like recipient to be told about incoming value.
///
/// The hook runs inside the transfer call, while the ledger is mutably
/// borrowed. When the ledger is shared as `Arc<parking_lot::Mutex<Ledger>>`
/// the lock is still held, and it is not re-entrant: a hook must not lock
/// that same ledger (not even to read a balance) or it deadlocks. Use
/// `amount` and `from` instead, or defer the work until the call returns.
pub trait TokenReceiver: Send {
    /// Called once the transfer of `amount` from `from` has been committed.
    /// `data` is empty for plain transfers.
    fn on_token_received(
        &mut self,
        from: &Principal,
        amount: Amount,
        data: &[u8],
    ) -> anyhow::Result<()>;
}

/// Anything that can issue new supply on behalf of an authorized caller.
///
/// The ledger implements it directly; the bucket implements it by
/// rate-limiting and forwarding to the token it is bound to.
pub trait MintableToken {
    fn mint(&mut self, caller: &Principal, to: Principal, amount: Amount) -> LedgerResult<()>;
}

/// Holds the lock for exactly one mint. Receive hooks never fire on mint,
/// but see [`TokenReceiver`] for transfers on a shared ledger.
impl<T: MintableToken + ?Sized> MintableToken for Arc<Mutex<T>> {
    fn mint(&mut self, caller: &Principal, to: Principal, amount: Amount) -> LedgerResult<()> {
        self.lock().mint(caller, to, amount)
    }
}

/// Registered receive hooks, keyed by recipient. Runtime-only.
#[derive(Default)]
struct ReceiverTable(HashMap<Principal, Box<dyn TokenReceiver>>);

impl std::fmt::Debug for ReceiverTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Finalization phase. Only the forward transition exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenPhase {
    /// Minting open, transfers locked.
    Active,
    /// Minting closed, transfers open.
    Finalized,
}

impl std::fmt::Display for TokenPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenPhase::Active => write!(f, "Active"),
            TokenPhase::Finalized => write!(f, "Finalized"),
        }
    }
}

/// The token ledger.
#[derive(Debug, Serialize, Deserialize)]
pub struct Ledger {
    name: String,
    symbol: String,
    decimals: u8,
    /// Maximum total supply. Fixed at construction.
    cap: Amount,
    total_supply: Amount,
    phase: TokenPhase,
    /// Non-zero balances only.
    balances: HashMap<Principal, Amount>,
    /// `owner -> (spender -> allowance)`, non-zero entries only.
    allowances: HashMap<Principal, HashMap<Principal, Amount>>,
    roles: RoleRegistry,
    events: EventLog,
    #[serde(skip)]
    receivers: ReceiverTable,
}

impl Ledger {
    /// Creates an empty ledger. `deployer` becomes the sole Owner.
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        decimals: u8,
        cap: Amount,
        deployer: Principal,
    ) -> Self {
        let ledger = Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals,
            cap,
            total_supply: 0,
            phase: TokenPhase::Active,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            roles: RoleRegistry::new(deployer),
            events: EventLog::new(),
            receivers: ReceiverTable::default(),
        };
        info!(
            name = %ledger.name,
            symbol = %ledger.symbol,
            cap = %ledger.cap,
            deployer = %deployer,
            "ledger created"
        );
        ledger
    }

    /// Creates the PPO token with the given cap.
    pub fn product_protocol(cap: Amount, deployer: Principal) -> Self {
        Self::new(TOKEN_NAME, TOKEN_SYMBOL, TOKEN_DECIMALS, cap, deployer)
    }

    // -- reads --------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn cap(&self) -> Amount {
        self.cap
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn phase(&self) -> TokenPhase {
        self.phase
    }

    pub fn minting_finished(&self) -> bool {
        self.phase == TokenPhase::Finalized
    }

    pub fn finalized(&self) -> bool {
        self.phase == TokenPhase::Finalized
    }

    pub fn balance_of(&self, who: &Principal) -> Amount {
        self.balances.get(who).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &Principal, spender: &Principal) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|s| s.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// All non-zero balances, in no particular order.
    pub fn balances(&self) -> impl Iterator<Item = (&Principal, &Amount)> {
        self.balances.iter()
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

    // -- role administration -----------------------------------------------

    pub fn add_owner(&mut self, caller: &Principal, who: Principal) -> LedgerResult<()> {
        let event = self.roles.add_owner(caller, who)?;
        self.events.record(event);
        Ok(())
    }

    pub fn delete_owner(&mut self, caller: &Principal, who: Principal) -> LedgerResult<()> {
        let event = self.roles.delete_owner(caller, who)?;
        self.events.record(event);
        Ok(())
    }

    pub fn add_minter(&mut self, caller: &Principal, who: Principal) -> LedgerResult<()> {
        let event = self.roles.add_minter(caller, who)?;
        self.events.record(event);
        Ok(())
    }

    pub fn delete_minter(&mut self, caller: &Principal, who: Principal) -> LedgerResult<()> {
        let event = self.roles.delete_minter(caller, who)?;
        self.events.record(event);
        Ok(())
    }

    /// Attaches a receive hook to `who`, replacing any previous one.
    pub fn register_receiver(&mut self, who: Principal, receiver: Box<dyn TokenReceiver>) {
        self.receivers.0.insert(who, receiver);
    }

    // -- supply ---------------------------------------------------------------

    /// Issues `amount` new tokens to `to`.
    ///
    /// # Errors
    ///
    /// Checked in order: [`LedgerError::Unauthorized`] without the Minter
    /// role, [`LedgerError::MintingClosed`] after finalization,
    /// [`LedgerError::InvalidRecipient`] for the zero principal,
    /// [`LedgerError::CapExceeded`] when the cap would be passed.
    pub fn mint(&mut self, caller: &Principal, to: Principal, amount: Amount) -> LedgerResult<()> {
        self.roles.require_minter_role(caller)?;
        if self.minting_finished() {
            return Err(LedgerError::MintingClosed);
        }
        if to.is_zero() {
            return Err(LedgerError::InvalidRecipient);
        }

        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        if new_supply > self.cap {
            return Err(LedgerError::CapExceeded {
                cap: self.cap,
                would_have: new_supply,
            });
        }
        let new_balance = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;

        self.total_supply = new_supply;
        self.set_balance(to, new_balance);

        self.events.record(Event::Mint { to, amount });
        self.events.record(Event::Transfer {
            from: Principal::ZERO,
            to,
            amount,
            data: None,
        });
        info!(minter = %caller, to = %to, amount = %amount, total_supply = %new_supply, "minted");
        Ok(())
    }

    /// Destroys `amount` of the caller's own tokens. Allowed in every phase.
    pub fn burn(&mut self, caller: &Principal, amount: Amount) -> LedgerResult<()> {
        let have = self.balance_of(caller);
        if have < amount {
            return Err(LedgerError::InsufficientBalance { have, need: amount });
        }

        self.set_balance(*caller, have - amount);
        // Supply is at least the caller's balance.
        self.total_supply -= amount;

        self.events.record(Event::Burn {
            burner: *caller,
            amount,
        });
        self.events.record(Event::Transfer {
            from: *caller,
            to: Principal::ZERO,
            amount,
            data: None,
        });
        info!(burner = %caller, amount = %amount, total_supply = %self.total_supply, "burned");
        Ok(())
    }

    /// Closes minting and opens transfers. Owner only, exactly once.
    pub fn finalize(&mut self, caller: &Principal) -> LedgerResult<()> {
        self.roles.require_owner_role(caller)?;
        if self.finalized() {
            return Err(LedgerError::AlreadyFinalized);
        }

        self.phase = TokenPhase::Finalized;
        self.events.record(Event::Finalize);
        self.events.record(Event::MintFinished);
        info!(owner = %caller, total_supply = %self.total_supply, "token finalized");
        Ok(())
    }

    // -- transfers ------------------------------------------------------------

    pub fn transfer(&mut self, caller: &Principal, to: Principal, amount: Amount) -> LedgerResult<()> {
        self.move_value(None, *caller, to, amount, None)
    }

    /// Like [`transfer`](Self::transfer), attaching `data` to the
    /// notification and the receive hook.
    pub fn transfer_with_data(
        &mut self,
        caller: &Principal,
        to: Principal,
        amount: Amount,
        data: Vec<u8>,
    ) -> LedgerResult<()> {
        self.move_value(None, *caller, to, amount, Some(data))
    }

    /// Moves `amount` from `from` to `to`, spending the caller's allowance.
    pub fn transfer_from(
        &mut self,
        caller: &Principal,
        from: Principal,
        to: Principal,
        amount: Amount,
    ) -> LedgerResult<()> {
        self.move_value(Some(*caller), from, to, amount, None)
    }

    pub fn transfer_from_with_data(
        &mut self,
        caller: &Principal,
        from: Principal,
        to: Principal,
        amount: Amount,
        data: Vec<u8>,
    ) -> LedgerResult<()> {
        self.move_value(Some(*caller), from, to, amount, Some(data))
    }

    // -- allowances -----------------------------------------------------------

    /// Sets the allowance of `spender` over the caller's tokens.
    pub fn approve(&mut self, caller: &Principal, spender: Principal, amount: Amount) -> LedgerResult<()> {
        self.require_finalized()?;
        self.set_allowance(*caller, spender, amount);
        Ok(())
    }

    pub fn increase_approval(
        &mut self,
        caller: &Principal,
        spender: Principal,
        added: Amount,
    ) -> LedgerResult<()> {
        self.require_finalized()?;
        let new_allowance = self
            .allowance(caller, &spender)
            .checked_add(added)
            .ok_or(LedgerError::Overflow)?;
        self.set_allowance(*caller, spender, new_allowance);
        Ok(())
    }

    /// Lowers the allowance, flooring at zero.
    pub fn decrease_approval(
        &mut self,
        caller: &Principal,
        spender: Principal,
        subtracted: Amount,
    ) -> LedgerResult<()> {
        self.require_finalized()?;
        let new_allowance = self.allowance(caller, &spender).saturating_sub(subtracted);
        self.set_allowance(*caller, spender, new_allowance);
        Ok(())
    }

    // -- internals ------------------------------------------------------------

    fn require_finalized(&self) -> LedgerResult<()> {
        if self.finalized() {
            Ok(())
        } else {
            Err(LedgerError::NotFinalized)
        }
    }

    fn move_value(
        &mut self,
        spender: Option<Principal>,
        from: Principal,
        to: Principal,
        amount: Amount,
        data: Option<Vec<u8>>,
    ) -> LedgerResult<()> {
        self.require_finalized()?;
        if to.is_zero() {
            return Err(LedgerError::InvalidRecipient);
        }

        let from_balance = self.balance_of(&from);
        if from_balance < amount {
            return Err(LedgerError::InsufficientBalance {
                have: from_balance,
                need: amount,
            });
        }
        let remaining_allowance = match spender {
            Some(spender) => {
                let have = self.allowance(&from, &spender);
                if have < amount {
                    return Err(LedgerError::InsufficientAllowance { have, need: amount });
                }
                Some((spender, have - amount))
            }
            None => None,
        };
        let to_balance = if from == to {
            from_balance
        } else {
            self.balance_of(&to)
                .checked_add(amount)
                .ok_or(LedgerError::Overflow)?
        };

        // Effects.
        if from != to {
            self.set_balance(from, from_balance - amount);
            self.set_balance(to, to_balance);
        }
        if let Some((spender, left)) = remaining_allowance {
            self.set_allowance_silently(from, spender, left);
        }
        self.events.record(Event::Transfer {
            from,
            to,
            amount,
            data: data.clone(),
        });
        debug!(from = %from, to = %to, amount = %amount, spender = ?spender, "transfer committed");

        // Interaction.
        if let Some(receiver) = self.receivers.0.get_mut(&to) {
            let payload = data.as_deref().unwrap_or(&[]);
            if let Err(e) = receiver.on_token_received(&from, amount, payload) {
                warn!(to = %to, from = %from, amount = %amount, error = %e, "receiver hook rejected transfer notification");
            }
        }
        Ok(())
    }

    fn set_balance(&mut self, who: Principal, amount: Amount) {
        if amount == 0 {
            self.balances.remove(&who);
        } else {
            self.balances.insert(who, amount);
        }
    }

    fn set_allowance(&mut self, owner: Principal, spender: Principal, amount: Amount) {
        self.set_allowance_silently(owner, spender, amount);
        self.events.record(Event::Approval {
            owner,
            spender,
            amount,
        });
        debug!(owner = %owner, spender = %spender, amount = %amount, "allowance updated");
    }

    fn set_allowance_silently(&mut self, owner: Principal, spender: Principal, amount: Amount) {
        if amount == 0 {
            if let Some(spenders) = self.allowances.get_mut(&owner) {
                spenders.remove(&spender);
                if spenders.is_empty() {
                    self.allowances.remove(&owner);
                }
            }
        } else {
            self.allowances.entry(owner).or_default().insert(spender, amount);
        }
    }
}

impl MintableToken for Ledger {
    fn mint(&mut self, caller: &Principal, to: Principal, amount: Amount) -> LedgerResult<()> {
        Ledger::mint(self, caller, to, amount)
    }
}
