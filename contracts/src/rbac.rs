//! # Role Registry
//!
//! Two flat membership sets, Owners and Minters, queried by independent
//! predicates. There is no hierarchy: an Owner is not implicitly a Minter
//! and a Minter is not implicitly an Owner. The only seed is the bootstrap
//! Owner supplied at construction; every later change must be made by an
//! existing Owner.
//!
//! Mutating operations return the [`Event`] they emit so the component that
//! owns the registry can record it in its own log.
//!
//! Removing the last Owner is allowed. It leaves the registry permanently
//! frozen: nobody can add Owners or Minters again.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

use crate::error::{LedgerError, LedgerResult};
use crate::events::Event;
use crate::principal::Principal;

/// A role a principal can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Administers roles and finalizes the token.
    Owner,
    /// Allowed to increase supply.
    Minter,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Owner => write!(f, "owner"),
            Role::Minter => write!(f, "minter"),
        }
    }
}

/// Owner and Minter membership sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRegistry {
    owners: BTreeSet<Principal>,
    minters: BTreeSet<Principal>,
}

impl RoleRegistry {
    /// Creates a registry whose only member is `owner`, holding the Owner
    /// role.
    pub fn new(owner: Principal) -> Self {
        let mut owners = BTreeSet::new();
        owners.insert(owner);
        Self {
            owners,
            minters: BTreeSet::new(),
        }
    }

    pub fn is_owner(&self, who: &Principal) -> bool {
        self.owners.contains(who)
    }

    pub fn is_minter(&self, who: &Principal) -> bool {
        self.minters.contains(who)
    }

    /// Current Owners in a stable order.
    pub fn owners(&self) -> impl Iterator<Item = &Principal> {
        self.owners.iter()
    }

    /// Current Minters in a stable order.
    pub fn minters(&self) -> impl Iterator<Item = &Principal> {
        self.minters.iter()
    }

    pub fn require_owner_role(&self, caller: &Principal) -> LedgerResult<()> {
        self.require(Role::Owner, caller)
    }

    pub fn require_minter_role(&self, caller: &Principal) -> LedgerResult<()> {
        self.require(Role::Minter, caller)
    }

    /// Passes only when the caller holds both roles. The Owner role is
    /// checked first, so a caller with neither is reported as lacking it.
    pub fn require_owner_and_minter_roles(&self, caller: &Principal) -> LedgerResult<()> {
        self.require(Role::Owner, caller)?;
        self.require(Role::Minter, caller)
    }

    /// Grants the Owner role. Re-adding an existing Owner is accepted.
    pub fn add_owner(&mut self, caller: &Principal, who: Principal) -> LedgerResult<Event> {
        self.require_owner_role(caller)?;
        self.owners.insert(who);
        info!(caller = %caller, who = %who, "owner added");
        Ok(Event::AddOwner { who })
    }

    /// Revokes the Owner role. Removing a non-Owner is accepted.
    pub fn delete_owner(&mut self, caller: &Principal, who: Principal) -> LedgerResult<Event> {
        self.require_owner_role(caller)?;
        self.owners.remove(&who);
        info!(caller = %caller, who = %who, remaining = self.owners.len(), "owner deleted");
        Ok(Event::DeleteOwner { who })
    }

    /// Grants the Minter role. Re-adding an existing Minter is accepted.
    pub fn add_minter(&mut self, caller: &Principal, who: Principal) -> LedgerResult<Event> {
        self.require_owner_role(caller)?;
        self.minters.insert(who);
        info!(caller = %caller, who = %who, "minter added");
        Ok(Event::AddMinter { who })
    }

    /// Revokes the Minter role. Removing a non-Minter is accepted.
    pub fn delete_minter(&mut self, caller: &Principal, who: Principal) -> LedgerResult<Event> {
        self.require_owner_role(caller)?;
        self.minters.remove(&who);
        info!(caller = %caller, who = %who, "minter deleted");
        Ok(Event::DeleteMinter { who })
    }

    fn require(&self, role: Role, caller: &Principal) -> LedgerResult<()> {
        let held = match role {
            Role::Owner => self.owners.contains(caller),
            Role::Minter => self.minters.contains(caller),
        };
        if held {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized {
                role,
                caller: *caller,
            })
        }
    }
}
