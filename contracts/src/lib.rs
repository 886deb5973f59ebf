// Copyright (c) 2026 Product Protocol Developers. MIT License.
// See LICENSE for details.

//! # Product Protocol Contracts
//!
//! The permissioned PPO ledger and the machinery around it:
//!
//! - **Role registry**: two flat sets, Owners and Minters, checked by
//!   independent predicates. Every privileged operation goes through one.
//! - **Token**: a capped, mintable and burnable ledger. Transfers and
//!   approvals stay locked until an Owner finalizes it, which also closes
//!   minting for good.
//! - **Bucket**: a token-bucket rate limiter in front of minting, so the
//!   automated distribution channel can never draw value faster than its
//!   refill rate.
//!
//! ## Design Principles
//!
//! 1. All monetary operations check for overflow. Amounts are `u128` base
//!    units and `checked_*` / `saturating_*` arithmetic is used throughout.
//! 2. State transitions are explicit: the token phase is an enum with a
//!    single forward transition.
//! 3. Every check runs before the first write. A rejected operation leaves
//!    no partial effect.
//! 4. Every successful transition is recorded in an append-only event log.

pub mod bucket;
pub mod clock;
pub mod error;
pub mod events;
pub mod principal;
pub mod rbac;
pub mod token;

pub use bucket::Bucket;
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::{LedgerError, LedgerResult};
pub use events::{Event, EventLog, Notification};
pub use principal::{Amount, Principal};
pub use rbac::{Role, RoleRegistry};
pub use token::{Ledger, MintableToken, TokenPhase, TokenReceiver};
