//! Ledger, role and bucket errors.

use crate::principal::{Amount, Principal};
use crate::rbac::Role;
use thiserror::Error;

/// Every way an operation on the role registry, the token or the bucket can
/// be rejected. A rejected operation leaves state exactly as it found it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The caller lacks the role the operation requires.
    #[error("unauthorized: {caller} does not hold the {role} role")]
    Unauthorized {
        /// The role that was required.
        role: Role,
        /// The principal that attempted the operation.
        caller: Principal,
    },

    /// Transfer-family and approval operations are locked until finalization.
    #[error("token is not finalized: transfers and approvals are locked")]
    NotFinalized,

    /// Minting has been permanently closed.
    #[error("minting is finished")]
    MintingClosed,

    /// `finalize` was already called once.
    #[error("token is already finalized")]
    AlreadyFinalized,

    /// The mint would push total supply past the cap.
    #[error("supply cap exceeded: cap {cap}, would have {would_have}")]
    CapExceeded {
        /// The immutable supply cap.
        cap: Amount,
        /// Total supply the mint would have produced.
        would_have: Amount,
    },

    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: Amount, need: Amount },

    #[error("insufficient allowance: have {have}, need {need}")]
    InsufficientAllowance { have: Amount, need: Amount },

    /// The bucket has not accrued enough to cover the withdrawal.
    #[error("insufficient bucket balance: available {available}, requested {requested}")]
    InsufficientBucketBalance {
        /// Allowance accrued as of the attempt.
        available: Amount,
        /// Amount the caller asked for.
        requested: Amount,
    },

    /// Value cannot be sent to the null principal.
    #[error("invalid recipient: the zero principal cannot receive transfers")]
    InvalidRecipient,

    #[error("arithmetic overflow")]
    Overflow,
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
