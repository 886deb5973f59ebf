//! # Notifications
//!
//! Every successful state transition appends one or more [`Event`]s to the
//! owning component's [`EventLog`]. The log is append-only; external
//! indexers read it by cursor with [`EventLog::since`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::principal::{Amount, Principal};

/// An observable notification emitted by the registry, token or bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    AddOwner { who: Principal },
    DeleteOwner { who: Principal },
    AddMinter { who: Principal },
    DeleteMinter { who: Principal },
    Mint { to: Principal, amount: Amount },
    Burn { burner: Principal, amount: Amount },
    /// Value movement. Mints come from [`Principal::ZERO`], burns go to it.
    Transfer {
        from: Principal,
        to: Principal,
        amount: Amount,
        /// Payload attached by the `*_with_data` transfer variants.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Vec<u8>>,
    },
    Approval {
        owner: Principal,
        spender: Principal,
        amount: Amount,
    },
    Finalize,
    MintFinished,
    /// A bucket withdrawal; `left` is the allowance remaining right after it.
    Leak { to: Principal, left: Amount },
}

impl Event {
    /// Short name of the notification, as indexers key on it.
    pub fn name(&self) -> &'static str {
        match self {
            Event::AddOwner { .. } => "AddOwner",
            Event::DeleteOwner { .. } => "DeleteOwner",
            Event::AddMinter { .. } => "AddMinter",
            Event::DeleteMinter { .. } => "DeleteMinter",
            Event::Mint { .. } => "Mint",
            Event::Burn { .. } => "Burn",
            Event::Transfer { .. } => "Transfer",
            Event::Approval { .. } => "Approval",
            Event::Finalize => "Finalize",
            Event::MintFinished => "MintFinished",
            Event::Leak { .. } => "Leak",
        }
    }
}

/// An event together with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Zero-based, gap-free position in the owning log.
    pub sequence: u64,
    /// Wall-clock time the event was recorded.
    pub timestamp: DateTime<Utc>,
    pub event: Event,
}

/// Append-only event log owned by a single component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    entries: Vec<Notification>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event stamped with the wall clock and returns its
    /// sequence number.
    pub fn record(&mut self, event: Event) -> u64 {
        self.record_at(event, Utc::now())
    }

    /// Appends an event stamped with `timestamp`. Components that run on
    /// their own [`Clock`](crate::clock::Clock) use this so notifications
    /// agree with their notion of time.
    pub fn record_at(&mut self, event: Event, timestamp: DateTime<Utc>) -> u64 {
        let sequence = self.entries.len() as u64;
        self.entries.push(Notification {
            sequence,
            timestamp,
            event,
        });
        sequence
    }

    /// All notifications with `sequence >= cursor`, oldest first.
    pub fn since(&self, cursor: u64) -> &[Notification] {
        let start = usize::try_from(cursor)
            .unwrap_or(usize::MAX)
            .min(self.entries.len());
        &self.entries[start..]
    }

    /// Iterates over the bare events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.entries.iter().map(|n| &n.event)
    }

    /// Sequence number the next recorded event will receive.
    pub fn next_sequence(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
