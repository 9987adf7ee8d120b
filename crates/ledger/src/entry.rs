//! Ledger entries and the request lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use alphabank_core::{Amount, TransactionId, Username};

/// What kind of money movement an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Send,
    Request,
    Deposit,
    Withdrawal,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Send => "send",
            EntryKind::Request => "request",
            EntryKind::Deposit => "deposit",
            EntryKind::Withdrawal => "withdrawal",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "send" => Some(EntryKind::Send),
            "request" => Some(EntryKind::Request),
            "deposit" => Some(EntryKind::Deposit),
            "withdrawal" => Some(EntryKind::Withdrawal),
            _ => None,
        }
    }

    /// Only requests wait for the payer; every other kind has already moved
    /// money by the time its entry is written.
    pub fn initial_status(&self) -> EntryStatus {
        match self {
            EntryKind::Request => EntryStatus::Pending,
            EntryKind::Send | EntryKind::Deposit | EntryKind::Withdrawal => EntryStatus::Approved,
        }
    }
}

impl core::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of an entry.
///
/// ```text
/// pending ──approve──▶ approved
///    │
///    └──reject/cancel──▶ rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Approved,
    Rejected,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Approved => "approved",
            EntryStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(EntryStatus::Pending),
            "approved" => Some(EntryStatus::Approved),
            "rejected" => Some(EntryStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, EntryStatus::Pending)
    }

    pub fn can_transition_to(&self, next: EntryStatus) -> bool {
        matches!(
            (self, next),
            (EntryStatus::Pending, EntryStatus::Approved) | (EntryStatus::Pending, EntryStatus::Rejected)
        )
    }
}

impl core::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record of a money movement or a money request.
///
/// For requests, `from_username` is the party expected to pay and
/// `to_username` the party that raised the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub transaction_id: TransactionId,
    pub from_username: Username,
    pub to_username: Username,
    pub amount: Amount,
    pub kind: EntryKind,
    pub status: EntryStatus,
    pub version: u64,
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        kind: EntryKind,
        from_username: Username,
        to_username: Username,
        amount: Amount,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id: TransactionId::new(),
            from_username,
            to_username,
            amount,
            kind,
            status: kind.initial_status(),
            version: 0,
            timestamp,
        }
    }

    pub fn is_party(&self, username: &Username) -> bool {
        &self.from_username == username || &self.to_username == username
    }

    /// The entry as it looks after a successful status transition, or `None`
    /// if the state machine forbids it.
    pub fn transitioned(&self, next: EntryStatus, at: DateTime<Utc>) -> Option<LedgerEntry> {
        if !self.status.can_transition_to(next) {
            return None;
        }
        Some(LedgerEntry {
            status: next,
            version: self.version + 1,
            timestamp: at,
            ..self.clone()
        })
    }
}

impl core::fmt::Display for LedgerEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} {} {} -> {} ${} [{}]",
            self.transaction_id,
            self.kind,
            self.from_username,
            self.to_username,
            self.amount,
            self.status
        )
    }
}
