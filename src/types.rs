use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account identity as known to the hosting environment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Primary key of an escrow record, assigned by the store and never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EscrowKey(pub u64);

impl fmt::Display for EscrowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-supplied correlation id, an alternate lookup path to a record's
/// primary key. Absent on a record means the record is unreachable through
/// the external-reference operation family.
pub type ExternalReference = u64;

/// A (magnitude, asset-kind, issuing-authority) triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAmount {
    /// Magnitude in the asset's minor units.
    pub amount: u64,
    /// Asset kind, e.g. a currency or token symbol.
    pub symbol: String,
    /// Authority that issued the asset and settles transfers of it.
    pub issuer: AccountId,
}

impl AssetAmount {
    pub fn new(amount: u64, symbol: impl Into<String>, issuer: AccountId) -> Self {
        Self {
            amount,
            symbol: symbol.into(),
            issuer,
        }
    }

    /// Scale the magnitude down to `percent` of its current value,
    /// flooring to whole minor units.
    pub fn retain_percent(&self, percent: u8) -> Self {
        let retained = (u128::from(self.amount) * u128::from(percent) / 100) as u64;
        Self {
            amount: retained,
            symbol: self.symbol.clone(),
            issuer: self.issuer.clone(),
        }
    }
}

impl fmt::Display for AssetAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}@{}", self.amount, self.symbol, self.issuer)
    }
}

/// One escrow instance.
///
/// `amount` is `None` until exactly one funding deposit lands, after which
/// it never reverts. Records are erased outright on claim, refund, cancel,
/// or close; there are no tombstones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRecord {
    pub key: EscrowKey,
    /// Creator and funder; authority for cancel, refund, and bounded extend.
    pub sender: AccountId,
    /// Intended beneficiary of claim.
    pub receiver: AccountId,
    /// Designated authority for close, lock, and unbounded extend; also one
    /// eligible approval signer.
    pub approver: AccountId,
    /// Ordered approval signers, duplicate-free.
    pub approvals: Vec<AccountId>,
    /// Escrowed funds; `None` while the record is unfilled.
    pub amount: Option<AssetAmount>,
    /// Opaque text carried through to the eventual transfer.
    pub memo: String,
    /// Deadline gating refund eligibility.
    pub expires: DateTime<Utc>,
    pub external_reference: Option<ExternalReference>,
    /// Approver veto flag; while set, claim and refund are blocked.
    pub locked: bool,
}

impl EscrowRecord {
    pub fn is_funded(&self) -> bool {
        self.amount.is_some()
    }

    pub fn has_approval(&self, account: &AccountId) -> bool {
        self.approvals.contains(account)
    }
}

/// Record fields supplied at creation; the store assigns the key.
#[derive(Debug, Clone)]
pub struct NewEscrow {
    pub sender: AccountId,
    pub receiver: AccountId,
    pub approver: AccountId,
    pub memo: String,
    pub expires: DateTime<Utc>,
    pub external_reference: Option<ExternalReference>,
}
