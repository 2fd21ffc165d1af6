use crate::types::AccountId;
use chrono::Duration;
use std::collections::BTreeSet;

/// Maximum creation-time expiry horizon:
/// 6 months * (365.25 / 12) days * 24 * 60 * 60 seconds.
pub const SIX_MONTHS_IN_SECONDS: u64 = 15_778_800;

/// Escrow policy configuration.
///
/// Role membership is injected here rather than compiled in: only accounts
/// in `allowed_creators` may open escrows and only accounts in
/// `allowed_approvers` may be designated as a record's approver.
#[derive(Debug, Clone)]
pub struct EscrowPolicyConfig {
    /// The system's own account: funding destination, source of all
    /// outbound transfers, and the governing authority for `clean`.
    pub escrow_account: AccountId,
    /// Accounts permitted to create escrows.
    pub allowed_creators: BTreeSet<AccountId>,
    /// Accounts permitted to act as a record's designated approver.
    pub allowed_approvers: BTreeSet<AccountId>,
    /// Distinguished system-level arbitration identity. Its approval
    /// reduces the claimable amount as a one-time fee deduction.
    pub arbitration_identity: AccountId,
    /// Percent of the escrowed amount retained after an arbitration
    /// approval. 90 means a 10% fee.
    pub arbitration_retained_percent: u8,
    /// Upper bound on how far ahead of now `expires` may be at creation.
    pub max_expiry_horizon_secs: u64,
}

impl EscrowPolicyConfig {
    pub fn max_expiry_horizon(&self) -> Duration {
        let secs = i64::try_from(self.max_expiry_horizon_secs).unwrap_or(i64::MAX);
        Duration::try_seconds(secs).unwrap_or(Duration::MAX)
    }
}

impl Default for EscrowPolicyConfig {
    fn default() -> Self {
        Self {
            escrow_account: AccountId::new("escrow"),
            allowed_creators: BTreeSet::new(),
            allowed_approvers: BTreeSet::new(),
            arbitration_identity: AccountId::new("arbitration"),
            arbitration_retained_percent: 90,
            max_expiry_horizon_secs: SIX_MONTHS_IN_SECONDS,
        }
    }
}
