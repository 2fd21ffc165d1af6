//! The escrow state machine.
//!
//! Every operation is a single atomic unit: all precondition checks run
//! before any store mutation or outbound collaborator call, so a failure
//! anywhere aborts the call with no partial effect. Cross-call ordering
//! (create before fund, fund before approve) is enforced purely through
//! state predicates, never through explicit sequencing.

use crate::collaborators::{AccountDirectory, AuthContext, Clock, FundTransferGateway, NotificationBus};
use crate::config::EscrowPolicyConfig;
use crate::error::EscrowError;
use crate::resolver::ExternalKeyResolver;
use crate::store::EscrowStore;
use crate::sweep::AdminSweep;
use crate::types::{AccountId, AssetAmount, EscrowKey, EscrowRecord, ExternalReference, NewEscrow};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Escrow engine: validates preconditions, mutates records through the
/// store, and calls out to the transfer and notification collaborators.
pub struct EscrowEngine {
    store: EscrowStore,
    config: EscrowPolicyConfig,
    directory: Arc<dyn AccountDirectory>,
    auth: Arc<dyn AuthContext>,
    clock: Arc<dyn Clock>,
    gateway: Arc<dyn FundTransferGateway>,
    notifications: Arc<dyn NotificationBus>,
}

impl EscrowEngine {
    pub fn new(
        config: EscrowPolicyConfig,
        directory: Arc<dyn AccountDirectory>,
        auth: Arc<dyn AuthContext>,
        clock: Arc<dyn Clock>,
        gateway: Arc<dyn FundTransferGateway>,
        notifications: Arc<dyn NotificationBus>,
    ) -> Self {
        Self {
            store: EscrowStore::new(),
            config,
            directory,
            auth,
            clock,
            gateway,
            notifications,
        }
    }

    pub fn store(&self) -> &EscrowStore {
        &self.store
    }

    pub fn config(&self) -> &EscrowPolicyConfig {
        &self.config
    }

    /// Open a new, unfilled escrow. Returns the assigned key.
    pub fn create(
        &mut self,
        sender: &AccountId,
        receiver: &AccountId,
        approver: &AccountId,
        expires: DateTime<Utc>,
        memo: &str,
        external_reference: Option<ExternalReference>,
    ) -> Result<EscrowKey, EscrowError> {
        self.auth.require_auth(sender)?;

        if sender == receiver {
            return Err(EscrowError::Validation("cannot escrow to self".to_string()));
        }
        if receiver == approver {
            return Err(EscrowError::Validation(
                "receiver cannot be approver".to_string(),
            ));
        }
        if !self.directory.exists(receiver) {
            return Err(EscrowError::Validation(format!(
                "receiver account {receiver} does not exist"
            )));
        }
        if !self.directory.exists(approver) {
            return Err(EscrowError::Validation(format!(
                "approver account {approver} does not exist"
            )));
        }

        let now = self.clock.now();
        if expires <= now {
            return Err(EscrowError::Validation(
                "expires must be a time in the future".to_string(),
            ));
        }
        let horizon_end = now.checked_add_signed(self.config.max_expiry_horizon());
        if horizon_end.map_or(false, |end| expires > end) {
            return Err(EscrowError::Validation(format!(
                "expires must be within {} seconds from now",
                self.config.max_expiry_horizon_secs
            )));
        }

        if !self.config.allowed_creators.contains(sender) {
            return Err(EscrowError::Validation(format!(
                "{sender} is not a permitted escrow creator"
            )));
        }
        if !self.config.allowed_approvers.contains(approver) {
            return Err(EscrowError::Validation(format!(
                "{approver} is not a permitted approver"
            )));
        }

        if self
            .store
            .scan_by_sender(sender)
            .iter()
            .any(|record| !record.is_funded())
        {
            return Err(EscrowError::Conflict(format!(
                "{sender} already has an unfilled escrow; fund it or cancel it"
            )));
        }
        if let Some(ext_ref) = external_reference {
            if ExternalKeyResolver::new(&self.store).resolve(ext_ref).is_some() {
                return Err(EscrowError::Conflict(format!(
                    "external reference {ext_ref} is already in use"
                )));
            }
        }

        let key = self.store.insert(NewEscrow {
            sender: sender.clone(),
            receiver: receiver.clone(),
            approver: approver.clone(),
            memo: memo.to_string(),
            expires,
            external_reference,
        });

        self.notifications.notify(sender);
        self.notifications.notify(receiver);
        self.notifications.notify(approver);

        info!(%key, %sender, %receiver, %approver, "escrow created");
        Ok(key)
    }

    /// Handle an inbound deposit landing on the escrow account.
    ///
    /// Deposits addressed to any other account are ignored without error.
    /// The deposit fills the depositor's first (lowest-key) unfilled
    /// record; exactly one record is ever matched per call.
    pub fn fund(
        &mut self,
        depositor: &AccountId,
        to: &AccountId,
        deposit: AssetAmount,
    ) -> Result<(), EscrowError> {
        if *to != self.config.escrow_account {
            debug!(%depositor, %to, "ignoring deposit not addressed to the escrow account");
            return Ok(());
        }
        self.auth.require_auth(depositor)?;

        if deposit.amount == 0 {
            return Err(EscrowError::Validation(
                "deposit must be a positive amount".to_string(),
            ));
        }

        let key = self
            .store
            .scan_by_sender(depositor)
            .iter()
            .find(|record| !record.is_funded())
            .map(|record| record.key)
            .ok_or_else(|| {
                EscrowError::NotFound(format!(
                    "no unfilled escrow for depositor {depositor}; deposit rejected"
                ))
            })?;

        let amount = deposit.clone();
        self.store.modify(key, move |record| {
            let mut updated = record.clone();
            updated.amount = Some(deposit);
            updated
        })?;

        info!(%key, %depositor, %amount, "escrow funded");
        Ok(())
    }

    /// Append `approver` to the record's approvals.
    ///
    /// Approval by the configured arbitration identity reduces the
    /// claimable amount as a one-time fee deduction; the duplicate check
    /// makes a second deduction by the same identity impossible.
    pub fn approve(&mut self, key: EscrowKey, approver: &AccountId) -> Result<(), EscrowError> {
        self.auth.require_auth(approver)?;
        let record = self.fetch(key)?;

        if !record.is_funded() {
            return Err(EscrowError::State(
                "escrow has not been funded".to_string(),
            ));
        }
        if record.sender != *approver && record.approver != *approver {
            return Err(EscrowError::Authorization(format!(
                "{approver} is not allowed to approve this escrow"
            )));
        }
        if record.has_approval(approver) {
            return Err(EscrowError::Conflict(format!(
                "{approver} has already approved this escrow"
            )));
        }

        let arbitration = self.config.arbitration_identity.clone();
        let retained_percent = self.config.arbitration_retained_percent;
        let signer = approver.clone();

        debug!(%key, %approver, "escrow approved");
        self.store.modify(key, move |record| {
            let mut updated = record.clone();
            if signer == arbitration {
                updated.amount = updated
                    .amount
                    .map(|amount| amount.retain_percent(retained_percent));
            }
            updated.approvals.push(signer);
            updated
        })
    }

    pub fn approve_ext(
        &mut self,
        ext_ref: ExternalReference,
        approver: &AccountId,
    ) -> Result<(), EscrowError> {
        let key = self.resolve_reference(ext_ref)?;
        self.approve(key, approver)
    }

    /// Remove `caller`'s own entry from the record's approvals.
    pub fn unapprove(&mut self, key: EscrowKey, caller: &AccountId) -> Result<(), EscrowError> {
        self.auth.require_auth(caller)?;
        let record = self.fetch(key)?;

        if !record.has_approval(caller) {
            return Err(EscrowError::State(format!(
                "{caller} has not approved this escrow"
            )));
        }

        let signer = caller.clone();
        debug!(%key, %caller, "escrow approval withdrawn");
        self.store.modify(key, move |record| {
            let mut updated = record.clone();
            updated.approvals.retain(|approval| *approval != signer);
            updated
        })
    }

    pub fn unapprove_ext(
        &mut self,
        ext_ref: ExternalReference,
        caller: &AccountId,
    ) -> Result<(), EscrowError> {
        let key = self.resolve_reference(ext_ref)?;
        self.unapprove(key, caller)
    }

    /// Release the full amount to the receiver and erase the record.
    ///
    /// Reaching quorum is sufficient authority: claim carries no
    /// caller-identity restriction beyond general authentication. This is
    /// a deliberate permissionless-release design, not an oversight.
    pub fn claim(&mut self, key: EscrowKey) -> Result<(), EscrowError> {
        let record = self.fetch(key)?;

        let Some(amount) = record.amount.clone() else {
            return Err(EscrowError::State(
                "escrow has not been funded".to_string(),
            ));
        };
        if record.locked {
            return Err(EscrowError::State(
                "escrow is locked by the approver".to_string(),
            ));
        }
        if record.approvals.is_empty() {
            return Err(EscrowError::State(
                "escrow has not received the required approvals".to_string(),
            ));
        }

        self.gateway.send(
            &self.config.escrow_account,
            &record.receiver,
            &amount,
            &record.memo,
        )?;
        self.store.erase(key)?;

        info!(%key, receiver = %record.receiver, amount = %amount, "escrow claimed");
        Ok(())
    }

    pub fn claim_ext(&mut self, ext_ref: ExternalReference) -> Result<(), EscrowError> {
        let key = self.resolve_reference(ext_ref)?;
        self.claim(key)
    }

    /// Return the full amount to the sender once the deadline has passed.
    pub fn refund(&mut self, key: EscrowKey) -> Result<(), EscrowError> {
        let record = self.fetch(key)?;
        self.auth.require_auth(&record.sender)?;

        let Some(amount) = record.amount.clone() else {
            return Err(EscrowError::State(
                "escrow has not been funded".to_string(),
            ));
        };
        if record.locked {
            return Err(EscrowError::State(
                "escrow is locked by the approver".to_string(),
            ));
        }
        if self.clock.now() < record.expires {
            return Err(EscrowError::State("escrow has not expired".to_string()));
        }

        self.gateway.send(
            &self.config.escrow_account,
            &record.sender,
            &amount,
            &record.memo,
        )?;
        self.store.erase(key)?;

        info!(%key, sender = %record.sender, amount = %amount, "escrow refunded");
        Ok(())
    }

    pub fn refund_ext(&mut self, ext_ref: ExternalReference) -> Result<(), EscrowError> {
        let key = self.resolve_reference(ext_ref)?;
        self.refund(key)
    }

    /// Erase an unfilled record. A funded record cannot be cancelled, only
    /// closed or refunded.
    pub fn cancel(&mut self, key: EscrowKey) -> Result<(), EscrowError> {
        let record = self.fetch(key)?;
        self.auth.require_auth(&record.sender)?;

        if record.is_funded() {
            return Err(EscrowError::State(
                "a funded escrow cannot be cancelled".to_string(),
            ));
        }

        self.store.erase(key)?;
        info!(%key, sender = %record.sender, "escrow cancelled");
        Ok(())
    }

    pub fn cancel_ext(&mut self, ext_ref: ExternalReference) -> Result<(), EscrowError> {
        let key = self.resolve_reference(ext_ref)?;
        self.cancel(key)
    }

    /// Approver's unilateral abort: return the full amount to the sender
    /// and erase the record, regardless of expiry or lock state.
    pub fn close(&mut self, key: EscrowKey) -> Result<(), EscrowError> {
        let record = self.fetch(key)?;
        self.auth.require_auth(&record.approver)?;

        let Some(amount) = record.amount.clone() else {
            return Err(EscrowError::State(
                "escrow has not been funded".to_string(),
            ));
        };

        self.gateway.send(
            &self.config.escrow_account,
            &record.sender,
            &amount,
            &record.memo,
        )?;
        self.store.erase(key)?;

        info!(%key, sender = %record.sender, amount = %amount, "escrow closed");
        Ok(())
    }

    pub fn close_ext(&mut self, ext_ref: ExternalReference) -> Result<(), EscrowError> {
        let key = self.resolve_reference(ext_ref)?;
        self.close(key)
    }

    /// Overwrite the deadline. The sender may only push it later; the
    /// approver may set any value.
    pub fn extend(
        &mut self,
        key: EscrowKey,
        new_expires: DateTime<Utc>,
    ) -> Result<(), EscrowError> {
        let record = self.fetch(key)?;

        if !record.is_funded() {
            return Err(EscrowError::State(
                "escrow has not been funded".to_string(),
            ));
        }
        if self.auth.has_auth(&record.sender) {
            if new_expires <= record.expires {
                return Err(EscrowError::Validation(
                    "the sender may only extend the expiry".to_string(),
                ));
            }
        } else {
            self.auth.require_auth(&record.approver)?;
        }

        debug!(%key, %new_expires, "escrow expiry changed");
        self.store.modify(key, move |record| {
            let mut updated = record.clone();
            updated.expires = new_expires;
            updated
        })
    }

    pub fn extend_ext(
        &mut self,
        ext_ref: ExternalReference,
        new_expires: DateTime<Utc>,
    ) -> Result<(), EscrowError> {
        let key = self.resolve_reference(ext_ref)?;
        self.extend(key, new_expires)
    }

    /// Set or clear the approver's veto flag. While set, claim and refund
    /// are blocked; close, cancel, and extend are unaffected.
    pub fn lock(&mut self, key: EscrowKey, locked: bool) -> Result<(), EscrowError> {
        let record = self.fetch(key)?;
        self.auth.require_auth(&record.approver)?;

        if !record.is_funded() {
            return Err(EscrowError::State(
                "escrow has not been funded".to_string(),
            ));
        }

        debug!(%key, locked, "escrow lock flag changed");
        self.store.modify(key, move |record| {
            let mut updated = record.clone();
            updated.locked = locked;
            updated
        })
    }

    pub fn lock_ext(
        &mut self,
        ext_ref: ExternalReference,
        locked: bool,
    ) -> Result<(), EscrowError> {
        let key = self.resolve_reference(ext_ref)?;
        self.lock(key, locked)
    }

    /// Administrative sweep: erase every live record. See [`AdminSweep`].
    pub fn clean(&mut self) -> Result<usize, EscrowError> {
        AdminSweep::run(
            self.auth.as_ref(),
            &self.config.escrow_account,
            &mut self.store,
        )
    }

    fn fetch(&self, key: EscrowKey) -> Result<EscrowRecord, EscrowError> {
        self.store
            .find(key)
            .cloned()
            .ok_or_else(|| EscrowError::record_not_found(key))
    }

    fn resolve_reference(&self, ext_ref: ExternalReference) -> Result<EscrowKey, EscrowError> {
        ExternalKeyResolver::new(&self.store)
            .resolve(ext_ref)
            .ok_or_else(|| EscrowError::reference_not_found(ext_ref))
    }
}
