//! Keyed escrow record collection with two secondary lookup paths.
//!
//! Pure storage: no business rules live here. All scans are ordered by
//! ascending key so repeated scans over unchanged state are reproducible;
//! downstream logic picks "first match".

use crate::error::EscrowError;
use crate::types::{AccountId, EscrowKey, EscrowRecord, ExternalReference, NewEscrow};
use std::collections::{BTreeMap, BTreeSet};

/// Escrow record store.
///
/// Primary keys are assigned from a monotonically increasing counter and
/// never reused, even after erasure. The external-reference index is
/// structurally non-unique; reference uniqueness is an engine-level rule.
#[derive(Debug, Default, Clone)]
pub struct EscrowStore {
    records: BTreeMap<EscrowKey, EscrowRecord>,
    by_sender: BTreeMap<AccountId, BTreeSet<EscrowKey>>,
    by_external_reference: BTreeMap<ExternalReference, BTreeSet<EscrowKey>>,
    next_key: u64,
}

impl EscrowStore {
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            by_sender: BTreeMap::new(),
            by_external_reference: BTreeMap::new(),
            next_key: 1,
        }
    }

    /// Insert a new record, assigning it a fresh key.
    pub fn insert(&mut self, new: NewEscrow) -> EscrowKey {
        let key = EscrowKey(self.next_key.max(1));
        self.next_key = key.0 + 1;

        let record = EscrowRecord {
            key,
            sender: new.sender,
            receiver: new.receiver,
            approver: new.approver,
            approvals: Vec::new(),
            amount: None,
            memo: new.memo,
            expires: new.expires,
            external_reference: new.external_reference,
            locked: false,
        };

        self.index(&record);
        self.records.insert(key, record);
        key
    }

    pub fn find(&self, key: EscrowKey) -> Option<&EscrowRecord> {
        self.records.get(&key)
    }

    /// Replace the record at `key` with a transformed copy.
    ///
    /// The transformation is pure; the store owns persistence and record
    /// identity, so a transform cannot move the record to another key.
    pub fn modify(
        &mut self,
        key: EscrowKey,
        transform: impl FnOnce(&EscrowRecord) -> EscrowRecord,
    ) -> Result<(), EscrowError> {
        let current = self
            .records
            .get(&key)
            .ok_or_else(|| EscrowError::record_not_found(key))?;
        let previous_sender = current.sender.clone();
        let previous_reference = current.external_reference;

        let mut updated = transform(current);
        updated.key = key;

        self.unindex(previous_sender, previous_reference, key);
        self.index(&updated);
        self.records.insert(key, updated);
        Ok(())
    }

    /// Remove the record at `key` permanently. No tombstone is kept.
    pub fn erase(&mut self, key: EscrowKey) -> Result<EscrowRecord, EscrowError> {
        let record = self
            .records
            .remove(&key)
            .ok_or_else(|| EscrowError::record_not_found(key))?;
        self.unindex(record.sender.clone(), record.external_reference, key);
        Ok(record)
    }

    /// All live records for `sender`, ascending by key.
    pub fn scan_by_sender(&self, sender: &AccountId) -> Vec<&EscrowRecord> {
        self.by_sender
            .get(sender)
            .into_iter()
            .flatten()
            .filter_map(|key| self.records.get(key))
            .collect()
    }

    /// All live records carrying `ext_ref`, ascending by key.
    pub fn scan_by_external_reference(&self, ext_ref: ExternalReference) -> Vec<&EscrowRecord> {
        self.by_external_reference
            .get(&ext_ref)
            .into_iter()
            .flatten()
            .filter_map(|key| self.records.get(key))
            .collect()
    }

    /// All live records, ascending by key.
    pub fn scan_all(&self) -> Vec<&EscrowRecord> {
        self.records.values().collect()
    }

    /// Keys of all live records, ascending.
    pub fn keys(&self) -> Vec<EscrowKey> {
        self.records.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn index(&mut self, record: &EscrowRecord) {
        self.by_sender
            .entry(record.sender.clone())
            .or_default()
            .insert(record.key);
        if let Some(ext_ref) = record.external_reference {
            self.by_external_reference
                .entry(ext_ref)
                .or_default()
                .insert(record.key);
        }
    }

    fn unindex(
        &mut self,
        sender: AccountId,
        external_reference: Option<ExternalReference>,
        key: EscrowKey,
    ) {
        if let Some(keys) = self.by_sender.get_mut(&sender) {
            keys.remove(&key);
            if keys.is_empty() {
                self.by_sender.remove(&sender);
            }
        }
        if let Some(ext_ref) = external_reference {
            if let Some(keys) = self.by_external_reference.get_mut(&ext_ref) {
                keys.remove(&key);
                if keys.is_empty() {
                    self.by_external_reference.remove(&ext_ref);
                }
            }
        }
    }
}
