//! Translation from an external reference to the store's primary key.

use crate::store::EscrowStore;
use crate::types::{EscrowKey, ExternalReference};

/// Thin view over the store's external-reference index.
///
/// When more than one live record carries the same reference (the index is
/// structurally non-unique), the record with the lowest key wins.
pub struct ExternalKeyResolver<'a> {
    store: &'a EscrowStore,
}

impl<'a> ExternalKeyResolver<'a> {
    pub fn new(store: &'a EscrowStore) -> Self {
        Self { store }
    }

    pub fn resolve(&self, ext_ref: ExternalReference) -> Option<EscrowKey> {
        self.store
            .scan_by_external_reference(ext_ref)
            .first()
            .map(|record| record.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountId, NewEscrow};
    use chrono::Utc;

    fn draft(sender: &str, ext_ref: Option<u64>) -> NewEscrow {
        NewEscrow {
            sender: AccountId::new(sender),
            receiver: AccountId::new("receiver"),
            approver: AccountId::new("approver"),
            memo: String::new(),
            expires: Utc::now(),
            external_reference: ext_ref,
        }
    }

    #[test]
    fn resolves_to_lowest_key_first() {
        let mut store = EscrowStore::new();
        store.insert(draft("alice", Some(42)));
        let shadowed = store.insert(draft("bob", Some(42)));

        let resolver = ExternalKeyResolver::new(&store);
        let resolved = resolver.resolve(42).unwrap();
        assert_eq!(resolved, EscrowKey(1));
        assert_ne!(resolved, shadowed);
    }

    #[test]
    fn unknown_reference_resolves_to_none() {
        let mut store = EscrowStore::new();
        store.insert(draft("alice", None));

        let resolver = ExternalKeyResolver::new(&store);
        assert!(resolver.resolve(42).is_none());
    }
}
