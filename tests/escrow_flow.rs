//! End-to-end operation sequences against stub collaborators.

use chrono::{DateTime, Duration, Utc};
use escrow_ledger::{
    AccountDirectory, AccountId, AssetAmount, AuthContext, Clock, EscrowEngine, EscrowError,
    EscrowKey, EscrowPolicyConfig, FundTransferGateway, NotificationBus,
};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

const SENDER: &str = "alice";
const RECEIVER: &str = "bob";
const APPROVER: &str = "carol";
const ESCROW_ACCOUNT: &str = "escrow";
const ISSUER: &str = "token.hub";

struct OpenDirectory;

impl AccountDirectory for OpenDirectory {
    fn exists(&self, _account: &AccountId) -> bool {
        true
    }
}

struct StubAuth {
    caller: Mutex<AccountId>,
}

impl StubAuth {
    fn set(&self, caller: &str) {
        *self.caller.lock().unwrap() = AccountId::new(caller);
    }
}

impl AuthContext for StubAuth {
    fn has_auth(&self, account: &AccountId) -> bool {
        *self.caller.lock().unwrap() == *account
    }
}

struct StubClock {
    now: Mutex<DateTime<Utc>>,
}

impl Clock for StubClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Default)]
struct RecordingGateway {
    transfers: Mutex<Vec<(AccountId, AccountId, AssetAmount, String)>>,
}

impl FundTransferGateway for RecordingGateway {
    fn send(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: &AssetAmount,
        memo: &str,
    ) -> Result<(), EscrowError> {
        self.transfers.lock().unwrap().push((
            from.clone(),
            to.clone(),
            amount.clone(),
            memo.to_string(),
        ));
        Ok(())
    }
}

struct SilentBus;

impl NotificationBus for SilentBus {
    fn notify(&self, _account: &AccountId) {}
}

struct Harness {
    engine: EscrowEngine,
    auth: Arc<StubAuth>,
    clock: Arc<StubClock>,
    gateway: Arc<RecordingGateway>,
}

fn harness() -> Harness {
    let auth = Arc::new(StubAuth {
        caller: Mutex::new(AccountId::new(SENDER)),
    });
    let clock = Arc::new(StubClock {
        now: Mutex::new(Utc::now()),
    });
    let gateway = Arc::new(RecordingGateway::default());

    let config = EscrowPolicyConfig {
        escrow_account: AccountId::new(ESCROW_ACCOUNT),
        allowed_creators: [AccountId::new(SENDER)].into(),
        allowed_approvers: [AccountId::new(APPROVER)].into(),
        ..EscrowPolicyConfig::default()
    };

    let engine = EscrowEngine::new(
        config,
        Arc::new(OpenDirectory),
        auth.clone(),
        clock.clone(),
        gateway.clone(),
        Arc::new(SilentBus),
    );

    Harness {
        engine,
        auth,
        clock,
        gateway,
    }
}

fn create(h: &mut Harness, ext_ref: Option<u64>) -> EscrowKey {
    h.auth.set(SENDER);
    let expires = h.clock.now() + Duration::days(10);
    h.engine
        .create(
            &AccountId::new(SENDER),
            &AccountId::new(RECEIVER),
            &AccountId::new(APPROVER),
            expires,
            "m",
            ext_ref,
        )
        .unwrap()
}

fn fund(h: &mut Harness, amount: u64) {
    h.auth.set(SENDER);
    h.engine
        .fund(
            &AccountId::new(SENDER),
            &AccountId::new(ESCROW_ACCOUNT),
            AssetAmount::new(amount, "BOS", AccountId::new(ISSUER)),
        )
        .unwrap();
}

#[test]
fn create_fund_approve_claim_releases_to_receiver() {
    let mut h = harness();
    let key = create(&mut h, None);
    assert_eq!(key, EscrowKey(1));

    fund(&mut h, 100);
    assert_eq!(
        h.engine
            .store()
            .find(key)
            .unwrap()
            .amount
            .as_ref()
            .unwrap()
            .amount,
        100
    );

    h.auth.set(APPROVER);
    h.engine.approve(key, &AccountId::new(APPROVER)).unwrap();

    // Quorum is sufficient authority: any authenticated caller may claim.
    h.auth.set(RECEIVER);
    h.engine.claim(key).unwrap();

    assert!(h.engine.store().find(key).is_none());
    let transfers = h.gateway.transfers.lock().unwrap();
    assert_eq!(transfers.len(), 1);
    let (from, to, amount, memo) = &transfers[0];
    assert_eq!(*from, AccountId::new(ESCROW_ACCOUNT));
    assert_eq!(*to, AccountId::new(RECEIVER));
    assert_eq!(amount.amount, 100);
    assert_eq!(memo, "m");
}

#[test]
fn external_reference_aliases_the_primary_key() {
    let mut h = harness();
    let key = create(&mut h, Some(42));
    fund(&mut h, 100);

    h.auth.set(APPROVER);
    h.engine.approve_ext(42, &AccountId::new(APPROVER)).unwrap();
    assert!(h
        .engine
        .store()
        .find(key)
        .unwrap()
        .has_approval(&AccountId::new(APPROVER)));

    let expires = h.clock.now() + Duration::days(10);
    h.auth.set(SENDER);
    let err = h
        .engine
        .create(
            &AccountId::new(SENDER),
            &AccountId::new(RECEIVER),
            &AccountId::new(APPROVER),
            expires,
            "m",
            Some(42),
        )
        .unwrap_err();
    assert!(matches!(err, EscrowError::Conflict(_)));
}

#[test]
fn refund_after_expiry_returns_funds_and_erases() {
    let mut h = harness();
    let key = create(&mut h, None);
    fund(&mut h, 100);

    h.auth.set(SENDER);
    assert!(matches!(
        h.engine.refund(key),
        Err(EscrowError::State(_))
    ));

    *h.clock.now.lock().unwrap() += Duration::days(10);
    h.engine.refund(key).unwrap();

    assert!(h.engine.store().find(key).is_none());
    let transfers = h.gateway.transfers.lock().unwrap();
    assert_eq!(transfers[0].1, AccountId::new(SENDER));
}

#[test]
fn deadline_moves_are_role_asymmetric() {
    let mut h = harness();
    let key = create(&mut h, None);
    fund(&mut h, 100);
    let original = h.engine.store().find(key).unwrap().expires;

    h.auth.set(SENDER);
    let err = h
        .engine
        .extend(key, original - Duration::days(1))
        .unwrap_err();
    assert!(matches!(err, EscrowError::Validation(_)));

    h.auth.set(APPROVER);
    h.engine.extend(key, original - Duration::days(1)).unwrap();
    assert_eq!(
        h.engine.store().find(key).unwrap().expires,
        original - Duration::days(1)
    );
}

// -- property coverage -----------------------------------------------------

#[derive(Debug, Clone)]
enum Op {
    Fund(u64),
    Approve(usize),
    Unapprove(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u64..=1_000).prop_map(Op::Fund),
        (0usize..3).prop_map(Op::Approve),
        (0usize..3).prop_map(Op::Unapprove),
    ]
}

proptest! {
    /// Over arbitrary operation sequences, a record is funded at most once
    /// and its approvals never contain a duplicate identity.
    #[test]
    fn funding_is_one_shot_and_approvals_stay_unique(
        ops in proptest::collection::vec(op_strategy(), 1..40)
    ) {
        let signers = [SENDER, APPROVER, RECEIVER];
        let mut h = harness();
        let key = create(&mut h, None);
        let mut funded_amount: Option<u64> = None;

        for op in ops {
            match op {
                Op::Fund(amount) => {
                    h.auth.set(SENDER);
                    let _ = h.engine.fund(
                        &AccountId::new(SENDER),
                        &AccountId::new(ESCROW_ACCOUNT),
                        AssetAmount::new(amount, "BOS", AccountId::new(ISSUER)),
                    );
                }
                Op::Approve(signer) => {
                    let signer = signers[signer];
                    h.auth.set(signer);
                    let _ = h.engine.approve(key, &AccountId::new(signer));
                }
                Op::Unapprove(signer) => {
                    let signer = signers[signer];
                    h.auth.set(signer);
                    let _ = h.engine.unapprove(key, &AccountId::new(signer));
                }
            }

            let record = h.engine.store().find(key).unwrap();

            // Once funded, the magnitude never changes again (no arbitration
            // identity is in play here), and it never reverts to unfilled.
            if let Some(previous) = funded_amount {
                prop_assert_eq!(
                    record.amount.as_ref().map(|a| a.amount),
                    Some(previous)
                );
            } else {
                funded_amount = record.amount.as_ref().map(|a| a.amount);
            }

            let unique: BTreeSet<&AccountId> = record.approvals.iter().collect();
            prop_assert_eq!(unique.len(), record.approvals.len());
        }
    }
}
