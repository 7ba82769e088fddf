//! Integration tests for the balance ledger.
//!
//! Covers conservation of BUX across transfers, overdraft protection under
//! concurrent debits, and the retried compensation steps of transfers, code
//! redemption and heist starts when the store misbehaves.

use async_trait::async_trait;
use bux_ledger::{
    BuxError, ErrorKind, LedgerConfig, RetryPolicy, Services,
    auth::UserId,
    errors::BuxResult,
    heist::BankStatus,
    store::{
        AtomicStore, MemoryStore, StoreError, StoreResult, TransformFn, UpdateOutcome, keys,
    },
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Duration,
};

fn fast_config() -> LedgerConfig {
    LedgerConfig {
        retry: RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        },
        ..LedgerConfig::default()
    }
}

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

async fn total(services: &Services, users: &[UserId]) -> u64 {
    let mut sum = 0;
    for user in users {
        sum += services.ledger.balance(user).await.unwrap();
    }
    sum
}

/// Store that fails atomic updates on one key.
///
/// The first `skip` updates go through, the next `failures` time out. With
/// `lose_ack` set a failing update is applied before it errors, the way a
/// lost COMMIT acknowledgement looks to the caller.
struct FlakyStore {
    inner: MemoryStore,
    key: String,
    skip: AtomicU32,
    failures: AtomicU32,
    lose_ack: AtomicBool,
}

impl FlakyStore {
    fn new(key: String, failures: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            key,
            skip: AtomicU32::new(0),
            failures: AtomicU32::new(failures),
            lose_ack: AtomicBool::new(false),
        }
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl AtomicStore for FlakyStore {
    async fn read(&self, key: &str) -> StoreResult<Option<Value>> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, value: Value) -> StoreResult<()> {
        self.inner.write(key, value).await
    }

    async fn batch_write(&self, entries: BTreeMap<String, Value>) -> StoreResult<()> {
        self.inner.batch_write(entries).await
    }

    async fn atomic_update(
        &self,
        key: &str,
        transform: &mut TransformFn<'_>,
    ) -> BuxResult<UpdateOutcome> {
        if key == self.key && !take_one(&self.skip) && take_one(&self.failures) {
            if self.lose_ack.load(Ordering::SeqCst) {
                self.inner.atomic_update(key, transform).await?;
                return Err(StoreError::CommitUnknown {
                    key: key.to_string(),
                    reason: "connection reset".to_string(),
                }
                .into());
            }
            return Err(StoreError::Timeout(Duration::from_millis(5)).into());
        }
        self.inner.atomic_update(key, transform).await
    }
}

#[tokio::test]
async fn test_random_transfers_conserve_total() {
    let services = Services::new(Arc::new(MemoryStore::new()), fast_config());
    let users: Vec<UserId> = ["ann", "ben", "cat", "dan"].into_iter().map(user).collect();
    for user in &users {
        services.ledger.setup_account(user).await.unwrap();
    }

    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..200 {
        let from = &users[rng.random_range(0..users.len())];
        let to = &users[rng.random_range(0..users.len())];
        let amount = rng.random_range(0..=600);

        match services.ledger.transfer(from, to, amount).await {
            Ok(receipt) => assert_eq!(receipt.amount, amount),
            Err(e) => assert!(
                matches!(
                    e.kind(),
                    ErrorKind::SelfTransfer | ErrorKind::InsufficientFunds | ErrorKind::InvalidArgument
                ),
                "unexpected failure: {e}"
            ),
        }
        assert_eq!(total(&services, &users).await, 4_000);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_never_overdraw() {
    let services = Services::new(Arc::new(MemoryStore::new()), fast_config());
    let alice = user("alice");
    services.ledger.setup_account(&alice).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..25 {
        let services = services.clone();
        let alice = alice.clone();
        handles.push(tokio::spawn(async move {
            services.ledger.debit(&alice, 100).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::InsufficientFunds),
        }
    }

    assert_eq!(succeeded, 10);
    assert_eq!(services.ledger.balance(&alice).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_conserve_total() {
    let services = Services::new(Arc::new(MemoryStore::new()), fast_config());
    let users: Vec<UserId> = ["ann", "ben", "cat"].into_iter().map(user).collect();
    for user in &users {
        services.ledger.setup_account(user).await.unwrap();
    }

    let mut handles = Vec::new();
    for i in 0..60 {
        let services = services.clone();
        let from = users[i % 3].clone();
        let to = users[(i + 1) % 3].clone();
        handles.push(tokio::spawn(async move {
            let _ = services.ledger.transfer(&from, &to, 75).await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(total(&services, &users).await, 3_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_setup_creates_once() {
    let services = Services::new(Arc::new(MemoryStore::new()), fast_config());
    let alice = user("alice");

    let mut handles = Vec::new();
    for _ in 0..12 {
        let services = services.clone();
        let alice = alice.clone();
        handles.push(tokio::spawn(async move {
            services.ledger.setup_account(&alice).await
        }));
    }

    let mut created = 0;
    for handle in handles {
        let setup = handle.await.unwrap().unwrap();
        assert_eq!(setup.account.balance, 1_000);
        if setup.created {
            created += 1;
        }
    }

    assert_eq!(created, 1);
}

#[tokio::test]
async fn test_transfer_credit_retries_through_transient_failures() {
    let bob = user("bob");
    let store = Arc::new(FlakyStore::new(keys::account(&bob), 0));
    let services = Services::new(store.clone(), fast_config());
    let alice = user("alice");
    services.ledger.setup_account(&alice).await.unwrap();
    services.ledger.setup_account(&bob).await.unwrap();

    // Fail the next two updates on bob's account: the credit step
    store.failures.store(2, Ordering::SeqCst);
    services.ledger.transfer(&alice, &bob, 300).await.unwrap();

    assert_eq!(services.ledger.balance(&alice).await.unwrap(), 700);
    assert_eq!(services.ledger.balance(&bob).await.unwrap(), 1_300);
}

#[tokio::test]
async fn test_exhausted_credit_is_internal_not_silent() {
    let bob = user("bob");
    let store = Arc::new(FlakyStore::new(keys::account(&bob), 0));
    let services = Services::new(store.clone(), fast_config());
    let alice = user("alice");
    services.ledger.setup_account(&alice).await.unwrap();
    services.ledger.setup_account(&bob).await.unwrap();

    store.failures.store(100, Ordering::SeqCst);
    let err = services.ledger.transfer(&alice, &bob, 300).await.unwrap_err();

    assert!(matches!(err, BuxError::Internal(_)));
    assert_eq!(err.client_message(), "Internal server error");
    assert_eq!(services.ledger.balance(&alice).await.unwrap(), 700);
}

#[tokio::test]
async fn test_unacknowledged_credit_is_not_applied_twice() {
    let bob = user("bob");
    let store = Arc::new(FlakyStore::new(keys::account(&bob), 0));
    let services = Services::new(store.clone(), fast_config());
    let alice = user("alice");
    services.ledger.setup_account(&alice).await.unwrap();
    services.ledger.setup_account(&bob).await.unwrap();

    // The credit lands but its acknowledgement is lost
    store.lose_ack.store(true, Ordering::SeqCst);
    store.failures.store(1, Ordering::SeqCst);
    let err = services.ledger.transfer(&alice, &bob, 300).await.unwrap_err();

    assert!(matches!(err, BuxError::Internal(_)));
    assert_eq!(services.ledger.balance(&alice).await.unwrap(), 700);
    assert_eq!(services.ledger.balance(&bob).await.unwrap(), 1_300);
}

#[tokio::test]
async fn test_redeem_credit_retries_through_transient_failures() {
    let bob = user("bob");
    let store = Arc::new(FlakyStore::new(keys::account(&bob), 0));
    let services = Services::new(store.clone(), fast_config());
    let alice = user("alice");
    services.ledger.setup_account(&alice).await.unwrap();
    services.ledger.setup_account(&bob).await.unwrap();
    let code = services.codes.issue(&alice, 50).await.unwrap();

    store.failures.store(2, Ordering::SeqCst);
    let redemption = services.codes.redeem(&bob, &code.code).await.unwrap();

    assert_eq!(redemption.amount, 50);
    assert_eq!(redemption.new_balance, 1_050);
    assert_eq!(services.ledger.balance(&bob).await.unwrap(), 1_050);
    assert_eq!(services.ledger.balance(&alice).await.unwrap(), 950);

    let record = services.codes.lookup(&code.code).await.unwrap();
    assert!(record.is_redeemed());
    assert_eq!(record.redeemed_by, Some(bob.clone()));

    let err = services.codes.redeem(&bob, &code.code).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyRedeemed);
    assert_eq!(services.ledger.balance(&bob).await.unwrap(), 1_050);
}

#[tokio::test]
async fn test_heist_start_rollback_retries_through_transient_failures() {
    let store = Arc::new(FlakyStore::new(keys::HEIST_BANK.to_string(), 0));
    let services = Services::new(store.clone(), fast_config());
    services.heist.initialize().await.unwrap();
    let broke = user("broke");
    services.ledger.credit(&broke, 10).await.unwrap();

    // The bank transition goes through, the next two bank updates time out
    store.skip.store(1, Ordering::SeqCst);
    store.failures.store(2, Ordering::SeqCst);
    let err = services.heist.start(&broke).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    let status = services.heist.status(&broke).await.unwrap();
    assert_eq!(status.bank_status, BankStatus::Safe);
    assert_eq!(status.crew_size, 0);
    assert_eq!(status.participation, None);
    assert_eq!(services.ledger.balance(&broke).await.unwrap(), 10);
}

#[tokio::test]
async fn test_exhausted_heist_rollback_is_internal() {
    let store = Arc::new(FlakyStore::new(keys::HEIST_BANK.to_string(), 0));
    let services = Services::new(store.clone(), fast_config());
    services.heist.initialize().await.unwrap();
    let broke = user("broke");
    services.ledger.credit(&broke, 10).await.unwrap();

    store.skip.store(1, Ordering::SeqCst);
    store.failures.store(100, Ordering::SeqCst);
    let err = services.heist.start(&broke).await.unwrap_err();

    assert!(matches!(err, BuxError::Internal(_)));
    assert_eq!(err.client_message(), "Internal server error");
}
