//! Concurrent transfer tests
//!
//! Many threads move money between a small set of accounts at once, in both
//! directions. Whatever interleaving happens, money must be conserved and no
//! balance may go negative.
//!
//! Run with: cargo test --test concurrent_transfer_test -- --nocapture

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;

use chrono::Utc;
use rust_decimal::Decimal;
use tempfile::TempDir;

use moza_core::config::Config;
use moza_core::domain::{AccountType, Currency, NewUser};
use moza_core::services::TransferRequest;
use moza_core::{Error, MozaContext};

/// Number of concurrent threads
const THREAD_COUNT: usize = 8;

/// Transfers attempted per thread
const TRANSFERS_PER_THREAD: usize = 25;

const ACCOUNT_COUNT: usize = 4;

/// Opening balance of every account, in cents
const OPENING_BALANCE: i64 = 100_00;

fn create_shared_context(dir: &TempDir) -> Arc<MozaContext> {
    let mut config = Config::default();
    config.auth.jwt_secret = "concurrent-tests-secret".to_string();
    config.save(dir.path()).unwrap();
    Arc::new(MozaContext::new(dir.path()).unwrap())
}

/// Create one user owning `ACCOUNT_COUNT` funded accounts
fn seed_accounts(ctx: &MozaContext) -> (i64, Vec<i64>) {
    let user_id = ctx
        .repository
        .insert_user(&NewUser {
            username: "treasurer".to_string(),
            email: "treasurer@example.com".to_string(),
            password_hash: "unused".to_string(),
            full_name: String::new(),
            created_at: Utc::now(),
        })
        .unwrap()
        .id;

    let account_ids = (0..ACCOUNT_COUNT)
        .map(|_| {
            let account = ctx
                .account_service
                .create_account(user_id, AccountType::Checking, Currency::Usd)
                .unwrap();
            ctx.transfer_service
                .fund_account(account.id, Decimal::new(OPENING_BALANCE, 2))
                .unwrap();
            account.id
        })
        .collect();

    (user_id, account_ids)
}

/// Pick a (from, to) pair and amount that varies by thread and iteration
fn plan_transfer(account_ids: &[i64], thread_id: usize, i: usize) -> TransferRequest {
    let from = (thread_id + i) % ACCOUNT_COUNT;
    let offset = 1 + (thread_id * 7 + i) % (ACCOUNT_COUNT - 1);
    let to = (from + offset) % ACCOUNT_COUNT;
    // Between 5.00 and 45.37 so some transfers run accounts dry
    let cents = 5_00 + ((thread_id * 131 + i * 977) % 4_037) as i64;

    TransferRequest {
        from_account_id: account_ids[from],
        to_account_id: account_ids[to],
        amount: Decimal::new(cents, 2),
        description: format!("t{}_i{}", thread_id, i),
    }
}

#[test]
fn test_concurrent_transfers_conserve_money() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_shared_context(&temp_dir);
    let (user_id, account_ids) = seed_accounts(&ctx);
    let account_ids = Arc::new(account_ids);

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let completed = Arc::new(AtomicUsize::new(0));
    let insufficient = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    let handles: Vec<_> = (0..THREAD_COUNT)
        .map(|thread_id| {
            let ctx = Arc::clone(&ctx);
            let account_ids = Arc::clone(&account_ids);
            let barrier = Arc::clone(&barrier);
            let completed = Arc::clone(&completed);
            let insufficient = Arc::clone(&insufficient);

            thread::spawn(move || {
                barrier.wait();
                for i in 0..TRANSFERS_PER_THREAD {
                    let request = plan_transfer(&account_ids, thread_id, i);
                    match ctx.transfer_service.transfer(user_id, &request) {
                        Ok(_) => {
                            completed.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(Error::InsufficientBalance) => {
                            insufficient.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(e) => panic!("Thread {} transfer {} failed: {}", thread_id, i, e),
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Transfer thread panicked");
    }

    let completed = completed.load(Ordering::SeqCst);
    let insufficient = insufficient.load(Ordering::SeqCst);
    println!(
        "{} completed, {} insufficient in {:?}",
        completed,
        insufficient,
        start.elapsed()
    );
    assert_eq!(completed + insufficient, THREAD_COUNT * TRANSFERS_PER_THREAD);
    assert!(completed > 0);

    // Conservation: the total never changes
    let balances: Vec<Decimal> = account_ids
        .iter()
        .map(|id| ctx.repository.find_account(*id).unwrap().unwrap().balance)
        .collect();
    let total: Decimal = balances.iter().copied().sum();
    assert_eq!(total, Decimal::new(OPENING_BALANCE * ACCOUNT_COUNT as i64, 2));
    assert!(balances.iter().all(|b| *b >= Decimal::ZERO), "negative balance: {:?}", balances);

    // Every completed transfer left exactly one record, and the records explain every balance
    let mut references = std::collections::HashSet::new();
    for (id, balance) in account_ids.iter().zip(&balances) {
        let history = ctx.transfer_service.list_transactions(user_id, *id).unwrap();
        let mut expected = Decimal::new(OPENING_BALANCE, 2);
        for tx in &history {
            if tx.from_account_id == *id {
                expected -= tx.amount;
            } else {
                expected += tx.amount;
            }
            references.insert(tx.reference.clone());
        }
        assert_eq!(expected, *balance, "history does not explain account {}", id);
    }
    assert_eq!(references.len(), completed);
    assert_eq!(
        ctx.status_service.get_status().unwrap().total_transactions,
        completed as i64
    );
}

#[test]
fn test_opposing_transfers_do_not_deadlock() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_shared_context(&temp_dir);
    let (user_id, account_ids) = seed_accounts(&ctx);
    let (a, b) = (account_ids[0], account_ids[1]);

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = [(a, b), (b, a)]
        .into_iter()
        .map(|(from, to)| {
            let ctx = Arc::clone(&ctx);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..TRANSFERS_PER_THREAD {
                    let request = TransferRequest {
                        from_account_id: from,
                        to_account_id: to,
                        amount: Decimal::new(1_00, 2),
                        description: String::new(),
                    };
                    ctx.transfer_service.transfer(user_id, &request).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Transfer thread panicked");
    }

    // Equal and opposite flows cancel out
    let balance = |id| ctx.repository.find_account(id).unwrap().unwrap().balance;
    assert_eq!(balance(a), Decimal::new(OPENING_BALANCE, 2));
    assert_eq!(balance(b), Decimal::new(OPENING_BALANCE, 2));
}
