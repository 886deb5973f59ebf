//! Integration tests for the withdrawal bucket.
//!
//! Covers the deployment wiring (bucket principal as a token Minter), the
//! accrual arithmetic over simulated time, sharing one ledger between the
//! bucket and direct callers, and the interaction with finalization and
//! the supply cap.

use std::sync::Arc;

use parking_lot::Mutex;
use ppo_contracts::{Amount, Bucket, Event, Ledger, LedgerError, ManualClock, MintableToken, Principal};

const DAY: u64 = 86_400;

fn p(label: &str) -> Principal {
    Principal::derive(label)
}

/// Ledger with cap `cap` whose only Minter is the bucket principal.
fn wired(cap: Amount, size: Amount, rate: Amount, clock: &ManualClock) -> Bucket<Ledger> {
    let mut ledger = Ledger::product_protocol(cap, p("deployer"));
    ledger.add_minter(&p("deployer"), p("bucket")).unwrap();
    let mut bucket = Bucket::new(ledger, p("bucket"), size, rate, p("deployer"), Arc::new(clock.clone()));
    bucket.add_minter(&p("deployer"), p("distributor")).unwrap();
    bucket
}

#[test]
fn distributor_is_rate_limited_over_a_day() {
    let clock = ManualClock::new(1_700_000_000);
    // 1_000 per burst, 1 per second.
    let mut bucket = wired(1_000_000, 1_000, 1, &clock);

    bucket.withdraw(&p("distributor"), p("alice"), 1_000).unwrap();
    assert_eq!(bucket.available(), 0);

    let mut drawn = 1_000;
    for _ in 0..24 {
        clock.advance(3_600);
        let available = bucket.available();
        assert!(available <= bucket.size());
        bucket.withdraw(&p("distributor"), p("alice"), available).unwrap();
        drawn += available;
    }
    // One burst plus one unit per second, clipped at the size each hour.
    assert_eq!(drawn, 1_000 + 24 * 1_000);
    assert_eq!(bucket.token().balance_of(&p("alice")), drawn);

    clock.advance(DAY);
    assert_eq!(bucket.available(), 1_000);
}

#[test]
fn available_drops_by_exactly_the_withdrawn_amount() {
    let clock = ManualClock::new(0);
    let mut bucket = wired(1_000_000, 500, 7, &clock);
    clock.advance(10);
    bucket.withdraw(&p("distributor"), p("a"), 200).unwrap();
    clock.advance(3);
    bucket.withdraw(&p("distributor"), p("a"), 1).unwrap();
    let before = bucket.available();
    bucket.withdraw(&p("distributor"), p("a"), 50).unwrap();
    assert_eq!(bucket.available(), before - 50);
}

#[test]
fn leak_events_record_what_is_left() {
    let clock = ManualClock::new(0);
    let mut bucket = wired(1_000_000, 100, 1, &clock);
    bucket.withdraw(&p("distributor"), p("a"), 60).unwrap();
    bucket.withdraw(&p("distributor"), p("b"), 15).unwrap();

    let leaks: Vec<Event> = bucket.events().events().skip(1).cloned().collect();
    assert_eq!(
        leaks,
        vec![
            Event::Leak { to: p("a"), left: 40 },
            Event::Leak { to: p("b"), left: 25 },
        ]
    );
    // The token log carries the matching mints.
    let mints = bucket
        .token()
        .events()
        .events()
        .filter(|e| matches!(e, Event::Mint { .. }))
        .count();
    assert_eq!(mints, 2);
}

#[test]
fn cap_and_finalization_reject_without_debiting() {
    let clock = ManualClock::new(0);
    let mut bucket = wired(50, 100, 1, &clock);

    assert!(matches!(
        bucket.withdraw(&p("distributor"), p("a"), 60),
        Err(LedgerError::CapExceeded { .. })
    ));
    assert_eq!(bucket.available(), 100);

    bucket.token_mut().finalize(&p("deployer")).unwrap();
    assert_eq!(
        bucket.withdraw(&p("distributor"), p("a"), 10),
        Err(LedgerError::MintingClosed)
    );
    assert_eq!(bucket.available(), 100);
}

#[test]
fn shared_ledger_serves_bucket_and_direct_minters() {
    let clock = ManualClock::new(0);
    let ledger = Arc::new(Mutex::new(Ledger::product_protocol(1_000, p("deployer"))));
    {
        let mut guard = ledger.lock();
        guard.add_minter(&p("deployer"), p("bucket")).unwrap();
        guard.add_minter(&p("deployer"), p("treasury")).unwrap();
    }

    let mut bucket = Bucket::new(
        Arc::clone(&ledger),
        p("bucket"),
        100,
        10,
        p("deployer"),
        Arc::new(clock.clone()),
    );
    bucket.add_minter(&p("deployer"), p("distributor")).unwrap();

    bucket.withdraw(&p("distributor"), p("a"), 100).unwrap();
    ledger.lock().mint(&p("treasury"), p("b"), 900).unwrap();

    clock.advance(10);
    assert!(matches!(
        bucket.withdraw(&p("distributor"), p("a"), 1),
        Err(LedgerError::CapExceeded { .. })
    ));
    assert_eq!(ledger.lock().total_supply(), 1_000);
    assert_eq!(bucket.available(), 100);
}

#[test]
fn buckets_can_be_stacked() {
    let clock = ManualClock::new(0);
    let inner = wired(1_000_000, 1_000, 100, &clock);
    let mut outer = Bucket::new(inner, p("outer"), 10, 1, p("deployer"), Arc::new(clock.clone()));
    outer.token_mut().add_minter(&p("deployer"), p("outer")).unwrap();
    outer.add_minter(&p("deployer"), p("bot")).unwrap();

    MintableToken::mint(&mut outer, &p("bot"), p("a"), 10).unwrap();
    assert_eq!(outer.token().available(), 990);
    assert!(matches!(
        outer.withdraw(&p("bot"), p("a"), 1),
        Err(LedgerError::InsufficientBucketBalance { available: 0, requested: 1 })
    ));
    assert_eq!(outer.token().token().balance_of(&p("a")), 10);
}
