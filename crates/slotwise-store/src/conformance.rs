//! Backend-agnostic contract tests.
//!
//! Every [`Database`] implementation must pass each function here. Backends
//! call them from their own test modules with a fresh, empty store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::StoreError;
use crate::traits::{Database, OptionalExt, SortedSetEntry};

fn entry(member: &[u8], score: i64) -> SortedSetEntry {
    SortedSetEntry {
        member: member.to_vec(),
        score,
    }
}

pub fn map_contract(db: &dyn Database) {
    let map = db.map("t", b"m");

    assert!(map.get(b"a").unwrap_err().is_not_found());
    assert!(map.get_all().unwrap().is_empty());

    map.set(b"a", b"1").unwrap();
    map.set(b"b", b"2").unwrap();
    map.set(b"a", b"3").unwrap();
    assert_eq!(map.get(b"a").unwrap(), b"3");

    let expected: BTreeMap<Vec<u8>, Vec<u8>> = [
        (b"a".to_vec(), b"3".to_vec()),
        (b"b".to_vec(), b"2".to_vec()),
    ]
    .into_iter()
    .collect();
    assert_eq!(map.get_all().unwrap(), expected);

    assert!(map.del(b"a").unwrap());
    assert!(!map.del(b"a").unwrap());
    assert_eq!(map.get(b"a").optional().unwrap(), None);

    // Same key in another table is independent.
    assert!(db.map("u", b"m").get_all().unwrap().is_empty());

    assert!(map.remove().unwrap());
    assert!(map.get_all().unwrap().is_empty());
}

pub fn set_contract(db: &dyn Database) {
    let set = db.set("t", b"s");

    assert!(!set.has(b"x").unwrap());
    assert!(set.add(b"x").unwrap());
    assert!(!set.add(b"x").unwrap());
    assert!(set.add(b"y").unwrap());
    assert!(set.has(b"x").unwrap());

    let mut members = set.members().unwrap();
    members.sort();
    assert_eq!(members, vec![b"x".to_vec(), b"y".to_vec()]);

    assert!(set.del(b"x").unwrap());
    assert!(!set.del(b"x").unwrap());
    assert_eq!(set.members().unwrap(), vec![b"y".to_vec()]);
}

pub fn sorted_set_contract(db: &dyn Database) {
    let zset = db.sorted_set("t", b"z");

    assert!(zset.score(b"a").unwrap_err().is_not_found());
    assert!(zset.range(0, -1).unwrap().is_empty());
    assert!(zset.at(0).unwrap_err().is_not_found());

    zset.add(b"c", 30).unwrap();
    zset.add(b"a", 10).unwrap();
    zset.add(b"b", 20).unwrap();
    zset.add(b"d", 40).unwrap();

    assert_eq!(zset.score(b"b").unwrap(), 20);
    assert_eq!(
        zset.range(0, -1).unwrap(),
        vec![entry(b"a", 10), entry(b"b", 20), entry(b"c", 30), entry(b"d", 40)]
    );
    assert_eq!(zset.range(1, 2).unwrap(), vec![entry(b"b", 20), entry(b"c", 30)]);
    assert_eq!(zset.range(-2, -1).unwrap(), vec![entry(b"c", 30), entry(b"d", 40)]);
    assert!(zset.range(3, 1).unwrap().is_empty());
    assert_eq!(zset.range(2, 100).unwrap().len(), 2);

    assert_eq!(
        zset.range_by_score(15, 30).unwrap(),
        vec![entry(b"b", 20), entry(b"c", 30)]
    );
    assert!(zset.range_by_score(41, 100).unwrap().is_empty());

    assert_eq!(zset.at(0).unwrap(), entry(b"a", 10));
    assert_eq!(zset.at(-1).unwrap(), entry(b"d", 40));
    assert!(zset.at(4).unwrap_err().is_not_found());

    // Re-scoring moves the member.
    zset.add(b"a", 50).unwrap();
    assert_eq!(zset.at(-1).unwrap(), entry(b"a", 50));

    assert_eq!(zset.pop_min(2).unwrap(), vec![entry(b"b", 20), entry(b"c", 30)]);
    assert_eq!(zset.range(0, -1).unwrap().len(), 2);

    assert_eq!(zset.remove_range_by_score(0, 45).unwrap(), 1);
    assert_eq!(zset.range(0, -1).unwrap(), vec![entry(b"a", 50)]);

    assert!(zset.del(b"a").unwrap());
    assert!(!zset.del(b"a").unwrap());
    assert!(zset.pop_min(1).unwrap().is_empty());
}

pub fn value_contract(db: &dyn Database) {
    let value = db.value("t", b"v");

    assert!(value.get().unwrap_err().is_not_found());
    value.set(b"one", None).unwrap();
    assert_eq!(value.get().unwrap(), b"one");
    value.set(b"two", None).unwrap();
    assert_eq!(value.get().unwrap(), b"two");

    assert!(value.del().unwrap());
    assert!(!value.del().unwrap());
    assert_eq!(value.get().optional().unwrap(), None);
}

pub fn expiry_contract(db: &dyn Database) {
    db.value("t", b"v")
        .set(b"x", Some(Duration::from_millis(20)))
        .unwrap();
    db.map("t", b"m").set(b"f", b"x").unwrap();
    db.map("t", b"m").expire(Duration::from_millis(20)).unwrap();
    db.value("t", b"keep").set(b"x", None).unwrap();

    assert_eq!(db.value("t", b"v").get().unwrap(), b"x");
    thread::sleep(Duration::from_millis(40));

    assert!(db.value("t", b"v").get().unwrap_err().is_not_found());
    assert!(db.map("t", b"m").get_all().unwrap().is_empty());
    assert_eq!(db.value("t", b"keep").get().unwrap(), b"x");

    // Expiring an absent key is NotFound.
    assert!(db
        .expire("t", b"absent", Duration::from_secs(1))
        .unwrap_err()
        .is_not_found());

    // Re-setting without a TTL clears it.
    let value = db.value("t", b"reset");
    value.set(b"x", Some(Duration::from_millis(20))).unwrap();
    value.set(b"y", None).unwrap();
    thread::sleep(Duration::from_millis(40));
    assert_eq!(value.get().unwrap(), b"y");
}

pub fn lock_contract(db: &dyn Database) {
    let guard = db.lock("provider:a").unwrap();
    assert_eq!(guard.name(), "provider:a");

    let err = db.lock("provider:a").unwrap_err();
    assert!(matches!(err, StoreError::LockTimeout { .. }));
    assert!(err.is_retryable());

    // Unrelated names do not contend.
    let other = db.lock("provider:b").unwrap();

    drop(guard);
    let again = db.lock("provider:a").unwrap();
    again.release().unwrap();
    other.release().unwrap();
}

pub fn type_contract(db: &dyn Database) {
    db.map("t", b"k").set(b"f", b"v").unwrap();
    assert!(matches!(
        db.set("t", b"k").add(b"x"),
        Err(StoreError::WrongType { .. })
    ));
    assert!(matches!(
        db.value("t", b"k").get(),
        Err(StoreError::WrongType { .. })
    ));

    assert!(db.delete("t", b"k").unwrap());
    assert!(!db.delete("t", b"k").unwrap());
    assert!(db.set("t", b"k").add(b"x").unwrap());
}

pub fn lifecycle_contract(db: &dyn Database) {
    db.value("t", b"v").set(b"x", None).unwrap();
    db.set("t", b"s").add(b"x").unwrap();

    db.reset().unwrap();
    assert!(db.value("t", b"v").get().unwrap_err().is_not_found());
    assert!(db.set("t", b"s").members().unwrap().is_empty());

    db.close().unwrap();
    assert!(matches!(
        db.value("t", b"v").get(),
        Err(StoreError::Closed)
    ));
    db.open().unwrap();
    db.value("t", b"v").set(b"y", None).unwrap();
}

/// Many threads racing `set_add` on one member: exactly one sees `true`.
pub fn concurrent_set_add_has_single_winner(db: Arc<dyn Database>) {
    let winners = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let db = Arc::clone(&db);
            let winners = Arc::clone(&winners);
            thread::spawn(move || {
                if db.set("tokens", b"used").add(b"token").unwrap() {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(winners.load(Ordering::SeqCst), 1);
}

/// A read-modify-write under a named lock loses no increments.
pub fn locked_read_modify_write_loses_no_updates(db: Arc<dyn Database>) {
    const THREADS: u64 = 8;
    const ROUNDS: u64 = 25;

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    let _guard = db.lock("counter").unwrap();
                    let value = db.value("t", b"counter");
                    let current = value
                        .get()
                        .optional()
                        .unwrap()
                        .map(|b| u64::from_be_bytes(b.try_into().unwrap()))
                        .unwrap_or(0);
                    value.set(&(current + 1).to_be_bytes(), None).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let bytes = db.value("t", b"counter").get().unwrap();
    assert_eq!(u64::from_be_bytes(bytes.try_into().unwrap()), THREADS * ROUNDS);
}
