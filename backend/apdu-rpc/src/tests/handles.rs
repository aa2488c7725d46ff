use crate::server::HandleTable;

use std::collections::HashSet;
use std::sync::Arc;

/// **VALUE**: Verifies minted handles carry the prefix and never repeat.
///
/// **WHY THIS MATTERS**: Handles are the only way a client addresses
/// server-side state. Two live resources sharing one would route APDUs to
/// the wrong card.
///
/// **BUG THIS CATCHES**: Would catch a counter that resets on removal or a
/// handle derived from the stored value.
#[test]
fn given_many_inserts_when_minting_then_every_handle_is_unique_and_prefixed() {
    // GIVEN
    let table: HandleTable<str> = HandleTable::new("card");

    // WHEN
    let handles: Vec<String> = (0..50).map(|_| table.insert(Arc::from("x"))).collect();

    // THEN
    let unique: HashSet<&String> = handles.iter().collect();
    assert_eq!(unique.len(), 50);
    assert!(handles.iter().all(|h| h.starts_with("card-")));
    assert_eq!(handles[0], "card-1");
    assert_eq!(table.len(), 50);
}

/// **VALUE**: Verifies a released handle is not handed out again.
///
/// **WHY THIS MATTERS**: A client holding a stale handle must get "not
/// found", not silently reach a newer resource.
///
/// **BUG THIS CATCHES**: Would catch minting from `len() + 1`.
#[test]
fn given_removed_handle_when_inserting_again_then_new_handle_differs() {
    // GIVEN
    let table: HandleTable<u32> = HandleTable::new("device");
    let first = table.insert(Arc::new(1));
    assert!(table.remove(&first).is_some());

    // WHEN
    let second = table.insert(Arc::new(2));

    // THEN
    assert_ne!(first, second);
    assert!(table.get(&first).is_none());
    assert_eq!(table.get(&second).map(|v| *v), Some(2));
}

#[test]
fn given_entries_when_draining_then_table_is_empty_and_counter_keeps_going() {
    let table: HandleTable<u32> = HandleTable::new("device");
    table.insert(Arc::new(1));
    table.insert(Arc::new(2));

    let drained = table.drain();

    assert_eq!(drained.len(), 2);
    assert!(table.is_empty());
    assert_eq!(table.insert(Arc::new(3)), "device-3");
}

#[test]
fn given_unknown_handle_when_looking_up_then_nothing_changes() {
    let table: HandleTable<u32> = HandleTable::new("device");
    let live = table.insert(Arc::new(7));

    assert!(table.get("device-99").is_none());
    assert!(table.remove("device-99").is_none());
    assert!(!table.contains("device-99"));
    assert!(table.contains(&live));
    assert_eq!(table.len(), 1);
}
