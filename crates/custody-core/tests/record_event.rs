//! Ingesta: unicidad de `event_uid`, validación y política de respaldo.

use std::collections::HashSet;

use custody_core::{CustodyAction, CustodyError, CustodyLedger, InMemoryEventStore, Location, QuantityKey, RawCustodyEvent};
use rayon::prelude::*;
use test_support::{loaded, raw, FaultyStore};
use uuid::Uuid;

#[test]
fn every_recorded_event_gets_a_fresh_uid() {
    let ledger = CustodyLedger::new(InMemoryEventStore::new());
    let n = 200;
    let uids: Vec<Uuid> = (0..n).into_par_iter()
                                .map(|_| ledger.record_event(loaded(1, 1, "A1", 1)).expect("record"))
                                .collect();
    let distinct: HashSet<Uuid> = uids.iter().copied().collect();
    assert_eq!(distinct.len(), n, "cada llamada debe devolver un uid nuevo");
    assert!(uids.iter().all(|u| !u.is_nil() && u.get_version_num() == 4));
    assert_eq!(ledger.store().len(), n);
}

#[test]
fn identical_input_twice_is_two_events() {
    let ledger = CustodyLedger::new(InMemoryEventStore::new());
    let a = ledger.record_event(loaded(3, 2, "A1", 1)).unwrap();
    let b = ledger.record_event(loaded(3, 2, "A1", 1)).unwrap();
    assert_ne!(a, b);
    assert_eq!(ledger.aggregate_quantity(&QuantityKey::loaded(3, 2, "A1")).unwrap(), 2);
}

#[test]
fn non_positive_quantity_is_rejected_without_rows() {
    let ledger = CustodyLedger::new(InMemoryEventStore::new());
    for q in [0, -1, -50] {
        let err = ledger.record_event(loaded(1, 1, "A1", q)).unwrap_err();
        assert!(matches!(err, CustodyError::InvalidQuantity { value } if value == q), "q={q} err={err:?}");
    }
    assert!(ledger.store().is_empty());
}

#[test]
fn validation_error_names_every_missing_field() {
    let ledger = CustodyLedger::new(InMemoryEventStore::new());
    let err = ledger.record_event(RawCustodyEvent::new().work_order(9).quantity(2).device("  ")).unwrap_err();
    assert_eq!(err.to_string(),
               "missing required fields: technician_id, part_number, action, from_location, to_location, actor_role, \
                actor_user_id, device_id, source");
    assert!(err.is_user_facing());
    assert!(ledger.store().is_empty());
}

#[test]
fn unknown_action_is_stored_as_picked() {
    let ledger = CustodyLedger::new(InMemoryEventStore::new());
    let uid = ledger.record_event(raw(1, 1, "A1", 2, "BOGUS", "WAREHOUSE_SHELF", "SPACE")).unwrap();
    let rows = ledger.history(1).unwrap();
    assert_eq!(rows.len(), 1);
    let ev = &rows[0].event;
    assert_eq!(ev.event_uid, uid);
    assert_eq!(ev.action, CustodyAction::Picked);
    assert_eq!(ev.from_location, Location::WarehouseShelf);
    assert_eq!(ev.to_location, Location::None);
}

#[test]
fn aggregate_without_matches_is_zero() {
    let ledger = CustodyLedger::new(InMemoryEventStore::new());
    assert_eq!(ledger.aggregate_quantity(&QuantityKey::dropped_off(404, 1, "ZZ")).unwrap(), 0);
    ledger.record_event(loaded(404, 1, "ZZ", 4)).unwrap();
    // otra acción / otro técnico no cuentan
    assert_eq!(ledger.aggregate_quantity(&QuantityKey::dropped_off(404, 1, "ZZ")).unwrap(), 0);
    assert_eq!(ledger.aggregate_quantity(&QuantityKey::loaded(404, 2, "ZZ")).unwrap(), 0);
    assert_eq!(ledger.aggregate_quantity(&QuantityKey::loaded(404, 1, "ZZ")).unwrap(), 4);
}

#[test]
fn caller_timestamp_is_kept_in_utc() {
    let ledger = CustodyLedger::new(InMemoryEventStore::new());
    let ts = chrono::DateTime::parse_from_rfc3339("2024-06-30T23:30:00-02:00").unwrap().with_timezone(&chrono::Utc);
    ledger.record_event(loaded(8, 1, "A1", 1).at(ts)).unwrap();
    let stored = &ledger.history(8).unwrap()[0].event;
    assert_eq!(stored.timestamp_utc.to_rfc3339(), "2024-07-01T01:30:00+00:00");
}

#[test]
fn invalid_input_is_reported_even_when_the_store_is_down() {
    let ledger = CustodyLedger::new(FaultyStore { fail_transactions: true,
                                                  ..FaultyStore::default() });
    let err = ledger.record_event(RawCustodyEvent::new().work_order(9).quantity(2)).unwrap_err();
    assert!(matches!(err, CustodyError::Validation { .. }), "err={err:?}");
    assert!(err.is_user_facing());

    let err = ledger.record_event(loaded(9, 1, "A1", 0)).unwrap_err();
    assert!(matches!(err, CustodyError::InvalidQuantity { value: 0 }), "err={err:?}");

    let err = ledger.record_event(loaded(9, 1, "A1", 1)).unwrap_err();
    assert!(matches!(err, CustodyError::StoreWrite(_)), "err={err:?}");
}
