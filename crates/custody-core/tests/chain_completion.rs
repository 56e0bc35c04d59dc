//! Validación de cadena y cierre de paradas sobre el backend en memoria.

use custody_core::{ActorRole, ChainShortfall, ChainStatus, ChainValidator, CompletionManifest, CustodyAction, CustodyError,
                   CustodyLedger, InMemoryEventStore, Location, StopCompletion};
use test_support::{dropped, loaded, FaultyStore};

const WO: i64 = 501;
const TECH: i64 = 12;

fn stop(manifest: CompletionManifest) -> StopCompletion {
    StopCompletion { work_order_id: WO,
                     technician_id: TECH,
                     manifest,
                     actor_user_id: 3,
                     device_id: "tablet-2".into(),
                     source: "driver".into() }
}

#[test]
fn partial_loads_add_up_to_a_complete_chain() {
    let ledger = CustodyLedger::new(InMemoryEventStore::new());
    ledger.record_event(loaded(WO, TECH, "A1", 3)).unwrap();
    ledger.record_event(loaded(WO, TECH, "A1", 2)).unwrap();
    ledger.record_event(dropped(WO, TECH, "A1", 5)).unwrap();

    let manifest = CompletionManifest::default().with("A1", 5);
    let validator = ChainValidator::new(&ledger);
    assert!(validator.is_chain_complete(WO, TECH, &manifest).unwrap());
}

#[test]
fn short_load_reports_the_failing_part() {
    let ledger = CustodyLedger::new(InMemoryEventStore::new());
    ledger.record_event(loaded(WO, TECH, "A1", 4)).unwrap();

    let manifest = CompletionManifest::default().with("A1", 5);
    let validator = ChainValidator::new(&ledger);
    assert!(!validator.is_chain_complete(WO, TECH, &manifest).unwrap());
    assert_eq!(validator.check_chain(WO, TECH, &manifest).unwrap(),
               ChainStatus::Incomplete(ChainShortfall { part_number: "A1".into(),
                                                        required: 5,
                                                        loaded: 4,
                                                        dropped: 0 }));
}

#[test]
fn zero_requirement_never_blocks() {
    let ledger = CustodyLedger::new(InMemoryEventStore::new());
    let manifest = CompletionManifest::default().with("A1", 0).with("B2", -1);
    let validator = ChainValidator::new(&ledger);
    assert!(validator.is_chain_complete(WO, TECH, &manifest).unwrap());

    ledger.record_event(loaded(WO, TECH, "A1", 1)).unwrap();
    assert!(validator.is_chain_complete(WO, TECH, &manifest).unwrap());
}

#[test]
fn events_of_other_technicians_do_not_count() {
    let ledger = CustodyLedger::new(InMemoryEventStore::new());
    ledger.record_event(loaded(WO, TECH + 1, "A1", 5)).unwrap();
    ledger.record_event(dropped(WO, TECH + 1, "A1", 5)).unwrap();
    let manifest = CompletionManifest::default().with("A1", 5);
    assert!(!ChainValidator::new(&ledger).is_chain_complete(WO, TECH, &manifest).unwrap());
}

#[test]
fn incomplete_stop_writes_nothing() {
    let ledger = CustodyLedger::new(InMemoryEventStore::new());
    ledger.record_event(loaded(WO, TECH, "A1", 5)).unwrap();
    let before = ledger.store().len();

    let err = ChainValidator::new(&ledger).complete_stop(&stop(CompletionManifest::default().with("A1", 5)))
                                          .unwrap_err();
    match err {
        CustodyError::IncompleteChain(shortfall) => {
            assert_eq!(shortfall.part_number, "A1");
            assert_eq!((shortfall.required, shortfall.loaded, shortfall.dropped), (5, 5, 0));
        }
        other => panic!("esperaba IncompleteChain, obtuve {other:?}"),
    }
    assert_eq!(ledger.store().len(), before, "no debe escribirse marcador");
}

#[test]
fn complete_stop_writes_a_system_marker() {
    let ledger = CustodyLedger::new(InMemoryEventStore::new());
    ledger.record_event(loaded(WO, TECH, "A1", 2)).unwrap();
    ledger.record_event(dropped(WO, TECH, "A1", 2)).unwrap();

    let outcome = ChainValidator::new(&ledger).complete_stop(&stop(CompletionManifest::default().with("A1", 2)))
                                              .expect("cadena completa");
    let marker_uid = outcome.marker_uid.expect("marcador registrado");

    let rows = ledger.history(WO).unwrap();
    assert_eq!(rows.len(), 3);
    let marker = &rows[2].event;
    assert_eq!(marker.event_uid, marker_uid);
    assert_eq!(marker.action, CustodyAction::Stocked);
    assert_eq!(marker.from_location, Location::TechTruck);
    assert_eq!(marker.to_location, Location::None);
    assert_eq!(marker.actor_role, ActorRole::System);
    assert_eq!(marker.part_number, "N/A");
    assert_eq!(marker.quantity, 1);
    let extra = marker.extra.as_ref().expect("extra con manifiesto");
    assert_eq!(extra["parts"], serde_json::json!([{ "part_number": "A1", "qty": 2 }]));
}

#[test]
fn marker_failure_does_not_fail_completion() {
    let store = FaultyStore { fail_inserts_for: Some(CustodyAction::Stocked),
                              ..Default::default() };
    let ledger = CustodyLedger::new(store);
    ledger.record_event(loaded(WO, TECH, "A1", 1)).unwrap();
    ledger.record_event(dropped(WO, TECH, "A1", 1)).unwrap();

    let outcome = ChainValidator::new(&ledger).complete_stop(&stop(CompletionManifest::default().with("A1", 1)))
                                              .expect("la parada se completa aunque falle el marcador");
    assert_eq!(outcome.marker_uid, None);
    assert_eq!(ledger.history(WO).unwrap().len(), 2);
}

#[test]
fn read_fault_during_validation_is_a_completion_error() {
    let store = FaultyStore { fail_aggregates: true,
                              ..Default::default() };
    let ledger = CustodyLedger::new(store);
    let err = ChainValidator::new(&ledger).complete_stop(&stop(CompletionManifest::default().with("A1", 1)))
                                          .unwrap_err();
    assert!(matches!(err, CustodyError::Completion(_)), "{err:?}");
    assert!(!err.is_user_facing());
    assert!(ledger.store().inner.is_empty());
}

#[test]
fn empty_manifest_completes_trivially() {
    let ledger = CustodyLedger::new(InMemoryEventStore::new());
    let outcome = ChainValidator::new(&ledger).complete_stop(&stop(CompletionManifest::default())).unwrap();
    assert!(outcome.marker_uid.is_some());
}

#[test]
fn part_numbers_with_less_than_are_not_merged() {
    let ledger = CustodyLedger::new(InMemoryEventStore::new());
    ledger.record_event(loaded(WO, TECH, "X<1", 5)).unwrap();
    ledger.record_event(dropped(WO, TECH, "X<1", 5)).unwrap();
    assert_eq!(ledger.history(WO).unwrap()[0].event.part_number, "X<1");

    let validator = ChainValidator::new(&ledger);
    let other = CompletionManifest::default().with("X<2", 5);
    assert!(!validator.is_chain_complete(WO, TECH, &other).unwrap());
    let same = CompletionManifest::default().with("X<1", 5);
    assert!(validator.is_chain_complete(WO, TECH, &same).unwrap());
}
