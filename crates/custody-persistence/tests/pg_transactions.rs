mod test_support;

use chrono::Utc;
use custody_core::model::normalize::normalize_event;
use custody_core::{CustodyError, EventStore, QuantityKey, StoreError};
use test_support::{fresh_work_order, loaded, with_pool};
use uuid::Uuid;

use custody_persistence::pg::{PgEventStore, PoolProvider};

#[test]
fn duplicate_uid_is_unique_violation_and_outer_tx_survives() {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("skip duplicate_uid_is_unique_violation_and_outer_tx_survives (no DATABASE_URL)");
        return;
    }
    with_pool(|pool| {
        let store = PgEventStore::new(PoolProvider { pool: pool.clone() });
        let wo = fresh_work_order();
        let event = normalize_event(&loaded(wo, "A1", 2), Uuid::new_v4(), Utc::now()).unwrap();

        let outcome = store.transaction(|tx| {
                              tx.insert_event(&event).map_err(CustodyError::StoreWrite)?;
                              let dup = tx.insert_event(&event);
                              // la transacción sigue viva tras el savepoint fallido
                              let seen = tx.aggregate_quantity(&QuantityKey::loaded(wo, 7, "A1"))
                                           .map_err(CustodyError::StoreRead)?;
                              Ok((dup, seen))
                          })
                          .expect("commit");
        assert!(matches!(outcome.0, Err(StoreError::UniqueViolation(_))));
        assert_eq!(outcome.1, 2);

        let rows = store.list_events(wo).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event.event_uid, event.event_uid);
    });
}

#[test]
fn work_error_rolls_back_everything() {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("skip work_error_rolls_back_everything (no DATABASE_URL)");
        return;
    }
    with_pool(|pool| {
        let store = PgEventStore::new(PoolProvider { pool: pool.clone() });
        let wo = fresh_work_order();
        let event = normalize_event(&loaded(wo, "A1", 2), Uuid::new_v4(), Utc::now()).unwrap();

        let res: Result<(), CustodyError> = store.transaction(|tx| {
                                                     tx.insert_event(&event).map_err(CustodyError::StoreWrite)?;
                                                     Err(CustodyError::Completion("abort".into()))
                                                 });
        assert!(matches!(res, Err(CustodyError::Completion(_))));
        assert!(store.list_events(wo).unwrap().is_empty());
        assert_eq!(store.aggregate_quantity(&QuantityKey::loaded(wo, 7, "A1")).unwrap(), 0);
    });
}
