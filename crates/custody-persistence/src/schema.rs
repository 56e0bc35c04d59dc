//! Esquema Diesel (escrito a mano, equivalente a `diesel print-schema`).

diesel::table! {
    custody_events (id) {
        id -> BigInt,
        event_uid -> Uuid,
        work_order_id -> BigInt,
        technician_id -> BigInt,
        part_number -> Varchar,
        quantity -> Integer,
        action -> Text,
        from_location -> Text,
        to_location -> Text,
        actor_role -> Text,
        actor_user_id -> BigInt,
        device_id -> Varchar,
        timestamp_utc -> Timestamptz,
        source -> Varchar,
        extra -> Nullable<Jsonb>,
    }
}
