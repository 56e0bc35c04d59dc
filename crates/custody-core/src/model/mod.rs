//! Modelo de datos del ledger de custodia.

mod event;
mod manifest;
pub mod normalize;
mod types;

pub use event::{CustodyEvent, LedgerEntry, QuantityKey, RawCustodyEvent};
pub use manifest::{CompletionManifest, ManifestEntry};
pub use normalize::normalize_event;
pub use types::{ActorRole, CustodyAction, Location};
