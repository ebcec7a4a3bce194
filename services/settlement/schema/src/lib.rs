//! sea-orm entities for the settlement service database.

pub mod ledger_entries;
pub mod outbox_events;
pub mod payments;
pub mod wallets;
