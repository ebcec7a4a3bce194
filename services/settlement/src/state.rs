use std::sync::Arc;

use prometheus::Registry;
use sea_orm::DatabaseConnection;
use tokio::sync::Notify;

use crate::infra::alert::WebhookAlertNotifier;
use crate::infra::db::{DbLedgerReader, DbOutboxStore, DbSettlementStore};
use crate::infra::gateway::HttpPaymentGateway;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub gateway: HttpPaymentGateway,
    pub alerts: WebhookAlertNotifier,
    pub registry: Registry,
    /// Nudges the outbox relay right after a commit lands.
    pub outbox_wakeup: Arc<Notify>,
}

impl AppState {
    pub fn settlement_store(&self) -> DbSettlementStore {
        DbSettlementStore {
            db: self.db.clone(),
        }
    }

    pub fn ledger_reader(&self) -> DbLedgerReader {
        DbLedgerReader {
            db: self.db.clone(),
        }
    }

    pub fn outbox_store(&self) -> DbOutboxStore {
        DbOutboxStore {
            db: self.db.clone(),
        }
    }
}
