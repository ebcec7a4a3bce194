use sea_orm_migration::prelude::*;

mod m20260801_000001_create_wallets;
mod m20260801_000002_create_payments;
mod m20260801_000003_create_ledger_entries;
mod m20260801_000004_create_outbox_events;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260801_000001_create_wallets::Migration),
            Box::new(m20260801_000002_create_payments::Migration),
            Box::new(m20260801_000003_create_ledger_entries::Migration),
            Box::new(m20260801_000004_create_outbox_events::Migration),
        ]
    }
}

#[tokio::main]
async fn main() {
    cli::run_cli(Migrator).await;
}
