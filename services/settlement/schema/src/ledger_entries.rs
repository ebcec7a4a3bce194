use sea_orm::entity::prelude::*;

/// Append-only ledger history.
///
/// `idempotency_key` is derived from (operation category, source id, asset
/// kind); inserting an existing key is a no-op (`ON CONFLICT DO NOTHING`).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub idempotency_key: String,
    pub wallet_id: Uuid,
    /// "deposit" or "withdraw".
    pub entry_kind: String,
    /// "money" or "point".
    pub asset: String,
    pub amount: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
