use sea_orm::entity::prelude::*;

/// A monetary recharge against the external payment provider.
///
/// Rows are never deleted; CANCELED is a terminal status, not a removal.
/// `order_id` is unique and immutable, `provider_key` is set only once the
/// payment reaches SUCCESS. `compensation_completed` is independent of
/// status: it distinguishes "needs async compensation" from "already
/// compensated" after a cancel-saga failure.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub wallet_id: Uuid,
    #[sea_orm(unique)]
    pub order_id: String,
    pub amount: i64,
    pub status: String,
    pub provider_key: Option<String>,
    pub method: Option<String>,
    pub paid_at: Option<chrono::DateTime<chrono::Utc>>,
    pub cancel_reason: Option<String>,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
    pub compensation_completed: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
