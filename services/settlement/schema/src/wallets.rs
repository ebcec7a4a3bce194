use sea_orm::entity::prelude::*;

/// Member wallet: cash and point balances with their escrow counterparts.
///
/// All four columns carry a `>= 0` check constraint and are mutated only
/// under a `FOR UPDATE` row lock.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub money_balance: i64,
    pub money_escrow: i64,
    pub point_balance: i64,
    pub point_escrow: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
