use sea_orm::entity::prelude::*;

/// Outbox row for reliable cross-subsystem event delivery.
///
/// Written in the same transaction as the business mutation it announces.
/// `status` moves INIT/SEND_FAIL → PUBLISHED exactly once via a conditional
/// update, because the push and poll publishers race independently. Rows are
/// deleted only by the retention job, long after publication.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "outbox_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub event_id: Uuid,
    pub event_type: String,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub payload: Json,
    /// INIT, SEND_FAIL or PUBLISHED.
    pub status: String,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
