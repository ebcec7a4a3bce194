use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Payments::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Payments::WalletId).uuid().not_null())
                    .col(
                        ColumnDef::new(Payments::OrderId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Payments::Amount)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(Payments::Amount).gt(0)),
                    )
                    .col(ColumnDef::new(Payments::Status).string().not_null())
                    .col(ColumnDef::new(Payments::ProviderKey).string())
                    .col(ColumnDef::new(Payments::Method).string())
                    .col(ColumnDef::new(Payments::PaidAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Payments::CancelReason).string())
                    .col(ColumnDef::new(Payments::FailureCode).string())
                    .col(ColumnDef::new(Payments::FailureMessage).string())
                    .col(
                        ColumnDef::new(Payments::CompensationCompleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Payments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Payments::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Index for the reconciliation scan (stale PENDING, oldest first).
        manager
            .create_index(
                Index::create()
                    .table(Payments::Table)
                    .col(Payments::Status)
                    .col(Payments::CreatedAt)
                    .name("idx_payments_status_created_at")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Payments {
    Table,
    Id,
    WalletId,
    OrderId,
    Amount,
    Status,
    ProviderKey,
    Method,
    PaidAt,
    CancelReason,
    FailureCode,
    FailureMessage,
    CompensationCompleted,
    CreatedAt,
    UpdatedAt,
}
