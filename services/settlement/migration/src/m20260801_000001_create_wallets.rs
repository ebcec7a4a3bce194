use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Wallets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Wallets::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Wallets::MoneyBalance)
                            .big_integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Wallets::MoneyBalance).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Wallets::MoneyEscrow)
                            .big_integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Wallets::MoneyEscrow).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Wallets::PointBalance)
                            .big_integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Wallets::PointBalance).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Wallets::PointEscrow)
                            .big_integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Wallets::PointEscrow).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Wallets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Wallets::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Wallets::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Wallets {
    Table,
    Id,
    MoneyBalance,
    MoneyEscrow,
    PointBalance,
    PointEscrow,
    CreatedAt,
    UpdatedAt,
}
