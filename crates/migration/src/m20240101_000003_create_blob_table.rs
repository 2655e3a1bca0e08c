use db::blob::Status;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Blob::Table)
                    .col(
                        ColumnDef::new(Blob::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Blob::Digest).string().not_null().unique_key())
                    .col(ColumnDef::new(Blob::ContentType).string().not_null())
                    .col(ColumnDef::new(Blob::Size).big_integer().not_null())
                    .col(
                        ColumnDef::new(Blob::Status)
                            .small_integer()
                            .not_null()
                            .default(Status::None),
                    )
                    .col(
                        ColumnDef::new(Blob::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Blob::CreationTime)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .col(
                        ColumnDef::new(Blob::UpdateTime)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("status_blob_idx")
                    .table(Blob::Table)
                    .col(Blob::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Blob::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
pub(crate) enum Blob {
    Table,
    Id,
    Digest,
    ContentType,
    Size,
    Status,
    Version,
    CreationTime,
    UpdateTime,
}
