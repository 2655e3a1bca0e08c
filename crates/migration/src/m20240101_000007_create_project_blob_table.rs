use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProjectBlob::Table)
                    .col(ColumnDef::new(ProjectBlob::ProjectId).big_integer().not_null())
                    .col(ColumnDef::new(ProjectBlob::BlobId).big_integer().not_null())
                    .col(
                        ColumnDef::new(ProjectBlob::CreationTime)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .primary_key(
                        Index::create()
                            .col(ProjectBlob::ProjectId)
                            .col(ProjectBlob::BlobId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ProjectBlob::Table, ProjectBlob::ProjectId)
                            .to(crate::Project::Table, crate::Project::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ProjectBlob::Table, ProjectBlob::BlobId)
                            .to(crate::Blob::Table, crate::Blob::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProjectBlob::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
enum ProjectBlob {
    Table,
    ProjectId,
    BlobId,
    CreationTime,
}
