use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ArtifactBlob::Table)
                    .col(ColumnDef::new(ArtifactBlob::DigestAf).string().not_null())
                    .col(ColumnDef::new(ArtifactBlob::DigestBlob).string().not_null())
                    .col(
                        ColumnDef::new(ArtifactBlob::CreationTime)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .primary_key(
                        Index::create()
                            .col(ArtifactBlob::DigestAf)
                            .col(ArtifactBlob::DigestBlob),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("digest_blob_artifact_blob_idx")
                    .table(ArtifactBlob::Table)
                    .col(ArtifactBlob::DigestBlob)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ArtifactBlob::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
enum ArtifactBlob {
    Table,
    DigestAf,
    DigestBlob,
    CreationTime,
}
