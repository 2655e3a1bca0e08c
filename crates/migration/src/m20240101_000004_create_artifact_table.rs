use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Artifact::Table)
                    .col(
                        ColumnDef::new(Artifact::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Artifact::ProjectId).big_integer().not_null())
                    .col(ColumnDef::new(Artifact::RepositoryName).string().not_null())
                    .col(ColumnDef::new(Artifact::Digest).string().not_null())
                    .col(ColumnDef::new(Artifact::MediaType).string().not_null())
                    .col(
                        ColumnDef::new(Artifact::ManifestMediaType)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Artifact::Type).string().not_null())
                    .col(
                        ColumnDef::new(Artifact::Size)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Artifact::PushTime)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .col(ColumnDef::new(Artifact::PullTime).timestamp())
                    .index(
                        Index::create()
                            .name("project_id_repository_name_digest_artifact_idx")
                            .col(Artifact::ProjectId)
                            .col(Artifact::RepositoryName)
                            .col(Artifact::Digest)
                            .unique(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Artifact::Table, Artifact::ProjectId)
                            .to(crate::Project::Table, crate::Project::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("digest_artifact_idx")
                    .table(Artifact::Table)
                    .col(Artifact::Digest)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Artifact::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
pub(crate) enum Artifact {
    Table,
    Id,
    ProjectId,
    RepositoryName,
    Digest,
    MediaType,
    ManifestMediaType,
    Type,
    Size,
    PushTime,
    PullTime,
}
