use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ArtifactAccessory::Table)
                    .col(
                        ColumnDef::new(ArtifactAccessory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ArtifactAccessory::ArtifactId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ArtifactAccessory::SubjectArtifactId).big_integer())
                    .col(
                        ColumnDef::new(ArtifactAccessory::SubjectArtifactDigest)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ArtifactAccessory::SubjectArtifactRepo)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ArtifactAccessory::Type).string().not_null())
                    .col(
                        ColumnDef::new(ArtifactAccessory::Size)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ArtifactAccessory::Digest).string().not_null())
                    .col(
                        ColumnDef::new(ArtifactAccessory::CreationTime)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .index(
                        Index::create()
                            .name("digest_subject_artifact_accessory_idx")
                            .col(ArtifactAccessory::Digest)
                            .col(ArtifactAccessory::SubjectArtifactDigest)
                            .col(ArtifactAccessory::SubjectArtifactRepo)
                            .unique(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ArtifactAccessory::Table, ArtifactAccessory::ArtifactId)
                            .to(crate::Artifact::Table, crate::Artifact::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ArtifactAccessory::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
enum ArtifactAccessory {
    Table,
    Id,
    ArtifactId,
    SubjectArtifactId,
    SubjectArtifactDigest,
    SubjectArtifactRepo,
    Type,
    Size,
    Digest,
    CreationTime,
}
