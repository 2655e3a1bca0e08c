use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tag::Table)
                    .col(
                        ColumnDef::new(Tag::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Tag::RepositoryName).string().not_null())
                    .col(ColumnDef::new(Tag::ArtifactId).big_integer().not_null())
                    .col(ColumnDef::new(Tag::Name).string().not_null())
                    .col(
                        ColumnDef::new(Tag::PushTime)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .col(ColumnDef::new(Tag::PullTime).timestamp())
                    .index(
                        Index::create()
                            .name("repository_name_name_tag_idx")
                            .col(Tag::RepositoryName)
                            .col(Tag::Name)
                            .unique(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Tag::Table, Tag::ArtifactId)
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
            .drop_table(Table::drop().table(Tag::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
enum Tag {
    Table,
    Id,
    RepositoryName,
    ArtifactId,
    Name,
    PushTime,
    PullTime,
}
