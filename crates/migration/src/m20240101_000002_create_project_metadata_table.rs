use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProjectMetadata::Table)
                    .col(
                        ColumnDef::new(ProjectMetadata::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProjectMetadata::ProjectId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProjectMetadata::Name).string().not_null())
                    .col(ColumnDef::new(ProjectMetadata::Value).string().not_null())
                    .index(
                        Index::create()
                            .name("project_id_name_project_metadata_idx")
                            .col(ProjectMetadata::ProjectId)
                            .col(ProjectMetadata::Name)
                            .unique(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ProjectMetadata::Table, ProjectMetadata::ProjectId)
                            .to(crate::Project::Table, crate::Project::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProjectMetadata::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
enum ProjectMetadata {
    Table,
    Id,
    ProjectId,
    Name,
    Value,
}
