pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_project_table;
mod m20240101_000002_create_project_metadata_table;
mod m20240101_000003_create_blob_table;
mod m20240101_000004_create_artifact_table;
mod m20240101_000005_create_tag_table;
mod m20240101_000006_create_artifact_blob_table;
mod m20240101_000007_create_project_blob_table;
mod m20240101_000008_create_artifact_accessory_table;
mod m20240101_000009_create_cve_allowlist_table;

pub(crate) use m20240101_000001_create_project_table::Project;
pub(crate) use m20240101_000003_create_blob_table::Blob;
pub(crate) use m20240101_000004_create_artifact_table::Artifact;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_project_table::Migration),
            Box::new(m20240101_000002_create_project_metadata_table::Migration),
            Box::new(m20240101_000003_create_blob_table::Migration),
            Box::new(m20240101_000004_create_artifact_table::Migration),
            Box::new(m20240101_000005_create_tag_table::Migration),
            Box::new(m20240101_000006_create_artifact_blob_table::Migration),
            Box::new(m20240101_000007_create_project_blob_table::Migration),
            Box::new(m20240101_000008_create_artifact_accessory_table::Migration),
            Box::new(m20240101_000009_create_cve_allowlist_table::Migration),
        ]
    }
}
