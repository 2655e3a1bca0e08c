//! Top-level pushable object addressed by a manifest digest within a repository.

use sea_orm::entity::prelude::*;

/// Artifact model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "artifact")]
pub struct Model {
    /// Unique artifact identifier.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Related project identifier.
    pub project_id: i64,

    /// Full repository name, including the project name prefix.
    pub repository_name: String,

    /// Manifest digest.
    pub digest: String,

    /// Config media type, or manifest media type for indexes.
    pub media_type: String,

    /// Manifest media type.
    pub manifest_media_type: String,

    /// Artifact type, e.g. `IMAGE` or `UNKNOWN`.
    #[sea_orm(column_name = "type")]
    pub artifact_type: String,

    /// Manifest size in bytes.
    pub size: i64,

    /// Last push timestamp.
    pub push_time: TimeDateTime,

    /// Last pull timestamp.
    pub pull_time: Option<TimeDateTime>,
}

/// Artifact model relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id"
    )]
    Project,

    #[sea_orm(has_many = "super::tag::Entity")]
    Tags,

    #[sea_orm(has_many = "super::accessory::Entity")]
    Accessories,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl Related<super::tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tags.def()
    }
}

impl Related<super::accessory::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accessories.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
