//! Mutable repository-scoped name of an artifact.

use sea_orm::entity::prelude::*;

/// Tag model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tag")]
pub struct Model {
    /// Unique tag identifier.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Repository name the tag belongs to.
    pub repository_name: String,

    /// Tagged artifact identifier.
    pub artifact_id: i64,

    /// Tag name, unique within a repository.
    pub name: String,

    /// Last push timestamp.
    pub push_time: TimeDateTime,

    /// Last pull timestamp.
    pub pull_time: Option<TimeDateTime>,
}

/// Tag model relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::artifact::Entity",
        from = "Column::ArtifactId",
        to = "super::artifact::Column::Id"
    )]
    Artifact,
}

impl Related<super::artifact::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Artifact.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
