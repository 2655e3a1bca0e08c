//! Project, the tenant that owns repositories.

use sea_orm::entity::prelude::*;

/// Project model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "project")]
pub struct Model {
    /// Unique project identifier.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Unique project name, the first component of every repository name.
    #[sea_orm(unique)]
    pub name: String,

    /// Project creation timestamp.
    pub creation_time: TimeDateTime,
}

/// Project model relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::project_metadata::Entity")]
    Metadata,

    #[sea_orm(has_many = "super::artifact::Entity")]
    Artifacts,
}

impl Related<super::project_metadata::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Metadata.def()
    }
}

impl Related<super::artifact::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Artifacts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
