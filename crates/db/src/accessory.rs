//! Accessory record.
//!
//! An accessory binds a child artifact (signature, SBOM, accelerator image)
//! to its subject artifact. The subject is referenced either by its identifier,
//! or by its digest and repository when it was not pushed yet.

use sea_orm::entity::prelude::*;

/// Accessory model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "artifact_accessory")]
pub struct Model {
    /// Unique accessory identifier.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Accessory artifact identifier.
    pub artifact_id: i64,

    /// Subject artifact identifier, if the subject exists locally.
    pub subject_artifact_id: Option<i64>,

    /// Subject artifact digest.
    pub subject_artifact_digest: String,

    /// Subject artifact repository.
    pub subject_artifact_repo: String,

    /// Accessory type, e.g. `cosign.signature`.
    #[sea_orm(column_name = "type")]
    pub accessory_type: String,

    /// Accessory manifest size.
    pub size: i64,

    /// Accessory manifest digest.
    pub digest: String,

    /// Accessory creation timestamp.
    pub creation_time: TimeDateTime,
}

/// Accessory model relations.
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
