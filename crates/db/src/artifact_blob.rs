//! Edge between a manifest digest and a blob it references.
//!
//! Every manifest also references itself, so that the manifest blob
//! is accounted together with its layers.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "artifact_blob")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub digest_af: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub digest_blob: String,
    pub creation_time: TimeDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
