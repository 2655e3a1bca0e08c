//! Content-addressed blob.
//!
//! Blob rows are shared between every project and artifact that reference
//! the same digest. Garbage collection coordinates with pushes and pulls
//! through the [`Status`] column, guarded by the optimistic [`Model::version`].

use sea_orm::entity::prelude::*;

/// Content type of the layers that are served from an external URL.
pub const FOREIGN_LAYER: &str = "application/vnd.docker.image.rootfs.foreign.diff.tar.gzip";

/// Content type of blobs created by a blob upload.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Blob model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "blob")]
pub struct Model {
    /// Unique blob identifier.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Unique content digest, e.g. `sha256:<hex>`.
    #[sea_orm(unique)]
    pub digest: String,

    /// Media type of the blob contents.
    pub content_type: String,

    /// Blob size in bytes.
    pub size: i64,

    /// Garbage collection status.
    pub status: Status,

    /// Optimistic lock witness, incremented on every status change.
    pub version: i64,

    /// Blob creation timestamp.
    pub creation_time: TimeDateTime,

    /// Last status change timestamp.
    pub update_time: TimeDateTime,
}

impl Model {
    /// Check if this blob is a foreign layer.
    pub fn is_foreign_layer(&self) -> bool {
        self.content_type == FOREIGN_LAYER
    }

    /// Check if this blob is being removed by the garbage collector.
    pub fn is_deleting(&self) -> bool {
        self.status == Status::Deleting
    }
}

/// Blob garbage collection status.
#[derive(Copy, Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
pub enum Status {
    /// Blob is alive.
    #[sea_orm(num_value = 0)]
    None,

    /// Blob was marked as a deletion candidate.
    #[sea_orm(num_value = 1)]
    Delete,

    /// Blob is being removed from the storage.
    #[sea_orm(num_value = 2)]
    Deleting,

    /// Blob removal failed and is to be retried.
    #[sea_orm(num_value = 3)]
    DeleteFailed,
}

impl Status {
    /// Statuses a blob may be moved into `self` from.
    pub fn allowed_sources(self) -> &'static [Status] {
        match self {
            Status::None => &[Status::None, Status::Delete, Status::DeleteFailed],
            Status::Delete => &[Status::None],
            Status::Deleting => &[Status::Delete, Status::DeleteFailed],
            Status::DeleteFailed => &[Status::Deleting],
        }
    }
}

/// Blob model relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::project_blob::Entity")]
    ProjectBlobs,
}

impl Related<super::project_blob::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProjectBlobs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
