//! CVE allow-list.
//!
//! Project with identifier `0` holds the system-wide allow-list.

use sea_orm::entity::prelude::*;

/// CVE allow-list model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "cve_allowlist")]
pub struct Model {
    /// Unique allow-list identifier.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Owning project identifier.
    #[sea_orm(unique)]
    pub project_id: i64,

    /// JSON-encoded list of allowed CVE identifiers.
    pub items: String,

    /// Unix timestamp after which the allow-list is ignored.
    pub expires_at: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
