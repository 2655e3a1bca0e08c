//! Projects and their policy metadata.

use std::collections::HashMap;

use db::{
    cve_allowlist, project, project_metadata, sea_query::OnConflict, ActiveValue, ColumnTrait,
    ConnectionTrait, EntityTrait, QueryFilter, QuerySelect,
};

use crate::{vuln::Severity, Error};

pub const PUBLIC: &str = "public";
pub const CONTENT_TRUST: &str = "enable_content_trust";
pub const CONTENT_TRUST_COSIGN: &str = "enable_content_trust_cosign";
pub const PREVENT_VUL: &str = "prevent_vul";
pub const SEVERITY: &str = "severity";
pub const AUTO_SCAN: &str = "auto_scan";
pub const REUSE_SYS_CVE_ALLOWLIST: &str = "reuse_sys_cve_allowlist";

/// Project identifier holding the system-wide CVE allow-list.
pub const SYSTEM_PROJECT_ID: i64 = 0;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub metadata: HashMap<String, String>,
}

impl Project {
    fn flag(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .map_or(false, |value| value.eq_ignore_ascii_case("true"))
    }

    pub fn is_public(&self) -> bool {
        self.flag(PUBLIC)
    }

    pub fn content_trust_enabled(&self) -> bool {
        self.flag(CONTENT_TRUST)
    }

    pub fn content_trust_cosign_enabled(&self) -> bool {
        self.flag(CONTENT_TRUST_COSIGN)
    }

    pub fn prevent_vul(&self) -> bool {
        self.flag(PREVENT_VUL)
    }

    pub fn auto_scan(&self) -> bool {
        self.flag(AUTO_SCAN)
    }

    pub fn reuse_sys_cve_allowlist(&self) -> bool {
        self.flag(REUSE_SYS_CVE_ALLOWLIST)
    }

    /// Minimal severity that blocks pulls, [`Severity::Low`] unless configured.
    pub fn severity(&self) -> Severity {
        self.metadata
            .get(SEVERITY)
            .and_then(|value| value.parse().ok())
            .unwrap_or(Severity::Low)
    }
}

/// CVE allow-list of a project, or of the whole system.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CveAllowlist {
    pub items: Vec<String>,

    /// Unix timestamp after which the allow-list no longer applies.
    pub expires_at: Option<i64>,
}

impl CveAllowlist {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.map_or(false, |expires_at| expires_at <= now)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item == id)
    }
}

async fn load<C: ConnectionTrait>(db: &C, model: project::Model) -> Result<Project, Error> {
    let metadata = project_metadata::Entity::find()
        .select_only()
        .column(project_metadata::Column::Name)
        .column(project_metadata::Column::Value)
        .filter(project_metadata::Column::ProjectId.eq(model.id))
        .into_tuple::<(String, String)>()
        .all(db)
        .await?
        .into_iter()
        .collect();

    Ok(Project {
        id: model.id,
        name: model.name,
        metadata,
    })
}

pub async fn get<C: ConnectionTrait>(db: &C, name: &str) -> Result<Project, Error> {
    let model = project::Entity::find()
        .filter(project::Column::Name.eq(name))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(format!("project {name} not found")))?;

    load(db, model).await
}

pub async fn get_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Project, Error> {
    let model = project::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(format!("project {id} not found")))?;

    load(db, model).await
}

/// Create a project with its metadata.
pub async fn create<C: ConnectionTrait>(
    db: &C,
    name: &str,
    metadata: &[(&str, &str)],
) -> Result<i64, Error> {
    let id = project::Entity::insert(project::ActiveModel {
        name: ActiveValue::Set(name.to_string()),
        creation_time: ActiveValue::Set(db::now()),
        ..Default::default()
    })
    .exec(db)
    .await?
    .last_insert_id;

    for (key, value) in metadata {
        set_metadata(db, id, key, value).await?;
    }

    Ok(id)
}

pub async fn set_metadata<C: ConnectionTrait>(
    db: &C,
    project_id: i64,
    key: &str,
    value: &str,
) -> Result<(), Error> {
    project_metadata::Entity::insert(project_metadata::ActiveModel {
        project_id: ActiveValue::Set(project_id),
        name: ActiveValue::Set(key.to_string()),
        value: ActiveValue::Set(value.to_string()),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([
            project_metadata::Column::ProjectId,
            project_metadata::Column::Name,
        ])
        .update_column(project_metadata::Column::Value)
        .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    Ok(())
}

/// Get the allow-list stored for the project, empty if there is none.
pub async fn cve_allowlist<C: ConnectionTrait>(
    db: &C,
    project_id: i64,
) -> Result<CveAllowlist, Error> {
    let Some(model) = cve_allowlist::Entity::find()
        .filter(cve_allowlist::Column::ProjectId.eq(project_id))
        .one(db)
        .await?
    else {
        return Ok(CveAllowlist::default());
    };

    let items = serde_json::from_str(&model.items).map_err(|err| {
        Error::Unknown(format!("malformed allow-list of project {project_id}: {err}"))
    })?;

    Ok(CveAllowlist {
        items,
        expires_at: model.expires_at,
    })
}

pub async fn set_cve_allowlist<C: ConnectionTrait>(
    db: &C,
    project_id: i64,
    allowlist: &CveAllowlist,
) -> Result<(), Error> {
    let items = serde_json::to_string(&allowlist.items)
        .map_err(|err| Error::Unknown(format!("unable to encode allow-list: {err}")))?;

    cve_allowlist::Entity::insert(cve_allowlist::ActiveModel {
        project_id: ActiveValue::Set(project_id),
        items: ActiveValue::Set(items),
        expires_at: ActiveValue::Set(allowlist.expires_at),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::column(cve_allowlist::Column::ProjectId)
            .update_columns([
                cve_allowlist::Column::Items,
                cve_allowlist::Column::ExpiresAt,
            ])
            .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    Ok(())
}

/// Allow-list applied to the project pulls at the given Unix time.
///
/// The system allow-list is used when the project reuses it. Expired lists are empty.
pub async fn effective_cve_allowlist<C: ConnectionTrait>(
    db: &C,
    project: &Project,
    now: i64,
) -> Result<CveAllowlist, Error> {
    let owner = if project.reuse_sys_cve_allowlist() {
        SYSTEM_PROJECT_ID
    } else {
        project.id
    };

    let allowlist = cve_allowlist(db, owner).await?;

    if allowlist.is_expired(now) {
        return Ok(CveAllowlist::default());
    }

    Ok(allowlist)
}
