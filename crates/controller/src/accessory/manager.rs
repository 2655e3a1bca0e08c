use db::{
    accessory,
    sea_query::{Condition, Expr, OnConflict},
    ActiveValue, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

use super::{Accessory, AccessoryData};
use crate::Error;

/// Accessory listing filters, joined with `AND`.
#[derive(Clone, Debug, Default)]
pub struct Query {
    pub artifact_id: Option<i64>,
    pub subject_artifact_id: Option<i64>,
    pub subject_artifact_digest: Option<String>,
    pub subject_artifact_repo: Option<String>,
    pub accessory_type: Option<String>,
    pub digest: Option<String>,
}

impl Query {
    pub fn subject(subject_artifact_id: i64) -> Self {
        Self {
            subject_artifact_id: Some(subject_artifact_id),
            ..Default::default()
        }
    }

    pub fn artifact(artifact_id: i64) -> Self {
        Self {
            artifact_id: Some(artifact_id),
            ..Default::default()
        }
    }

    fn condition(&self) -> Condition {
        Condition::all()
            .add_option(self.artifact_id.map(|id| accessory::Column::ArtifactId.eq(id)))
            .add_option(
                self.subject_artifact_id
                    .map(|id| accessory::Column::SubjectArtifactId.eq(id)),
            )
            .add_option(
                self.subject_artifact_digest
                    .as_deref()
                    .map(|digest| accessory::Column::SubjectArtifactDigest.eq(digest)),
            )
            .add_option(
                self.subject_artifact_repo
                    .as_deref()
                    .map(|repo| accessory::Column::SubjectArtifactRepo.eq(repo)),
            )
            .add_option(
                self.accessory_type
                    .as_deref()
                    .map(|accessory_type| accessory::Column::AccessoryType.eq(accessory_type)),
            )
            .add_option(
                self.digest
                    .as_deref()
                    .map(|digest| accessory::Column::Digest.eq(digest)),
            )
    }
}

/// Create an accessory record.
///
/// Fails with [`Error::Conflict`] if the same accessory is already recorded
/// for the subject; the surrounding transaction stays usable.
pub async fn create<C: ConnectionTrait>(db: &C, data: &AccessoryData) -> Result<i64, Error> {
    let inserted = accessory::Entity::insert(accessory::ActiveModel {
        artifact_id: ActiveValue::Set(data.artifact_id),
        subject_artifact_id: ActiveValue::Set(data.subject_artifact_id),
        subject_artifact_digest: ActiveValue::Set(data.subject_artifact_digest.clone()),
        subject_artifact_repo: ActiveValue::Set(data.subject_artifact_repo.clone()),
        accessory_type: ActiveValue::Set(data.accessory_type.clone()),
        size: ActiveValue::Set(data.size),
        digest: ActiveValue::Set(data.digest.clone()),
        creation_time: ActiveValue::Set(db::now()),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([
            accessory::Column::Digest,
            accessory::Column::SubjectArtifactDigest,
            accessory::Column::SubjectArtifactRepo,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    if inserted == 0 {
        return Err(Error::conflict(format!(
            "accessory {} of {} already exists",
            data.digest, data.subject_artifact_digest
        )));
    }

    accessory::Entity::find()
        .select_only()
        .column(accessory::Column::Id)
        .filter(accessory::Column::Digest.eq(data.digest.as_str()))
        .filter(accessory::Column::SubjectArtifactDigest.eq(data.subject_artifact_digest.as_str()))
        .filter(accessory::Column::SubjectArtifactRepo.eq(data.subject_artifact_repo.as_str()))
        .into_tuple::<i64>()
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(format!("accessory {}", data.digest)))
}

pub async fn get<C: ConnectionTrait>(db: &C, id: i64) -> Result<Box<dyn Accessory>, Error> {
    accessory::Entity::find_by_id(id)
        .one(db)
        .await?
        .map(|model| super::new(model.into()))
        .ok_or_else(|| Error::not_found(format!("accessory {id} not found")))
}

pub async fn list<C: ConnectionTrait>(
    db: &C,
    query: &Query,
) -> Result<Vec<Box<dyn Accessory>>, Error> {
    Ok(accessory::Entity::find()
        .filter(query.condition())
        .order_by_asc(accessory::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|model| super::new(model.into()))
        .collect())
}

pub async fn count<C: ConnectionTrait>(db: &C, query: &Query) -> Result<u64, Error> {
    Ok(accessory::Entity::find()
        .filter(query.condition())
        .count(db)
        .await?)
}

pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<(), Error> {
    let result = accessory::Entity::delete_by_id(id).exec(db).await?;

    if result.rows_affected == 0 {
        return Err(Error::not_found(format!("accessory {id} not found")));
    }

    Ok(())
}

pub async fn delete_accessories<C: ConnectionTrait>(db: &C, query: &Query) -> Result<u64, Error> {
    Ok(accessory::Entity::delete_many()
        .filter(query.condition())
        .exec(db)
        .await?
        .rows_affected)
}

/// Link the accessories recorded by subject digest to the subject, once it was pushed.
pub async fn update_subject_artifact_id<C: ConnectionTrait>(
    db: &C,
    subject_digest: &str,
    subject_repo: &str,
    subject_artifact_id: i64,
) -> Result<u64, Error> {
    Ok(accessory::Entity::update_many()
        .col_expr(
            accessory::Column::SubjectArtifactId,
            Expr::value(subject_artifact_id),
        )
        .filter(accessory::Column::SubjectArtifactDigest.eq(subject_digest))
        .filter(accessory::Column::SubjectArtifactRepo.eq(subject_repo))
        .filter(accessory::Column::SubjectArtifactId.is_null())
        .exec(db)
        .await?
        .rows_affected)
}
