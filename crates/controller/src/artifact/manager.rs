//! Database access for artifacts and tags.

use db::{
    artifact,
    sea_query::{Expr, OnConflict},
    tag, ActiveValue, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect,
    SelectExt,
};

use crate::{accessory, Error};

/// Artifact row to create.
#[derive(Clone, Debug, Default)]
pub struct NewArtifact {
    pub project_id: i64,
    pub repository_name: String,
    pub digest: String,
    pub media_type: String,
    pub manifest_media_type: String,
    pub artifact_type: String,
    pub size: i64,
}

pub async fn get<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<artifact::Model>, DbErr> {
    artifact::Entity::find_by_id(id).one(db).await
}

pub async fn get_by_digest<C: ConnectionTrait>(
    db: &C,
    project_id: Option<i64>,
    repository_name: &str,
    digest: &str,
) -> Result<Option<artifact::Model>, DbErr> {
    let mut query = artifact::Entity::find()
        .filter(artifact::Column::RepositoryName.eq(repository_name))
        .filter(artifact::Column::Digest.eq(digest));

    if let Some(project_id) = project_id {
        query = query.filter(artifact::Column::ProjectId.eq(project_id));
    }

    query.one(db).await
}

pub async fn get_tag<C: ConnectionTrait>(
    db: &C,
    repository_name: &str,
    name: &str,
) -> Result<Option<tag::Model>, DbErr> {
    tag::Entity::find()
        .filter(tag::Column::RepositoryName.eq(repository_name))
        .filter(tag::Column::Name.eq(name))
        .one(db)
        .await
}

/// Create an artifact, ignoring the conflict on its repository and digest.
///
/// Returns the artifact identifier and whether the row was inserted.
pub async fn create<C: ConnectionTrait>(
    db: &C,
    new: &NewArtifact,
) -> Result<(i64, bool), Error> {
    let inserted = artifact::Entity::insert(artifact::ActiveModel {
        project_id: ActiveValue::Set(new.project_id),
        repository_name: ActiveValue::Set(new.repository_name.clone()),
        digest: ActiveValue::Set(new.digest.clone()),
        media_type: ActiveValue::Set(new.media_type.clone()),
        manifest_media_type: ActiveValue::Set(new.manifest_media_type.clone()),
        artifact_type: ActiveValue::Set(new.artifact_type.clone()),
        size: ActiveValue::Set(new.size),
        push_time: ActiveValue::Set(db::now()),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([
            artifact::Column::ProjectId,
            artifact::Column::RepositoryName,
            artifact::Column::Digest,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    let id = artifact::Entity::find()
        .select_only()
        .column(artifact::Column::Id)
        .filter(artifact::Column::ProjectId.eq(new.project_id))
        .filter(artifact::Column::RepositoryName.eq(new.repository_name.as_str()))
        .filter(artifact::Column::Digest.eq(new.digest.as_str()))
        .into_tuple::<i64>()
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(format!("artifact {} not found", new.digest)))?;

    Ok((id, inserted > 0))
}

pub async fn update_push_time<C: ConnectionTrait>(db: &C, id: i64) -> Result<(), DbErr> {
    artifact::Entity::update_many()
        .col_expr(artifact::Column::PushTime, Expr::value(db::now()))
        .filter(artifact::Column::Id.eq(id))
        .exec(db)
        .await?;

    Ok(())
}

pub async fn update_pull_time<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
    Ok(artifact::Entity::update_many()
        .col_expr(artifact::Column::PullTime, Expr::value(db::now()))
        .filter(artifact::Column::Id.eq(id))
        .exec(db)
        .await?
        .rows_affected)
}

/// Point the tag at the artifact, creating the tag if needed.
pub async fn attach_tag<C: ConnectionTrait>(
    db: &C,
    repository_name: &str,
    name: &str,
    artifact_id: i64,
) -> Result<(), DbErr> {
    tag::Entity::insert(tag::ActiveModel {
        repository_name: ActiveValue::Set(repository_name.to_string()),
        artifact_id: ActiveValue::Set(artifact_id),
        name: ActiveValue::Set(name.to_string()),
        push_time: ActiveValue::Set(db::now()),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([tag::Column::RepositoryName, tag::Column::Name])
            .update_columns([tag::Column::ArtifactId, tag::Column::PushTime])
            .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    Ok(())
}

pub async fn update_tag_pull_time<C: ConnectionTrait>(
    db: &C,
    artifact_id: i64,
    name: &str,
) -> Result<(), DbErr> {
    tag::Entity::update_many()
        .col_expr(tag::Column::PullTime, Expr::value(db::now()))
        .filter(tag::Column::ArtifactId.eq(artifact_id))
        .filter(tag::Column::Name.eq(name))
        .exec(db)
        .await?;

    Ok(())
}

pub async fn delete_tags<C: ConnectionTrait>(db: &C, artifact_id: i64) -> Result<u64, DbErr> {
    Ok(tag::Entity::delete_many()
        .filter(tag::Column::ArtifactId.eq(artifact_id))
        .exec(db)
        .await?
        .rows_affected)
}

pub async fn delete_tag<C: ConnectionTrait>(
    db: &C,
    repository_name: &str,
    name: &str,
) -> Result<u64, DbErr> {
    Ok(tag::Entity::delete_many()
        .filter(tag::Column::RepositoryName.eq(repository_name))
        .filter(tag::Column::Name.eq(name))
        .exec(db)
        .await?
        .rows_affected)
}

/// Check if any artifact in any repository still has this manifest digest.
pub async fn digest_in_use<C: ConnectionTrait>(db: &C, digest: &str) -> Result<bool, DbErr> {
    artifact::Entity::find()
        .select_only()
        .filter(artifact::Column::Digest.eq(digest))
        .exists(db)
        .await
}

/// Delete a single artifact row.
///
/// Refuses with [`Error::Conflict`] while hard accessories reference the artifact.
pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<(), Error> {
    let accessories = accessory::manager::list(db, &accessory::Query::subject(id)).await?;

    if accessories.iter().any(|accessory| accessory.is_hard()) {
        return Err(Error::conflict(format!(
            "artifact {id} is referenced by hard accessories"
        )));
    }

    let result = artifact::Entity::delete_by_id(id).exec(db).await?;

    if result.rows_affected == 0 {
        return Err(Error::not_found(format!("artifact {id} not found")));
    }

    Ok(())
}
