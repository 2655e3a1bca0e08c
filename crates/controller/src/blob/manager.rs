//! Database access for blobs and their project and artifact associations.
//!
//! Association inserts are idempotent: conflicts on the association keys
//! are ignored with `ON CONFLICT DO NOTHING` and reported as zero affected rows.

use std::time::Duration;

use db::{
    artifact, artifact_blob, blob,
    sea_query::{Alias, Expr, Func, OnConflict, Query, SelectStatement, SimpleExpr},
    project_blob, ActiveValue, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, SelectExt,
};
use tracing::warn;

/// Blob listing filters, joined with `AND`.
#[derive(Clone, Debug, Default)]
pub struct ListParams {
    /// Only return blobs with one of these digests.
    pub digests: Option<Vec<String>>,

    /// Only return blobs associated with this artifact digest.
    pub artifact_digest: Option<String>,

    /// Only return blobs associated with this project.
    pub project_id: Option<i64>,
}

fn project_blob_ids(project_id: i64) -> SelectStatement {
    Query::select()
        .column(project_blob::Column::BlobId)
        .from(project_blob::Entity)
        .and_where(project_blob::Column::ProjectId.eq(project_id))
        .to_owned()
}

fn artifact_blob_digests(artifact_digest: &str) -> SelectStatement {
    Query::select()
        .column(artifact_blob::Column::DigestBlob)
        .from(artifact_blob::Entity)
        .and_where(artifact_blob::Column::DigestAf.eq(artifact_digest))
        .to_owned()
}

/// Create a blob, ignoring the conflict on digest.
///
/// Returns the identifier of the created or already existing blob.
pub async fn create<C: ConnectionTrait>(
    db: &C,
    digest: &str,
    content_type: &str,
    size: i64,
) -> Result<i64, DbErr> {
    let now = db::now();

    blob::Entity::insert(blob::ActiveModel {
        digest: ActiveValue::Set(digest.to_string()),
        content_type: ActiveValue::Set(content_type.to_string()),
        size: ActiveValue::Set(size),
        status: ActiveValue::Set(blob::Status::None),
        version: ActiveValue::Set(0),
        creation_time: ActiveValue::Set(now),
        update_time: ActiveValue::Set(now),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::column(blob::Column::Digest)
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    blob::Entity::find()
        .select_only()
        .column(blob::Column::Id)
        .filter(blob::Column::Digest.eq(digest))
        .into_tuple::<i64>()
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("blob {digest}")))
}

pub async fn get<C: ConnectionTrait>(db: &C, digest: &str) -> Result<Option<blob::Model>, DbErr> {
    blob::Entity::find()
        .filter(blob::Column::Digest.eq(digest))
        .one(db)
        .await
}

pub async fn get_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<blob::Model>, DbErr> {
    blob::Entity::find_by_id(id).one(db).await
}

pub async fn list<C: ConnectionTrait>(
    db: &C,
    params: &ListParams,
) -> Result<Vec<blob::Model>, DbErr> {
    let mut query = blob::Entity::find();

    if let Some(digests) = &params.digests {
        query = query.filter(blob::Column::Digest.is_in(digests.iter().cloned()));
    }

    if let Some(artifact_digest) = &params.artifact_digest {
        query = query
            .filter(blob::Column::Digest.in_subquery(artifact_blob_digests(artifact_digest)));
    }

    if let Some(project_id) = params.project_id {
        query = query.filter(blob::Column::Id.in_subquery(project_blob_ids(project_id)));
    }

    query.order_by_asc(blob::Column::Id).all(db).await
}

/// Update blob size and content type.
///
/// The status is never changed here, see [`update_status`].
pub async fn update<C: ConnectionTrait>(db: &C, blob: &blob::Model) -> Result<(), DbErr> {
    blob::Entity::update_many()
        .col_expr(blob::Column::Size, Expr::value(blob.size))
        .col_expr(
            blob::Column::ContentType,
            Expr::value(blob.content_type.clone()),
        )
        .col_expr(blob::Column::UpdateTime, Expr::value(db::now()))
        .filter(blob::Column::Id.eq(blob.id))
        .exec(db)
        .await?;

    Ok(())
}

/// Move the blob into the `target` status.
///
/// The update only happens if the stored status is one of the allowed
/// sources of `target`, and the stored version matches the version of the
/// provided model. Moving back to [`blob::Status::None`] accepts any newer version.
///
/// Returns the number of updated rows, zero when the compare-and-swap was lost.
pub async fn update_status<C: ConnectionTrait>(
    db: &C,
    blob: &blob::Model,
    target: blob::Status,
) -> Result<u64, DbErr> {
    let version = if target == blob::Status::None {
        blob::Column::Version.gte(blob.version)
    } else {
        blob::Column::Version.eq(blob.version)
    };

    let result = blob::Entity::update_many()
        .col_expr(
            blob::Column::Version,
            Expr::col(blob::Column::Version).add(1),
        )
        .col_expr(blob::Column::Status, Expr::value(target))
        .col_expr(blob::Column::UpdateTime, Expr::value(db::now()))
        .filter(blob::Column::Id.eq(blob.id))
        .filter(version)
        .filter(blob::Column::Status.is_in(target.allowed_sources().iter().copied()))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        warn!(
            id = blob.id,
            digest = %blob.digest,
            ?target,
            "no blob is updated according to the status condition"
        );
    }

    Ok(result.rows_affected)
}

pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
    Ok(blob::Entity::delete_by_id(id).exec(db).await?.rows_affected)
}

/// Sum of the sizes of the blobs associated with the project.
pub async fn sum_size_by_project<C: ConnectionTrait>(
    db: &C,
    project_id: i64,
    exclude_foreign_layer: bool,
) -> Result<i64, DbErr> {
    let query = blob::Entity::find()
        .filter(blob::Column::Id.in_subquery(project_blob_ids(project_id)));

    sum_size(db, query, exclude_foreign_layer).await
}

/// Sum of the sizes of all blobs.
pub async fn sum_size_total<C: ConnectionTrait>(
    db: &C,
    exclude_foreign_layer: bool,
) -> Result<i64, DbErr> {
    sum_size(db, blob::Entity::find(), exclude_foreign_layer).await
}

async fn sum_size<C: ConnectionTrait>(
    db: &C,
    mut query: Select<blob::Entity>,
    exclude_foreign_layer: bool,
) -> Result<i64, DbErr> {
    if exclude_foreign_layer {
        query = query.filter(blob::Column::ContentType.ne(blob::FOREIGN_LAYER));
    }

    let total = query
        .select_only()
        .column_as(
            SimpleExpr::from(Func::cast_as(
                Func::coalesce([
                    Func::sum(Expr::col(blob::Column::Size)).into(),
                    Expr::value(0),
                ]),
                Alias::new("BIGINT"),
            )),
            "total",
        )
        .into_tuple::<i64>()
        .one(db)
        .await?;

    Ok(total.unwrap_or_default())
}

/// Number of blobs associated with the project, foreign layers included.
pub async fn count_by_project<C: ConnectionTrait>(db: &C, project_id: i64) -> Result<u64, DbErr> {
    project_blob::Entity::find()
        .filter(project_blob::Column::ProjectId.eq(project_id))
        .count(db)
        .await
}

pub async fn create_project_blob<C: ConnectionTrait>(
    db: &C,
    project_id: i64,
    blob_id: i64,
) -> Result<u64, DbErr> {
    project_blob::Entity::insert(project_blob::ActiveModel {
        project_id: ActiveValue::Set(project_id),
        blob_id: ActiveValue::Set(blob_id),
        creation_time: ActiveValue::Set(db::now()),
    })
    .on_conflict(
        OnConflict::columns([project_blob::Column::ProjectId, project_blob::Column::BlobId])
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(db)
    .await
}

pub async fn delete_project_blobs<C: ConnectionTrait>(
    db: &C,
    project_id: i64,
    blob_ids: &[i64],
) -> Result<(), DbErr> {
    if blob_ids.is_empty() {
        return Ok(());
    }

    project_blob::Entity::delete_many()
        .filter(project_blob::Column::ProjectId.eq(project_id))
        .filter(project_blob::Column::BlobId.is_in(blob_ids.iter().copied()))
        .exec(db)
        .await?;

    Ok(())
}

pub async fn create_artifact_blob<C: ConnectionTrait>(
    db: &C,
    artifact_digest: &str,
    blob_digest: &str,
) -> Result<u64, DbErr> {
    artifact_blob::Entity::insert(artifact_blob::ActiveModel {
        digest_af: ActiveValue::Set(artifact_digest.to_string()),
        digest_blob: ActiveValue::Set(blob_digest.to_string()),
        creation_time: ActiveValue::Set(db::now()),
    })
    .on_conflict(
        OnConflict::columns([
            artifact_blob::Column::DigestAf,
            artifact_blob::Column::DigestBlob,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(db)
    .await
}

pub async fn delete_artifact_blobs<C: ConnectionTrait>(
    db: &C,
    artifact_digest: &str,
) -> Result<u64, DbErr> {
    Ok(artifact_blob::Entity::delete_many()
        .filter(artifact_blob::Column::DigestAf.eq(artifact_digest))
        .exec(db)
        .await?
        .rows_affected)
}

/// Remove the artifact edges of the blob whose manifests have no artifact rows left.
pub async fn delete_dangling_artifact_blobs<C: ConnectionTrait>(
    db: &C,
    blob_digest: &str,
) -> Result<u64, DbErr> {
    let live_manifests = Query::select()
        .column(artifact::Column::Digest)
        .from(artifact::Entity)
        .to_owned();

    Ok(artifact_blob::Entity::delete_many()
        .filter(artifact_blob::Column::DigestBlob.eq(blob_digest))
        .filter(artifact_blob::Column::DigestAf.not_in_subquery(live_manifests))
        .exec(db)
        .await?
        .rows_affected)
}

/// Check whether any project or artifact still references the blob.
pub async fn is_referenced<C: ConnectionTrait>(db: &C, blob: &blob::Model) -> Result<bool, DbErr> {
    let by_project = project_blob::Entity::find()
        .select_only()
        .filter(project_blob::Column::BlobId.eq(blob.id))
        .exists(db)
        .await?;

    if by_project {
        return Ok(true);
    }

    artifact_blob::Entity::find()
        .select_only()
        .filter(artifact_blob::Column::DigestBlob.eq(blob.digest.as_str()))
        .exists(db)
        .await
}

/// Filter the blobs that are no longer referenced by any artifact of the project.
pub async fn find_blobs_should_unassociate_with_project<C: ConnectionTrait>(
    db: &C,
    project_id: i64,
    blobs: &[blob::Model],
) -> Result<Vec<blob::Model>, DbErr> {
    if blobs.is_empty() {
        return Ok(Vec::new());
    }

    let project_manifests = Query::select()
        .column(artifact::Column::Digest)
        .from(artifact::Entity)
        .and_where(artifact::Column::ProjectId.eq(project_id))
        .to_owned();

    let referenced: Vec<String> = artifact_blob::Entity::find()
        .select_only()
        .column(artifact_blob::Column::DigestBlob)
        .filter(artifact_blob::Column::DigestAf.in_subquery(project_manifests))
        .filter(
            artifact_blob::Column::DigestBlob
                .is_in(blobs.iter().map(|blob| blob.digest.clone())),
        )
        .into_tuple::<String>()
        .all(db)
        .await?;

    Ok(blobs
        .iter()
        .filter(|blob| !referenced.contains(&blob.digest))
        .cloned()
        .collect())
}

/// Blobs not associated with any project, last updated before the reserve window.
pub async fn blobs_not_referenced_by_project<C: ConnectionTrait>(
    db: &C,
    window: Duration,
) -> Result<Vec<blob::Model>, DbErr> {
    let referenced = Query::select()
        .column(project_blob::Column::BlobId)
        .from(project_blob::Entity)
        .to_owned();

    let cutoff = db::now() - window;

    blob::Entity::find()
        .filter(blob::Column::Id.not_in_subquery(referenced))
        .filter(blob::Column::UpdateTime.lte(cutoff))
        .order_by_asc(blob::Column::Id)
        .all(db)
        .await
}
