pub mod accessory;
pub mod artifact;
pub mod artifact_blob;
pub mod blob;
pub mod cve_allowlist;
pub mod project;
pub mod project_blob;
pub mod project_metadata;
pub mod tag;

use std::error::Error;

use async_trait::async_trait;
pub use sea_orm::{
    sea_query, ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, Database,
    DatabaseConnection, DatabaseTransaction, DbBackend, DbErr, EntityTrait, FromQueryResult,
    JoinType, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, QueryTrait,
    RelationTrait, Select, Statement, StatementBuilder, TransactionError, TransactionTrait,
    TryGetableMany,
};
pub use time::{OffsetDateTime, PrimitiveDateTime};

/// Current UTC timestamp, as stored in the database.
pub fn now() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();

    PrimitiveDateTime::new(now.date(), now.time())
}

pub trait TransactionErrorExt<T, E> {
    /// Convert transaction [`Result`] into a [`Result`] with
    /// a custom error.
    fn into_raw_result(self) -> Result<T, E>;
}

impl<T, E> TransactionErrorExt<T, E> for Result<T, TransactionError<E>>
where
    E: Error + From<DbErr>,
{
    fn into_raw_result(self) -> Result<T, E> {
        match self {
            Ok(val) => Ok(val),
            Err(TransactionError::Connection(err)) => Err(err.into()),
            Err(TransactionError::Transaction(err)) => Err(err),
        }
    }
}

#[async_trait]
pub trait SelectExt {
    /// Check if at least one record that satisfies a query.
    async fn exists<C: ConnectionTrait>(self, db: &C) -> Result<bool, DbErr>;
}

#[async_trait]
impl<T> SelectExt for T
where
    T: QueryTrait<QueryStatement = sea_query::SelectStatement> + Send,
{
    async fn exists<C: ConnectionTrait>(self, db: &C) -> Result<bool, DbErr> {
        use sea_query::{Expr, Query};

        let mut query = self.into_query();

        // SQLite requires at least one selected expression
        query.expr(1);

        let stmt = StatementBuilder::build(
            Query::select().expr(Expr::exists(query)),
            &db.get_database_backend(),
        );

        db.query_one(stmt)
            .await?
            .ok_or_else(|| DbErr::Custom(String::from("empty EXISTS result")))?
            .try_get_by_index(0)
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::{
        prelude::*,
        sea_query::{self, ColumnDef, Iden, Table},
        ActiveValue, Database, QuerySelect,
    };

    use crate::SelectExt;

    #[derive(Iden)]
    enum Digests {
        Table,
        Id,
        Digest,
    }

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "digests")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub digest: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    #[tokio::test]
    async fn exists() {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("unable to create test database");

        let table = Table::create()
            .table(Digests::Table)
            .col(
                ColumnDef::new(Digests::Id)
                    .integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(ColumnDef::new(Digests::Digest).string().not_null())
            .to_owned();

        let builder = db.get_database_backend();
        db.execute(builder.build(&table)).await.unwrap();

        let query = || {
            Entity::find()
                .select_only()
                .filter(Column::Digest.eq("sha256:aa"))
        };

        assert!(!query().exists(&db).await.unwrap());

        Entity::insert(ActiveModel {
            digest: ActiveValue::Set(String::from("sha256:bb")),
            ..Default::default()
        })
        .exec_without_returning(&db)
        .await
        .unwrap();

        assert!(!query().exists(&db).await.unwrap());

        Entity::insert(ActiveModel {
            digest: ActiveValue::Set(String::from("sha256:aa")),
            ..Default::default()
        })
        .exec_without_returning(&db)
        .await
        .unwrap();

        assert!(query().exists(&db).await.unwrap());
    }

    #[test]
    fn blob_status_transitions() {
        use crate::blob::Status;

        assert!(Status::None.allowed_sources().contains(&Status::DeleteFailed));
        assert!(!Status::None.allowed_sources().contains(&Status::Deleting));
        assert_eq!(Status::Delete.allowed_sources(), &[Status::None]);
        assert_eq!(Status::DeleteFailed.allowed_sources(), &[Status::Deleting]);
    }
}
