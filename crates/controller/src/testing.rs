use db::{Database, DatabaseConnection};
use migration::MigratorTrait;

pub(crate) async fn create_database() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("unable to create test database");

    migration::Migrator::up(&db, None)
        .await
        .expect("unable to run migrations");

    db
}

pub(crate) async fn create_project(db: &DatabaseConnection, name: &str) -> i64 {
    crate::project::create(db, name, &[])
        .await
        .expect("unable to create project")
}
