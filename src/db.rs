use crate::config::Config;
use crate::orm::{categories, comments, locations, posts, users};
use sea_orm::sea_query::TableCreateStatement;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
    Statement,
};
use std::time::Duration;

/// Listings sort by publication date, newest first.
const PUB_DATE_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS posts_pub_date_idx ON posts (pub_date DESC)";

/// Opens the connection pool described by the configuration.
pub async fn init_db(config: &Config) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(config.database_url.to_owned());
    opt.max_connections(config.db_max_connections)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(1))
        .idle_timeout(Duration::from_secs(1))
        .sqlx_logging(true);

    Database::connect(opt).await
}

fn create_table<E: EntityTrait>(schema: &Schema, entity: E) -> TableCreateStatement {
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    stmt
}

/// Creates missing tables, in foreign key order, and the listing index.
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let tables = [
        create_table(&schema, users::Entity),
        create_table(&schema, locations::Entity),
        create_table(&schema, categories::Entity),
        create_table(&schema, posts::Entity),
        create_table(&schema, comments::Entity),
    ];
    for table in tables.iter() {
        db.execute(backend.build(table)).await?;
    }

    db.execute(Statement::from_string(backend, PUB_DATE_INDEX_SQL.to_owned()))
        .await?;

    log::info!("schema is up to date");
    Ok(())
}
