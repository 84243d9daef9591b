//! Database configuration module.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs without hand-written SQL.

use crate::core::prefix::PrefixStore;
use crate::entities::Prefix;
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{error, info, warn};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/quanta.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable, falling back to a
/// local `SQLite` file.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by [`get_database_url`].
///
/// The `data/` directory is created when the default URL is used.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let url = get_database_url();
    if url == DEFAULT_DATABASE_URL {
        std::fs::create_dir_all("data")?;
    }
    Database::connect(&url).await.map_err(Into::into)
}

/// Creates the tables used by the bot if they do not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut prefix_table = schema.create_table_from_entity(Prefix);
    prefix_table.if_not_exists();

    db.execute(builder.build(&prefix_table)).await?;

    Ok(())
}

/// Builds the prefix store on `connection` once its tables exist.
///
/// The store is left disconnected, serving `default_prefix`, when the connection failed or
/// the tables could not be created.
pub async fn open_prefix_store(
    connection: Result<DatabaseConnection>,
    default_prefix: &str,
) -> PrefixStore {
    let db = match connection {
        Ok(db) => db,
        Err(e) => {
            warn!(
                "The database refused to connect! Falling back to {default_prefix:?} prefix. ({e})"
            );
            return PrefixStore::disconnected(default_prefix);
        }
    };

    match create_tables(&db).await {
        Ok(()) => {
            info!("Database initialized successfully.");
            PrefixStore::connected(db, default_prefix)
        }
        Err(e) => {
            error!("Failed to create tables, falling back to {default_prefix:?} prefix: {e}");
            PrefixStore::disconnected(default_prefix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::PrefixModel;
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        let _: Vec<PrefixModel> = Prefix::find().limit(1).all(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_open_prefix_store_connects() {
        let db = Database::connect("sqlite::memory:").await;
        let store = open_prefix_store(db.map_err(Into::into), "?").await;
        assert!(store.is_connected().await);
    }

    #[tokio::test]
    async fn test_failed_connection_leaves_store_disconnected() {
        let store = open_prefix_store(Err(crate::errors::Error::NotConnected), "!").await;
        assert!(!store.is_connected().await);
        assert_eq!(store.default_prefix(), "!");
    }

    #[tokio::test]
    async fn test_failed_table_setup_leaves_store_disconnected() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        // An index already owns the table's name, so CREATE TABLE fails
        db.execute_unprepared("CREATE TABLE other (x INTEGER)")
            .await?;
        db.execute_unprepared("CREATE INDEX prefixes ON other (x)")
            .await?;

        let store = open_prefix_store(Ok(db), "?").await;
        assert!(!store.is_connected().await);
        Ok(())
    }
}
