//! Database layer for osccai.

pub mod entities;
pub mod migrations;
pub mod repositories;
pub mod test_utils;

use osccai_common::{AppError, Config};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr, SqlErr};
use std::time::Duration;
use tracing::log::LevelFilter;

/// Initialize database connection.
pub async fn init(config: &Config) -> Result<DatabaseConnection, AppError> {
    let mut opt = ConnectOptions::new(&config.database.url);

    opt.max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);

    Database::connect(opt)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Run pending migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), AppError> {
    use sea_orm_migration::MigratorTrait;
    migrations::Migrator::up(db, None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Map a store error, classifying contention as [`AppError::Conflict`].
///
/// Unique violations, serialization failures and deadlocks all mean another
/// writer got there first; everything else is a plain database error.
#[must_use]
pub fn map_db_err(err: DbErr) -> AppError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
        return AppError::Conflict(detail);
    }

    let message = err.to_string();
    if message.contains("could not serialize access") || message.contains("deadlock detected") {
        return AppError::Conflict(message);
    }

    AppError::Database(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_db_err_plain_error() {
        let err = map_db_err(DbErr::Custom("boom".to_string()));
        assert!(matches!(err, AppError::Database(_)));
    }

    #[test]
    fn test_map_db_err_serialization_failure() {
        let err = map_db_err(DbErr::Custom(
            "could not serialize access due to concurrent update".to_string(),
        ));
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_map_db_err_deadlock() {
        let err = map_db_err(DbErr::Custom("deadlock detected".to_string()));
        assert!(err.is_retryable());
    }
}
