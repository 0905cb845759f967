/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Database connection management supporting PostgreSQL, MySQL, and SQLite.
//!
//! This module provides an async connection pool implementation using
//! `deadpool-diesel`. The backend is detected at runtime from the
//! connection string, so the same binary can point at any enabled backend
//! by configuration alone.
//!
//! # Features
//!
//! - Connection pooling with configurable pool size
//! - Thread-safe connection management
//! - URL-based configuration for PostgreSQL and MySQL
//! - File path or `:memory:` configuration for SQLite

use deadpool_diesel::Runtime;
use tracing::info;

#[cfg(feature = "postgres")]
use deadpool_diesel::postgres::{Manager as PgManager, Pool as PgPool};
#[cfg(feature = "postgres")]
use diesel::PgConnection;

#[cfg(feature = "mysql")]
use deadpool_diesel::mysql::{Manager as MysqlManager, Pool as MysqlPool};
#[cfg(feature = "mysql")]
use diesel::MysqlConnection;

#[cfg(feature = "sqlite")]
use deadpool_diesel::sqlite::{Manager as SqliteManager, Pool as SqlitePool};
#[cfg(feature = "sqlite")]
use diesel::SqliteConnection;

/// Represents the database backend type, detected at runtime from the
/// connection URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// PostgreSQL backend
    #[cfg(feature = "postgres")]
    Postgres,
    /// MySQL backend
    #[cfg(feature = "mysql")]
    Mysql,
    /// SQLite backend
    #[cfg(feature = "sqlite")]
    Sqlite,
}

impl BackendType {
    /// Detect the backend type from a connection URL.
    ///
    /// # Panics
    /// Panics if the URL scheme doesn't match any enabled backend.
    pub fn from_url(url: &str) -> Self {
        #[cfg(feature = "postgres")]
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return BackendType::Postgres;
        }

        #[cfg(feature = "mysql")]
        if url.starts_with("mysql://") {
            return BackendType::Mysql;
        }

        #[cfg(feature = "sqlite")]
        {
            // SQLite URLs can be:
            // - sqlite:// prefix
            // - file paths (relative or absolute)
            // - :memory: for in-memory databases
            if url.starts_with("sqlite://")
                || url.starts_with("/")
                || url.starts_with("./")
                || url.starts_with("../")
                || url == ":memory:"
                || url.ends_with(".db")
                || url.ends_with(".sqlite")
                || url.ends_with(".sqlite3")
            {
                return BackendType::Sqlite;
            }
        }

        panic!(
            "Unable to detect database backend from URL '{}'. \
             Expected postgres://, postgresql://, mysql://, sqlite://, or a file path.",
            url
        );
    }
}

/// Multi-connection enum that wraps the enabled backends' connections.
///
/// This enables runtime backend selection using Diesel's `MultiConnection`
/// derive macro. It is also the handle producers pass to
/// [`SqlStore::add`](crate::SqlStore::add): any variant works inside the
/// caller's own transaction.
#[derive(diesel::MultiConnection)]
pub enum AnyConnection {
    /// PostgreSQL connection variant
    #[cfg(feature = "postgres")]
    Postgres(PgConnection),
    /// MySQL connection variant
    #[cfg(feature = "mysql")]
    Mysql(MysqlConnection),
    /// SQLite connection variant
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteConnection),
}

/// Helper macro for matching on [`AnyConnection`] variants.
#[macro_export]
macro_rules! connection_match {
    ($conn:expr, $pg:ident => $pg_block:block, $mysql:ident => $mysql_block:block, $sqlite:ident => $sqlite_block:block) => {
        match $conn {
            #[cfg(feature = "postgres")]
            $crate::database::connection::AnyConnection::Postgres($pg) => $pg_block,
            #[cfg(feature = "mysql")]
            $crate::database::connection::AnyConnection::Mysql($mysql) => $mysql_block,
            #[cfg(feature = "sqlite")]
            $crate::database::connection::AnyConnection::Sqlite($sqlite) => $sqlite_block,
        }
    };
}

/// Helper macro for dispatching an operation to the active backend.
#[macro_export]
macro_rules! dispatch_backend {
    ($backend:expr, $postgres:expr, $mysql:expr, $sqlite:expr) => {
        match $backend {
            #[cfg(feature = "postgres")]
            $crate::database::connection::BackendType::Postgres => $postgres,
            #[cfg(feature = "mysql")]
            $crate::database::connection::BackendType::Mysql => $mysql,
            #[cfg(feature = "sqlite")]
            $crate::database::connection::BackendType::Sqlite => $sqlite,
        }
    };
}

/// Pool enum that wraps the enabled backends' connection pools.
#[derive(Clone)]
pub enum AnyPool {
    /// PostgreSQL connection pool
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
    /// MySQL connection pool
    #[cfg(feature = "mysql")]
    Mysql(MysqlPool),
    /// SQLite connection pool
    #[cfg(feature = "sqlite")]
    Sqlite(SqlitePool),
}

impl std::fmt::Debug for AnyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "postgres")]
            AnyPool::Postgres(_) => write!(f, "AnyPool::Postgres(...)"),
            #[cfg(feature = "mysql")]
            AnyPool::Mysql(_) => write!(f, "AnyPool::Mysql(...)"),
            #[cfg(feature = "sqlite")]
            AnyPool::Sqlite(_) => write!(f, "AnyPool::Sqlite(...)"),
        }
    }
}

impl AnyPool {
    /// Returns a reference to the PostgreSQL pool if this is a PostgreSQL backend.
    #[cfg(feature = "postgres")]
    pub fn as_postgres(&self) -> Option<&PgPool> {
        match self {
            AnyPool::Postgres(pool) => Some(pool),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Returns a reference to the MySQL pool if this is a MySQL backend.
    #[cfg(feature = "mysql")]
    pub fn as_mysql(&self) -> Option<&MysqlPool> {
        match self {
            AnyPool::Mysql(pool) => Some(pool),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Returns a reference to the SQLite pool if this is a SQLite backend.
    #[cfg(feature = "sqlite")]
    pub fn as_sqlite(&self) -> Option<&SqlitePool> {
        match self {
            AnyPool::Sqlite(pool) => Some(pool),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Returns the PostgreSQL pool, panicking if this is another backend.
    #[cfg(feature = "postgres")]
    pub fn expect_postgres(&self) -> &PgPool {
        self.as_postgres()
            .expect("Expected PostgreSQL pool but got another backend")
    }

    /// Returns the MySQL pool, panicking if this is another backend.
    #[cfg(feature = "mysql")]
    pub fn expect_mysql(&self) -> &MysqlPool {
        self.as_mysql()
            .expect("Expected MySQL pool but got another backend")
    }

    /// Returns the SQLite pool, panicking if this is another backend.
    #[cfg(feature = "sqlite")]
    pub fn expect_sqlite(&self) -> &SqlitePool {
        self.as_sqlite()
            .expect("Expected SQLite pool but got another backend")
    }
}

/// Represents a pool of database connections.
///
/// This struct provides a thread-safe wrapper around a connection pool,
/// allowing multiple parts of the application to share database
/// connections efficiently.
///
/// # Thread Safety
///
/// `Database` is `Clone` and can be safely shared between threads. Each
/// clone references the same underlying connection pool.
#[derive(Clone, Debug)]
pub struct Database {
    /// The connection pool for the detected backend
    pool: AnyPool,
    /// The detected backend type
    backend: BackendType,
}

impl Database {
    /// Creates a new database connection pool with automatic backend
    /// detection.
    ///
    /// The backend is detected from the connection string:
    /// - `postgres://` or `postgresql://` -> PostgreSQL
    /// - `mysql://` -> MySQL
    /// - `sqlite://`, file paths, or `:memory:` -> SQLite
    ///
    /// # Panics
    ///
    /// Panics if the connection pool cannot be created.
    pub fn new(connection_string: &str, max_size: usize) -> Self {
        let backend = BackendType::from_url(connection_string);

        match backend {
            #[cfg(feature = "postgres")]
            BackendType::Postgres => {
                let manager = PgManager::new(connection_string, Runtime::Tokio1);
                let pool = PgPool::builder(manager)
                    .max_size(max_size)
                    .build()
                    .expect("Failed to create PostgreSQL connection pool");

                info!("PostgreSQL connection pool initialized");

                Self {
                    pool: AnyPool::Postgres(pool),
                    backend,
                }
            }
            #[cfg(feature = "mysql")]
            BackendType::Mysql => {
                let manager = MysqlManager::new(connection_string, Runtime::Tokio1);
                let pool = MysqlPool::builder(manager)
                    .max_size(max_size)
                    .build()
                    .expect("Failed to create MySQL connection pool");

                info!("MySQL connection pool initialized");

                Self {
                    pool: AnyPool::Mysql(pool),
                    backend,
                }
            }
            #[cfg(feature = "sqlite")]
            BackendType::Sqlite => {
                let connection_url = Self::build_sqlite_url(connection_string);
                let manager = SqliteManager::new(connection_url, Runtime::Tokio1);
                let pool = SqlitePool::builder(manager)
                    .max_size(max_size)
                    .build()
                    .expect("Failed to create SQLite connection pool");

                info!("SQLite connection pool initialized");

                Self {
                    pool: AnyPool::Sqlite(pool),
                    backend,
                }
            }
        }
    }

    /// Returns the detected backend type.
    pub fn backend(&self) -> BackendType {
        self.backend
    }

    /// Returns a clone of the connection pool.
    pub fn pool(&self) -> AnyPool {
        self.pool.clone()
    }

    /// Gets a pooled PostgreSQL connection.
    #[cfg(feature = "postgres")]
    pub async fn get_postgres_connection(
        &self,
    ) -> Result<deadpool_diesel::postgres::Connection, deadpool_diesel::PoolError> {
        self.pool.expect_postgres().get().await
    }

    /// Gets a pooled MySQL connection.
    #[cfg(feature = "mysql")]
    pub async fn get_mysql_connection(
        &self,
    ) -> Result<deadpool_diesel::mysql::Connection, deadpool_diesel::PoolError> {
        self.pool.expect_mysql().get().await
    }

    /// Gets a pooled SQLite connection.
    #[cfg(feature = "sqlite")]
    pub async fn get_sqlite_connection(
        &self,
    ) -> Result<deadpool_diesel::sqlite::Connection, deadpool_diesel::PoolError> {
        self.pool.expect_sqlite().get().await
    }

    /// Builds a SQLite connection URL.
    #[cfg(feature = "sqlite")]
    fn build_sqlite_url(connection_string: &str) -> String {
        // Strip sqlite:// prefix if present
        if let Some(path) = connection_string.strip_prefix("sqlite://") {
            path.to_string()
        } else {
            connection_string.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_type_detection() {
        #[cfg(feature = "postgres")]
        {
            assert_eq!(
                BackendType::from_url("postgres://localhost/db"),
                BackendType::Postgres
            );
            assert_eq!(
                BackendType::from_url("postgresql://localhost/db"),
                BackendType::Postgres
            );
        }

        #[cfg(feature = "mysql")]
        {
            assert_eq!(
                BackendType::from_url("mysql://root@localhost/db"),
                BackendType::Mysql
            );
        }

        #[cfg(feature = "sqlite")]
        {
            assert_eq!(
                BackendType::from_url("sqlite:///path/to/db"),
                BackendType::Sqlite
            );
            assert_eq!(
                BackendType::from_url("/absolute/path.db"),
                BackendType::Sqlite
            );
            assert_eq!(
                BackendType::from_url("./relative/path.db"),
                BackendType::Sqlite
            );
            assert_eq!(BackendType::from_url(":memory:"), BackendType::Sqlite);
            assert_eq!(
                BackendType::from_url("database.sqlite"),
                BackendType::Sqlite
            );
            assert_eq!(
                BackendType::from_url("database.sqlite3"),
                BackendType::Sqlite
            );
        }
    }

    #[test]
    #[cfg(feature = "sqlite")]
    fn test_sqlite_connection_strings() {
        // Test file path
        let url = Database::build_sqlite_url("/path/to/database.db");
        assert_eq!(url, "/path/to/database.db");

        // Test in-memory database
        let url = Database::build_sqlite_url(":memory:");
        assert_eq!(url, ":memory:");

        // Test sqlite:// prefix stripping
        let url = Database::build_sqlite_url("sqlite:///path/to/db.sqlite");
        assert_eq!(url, "/path/to/db.sqlite");
    }
}
