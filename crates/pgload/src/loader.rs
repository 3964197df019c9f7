//! A connection paired with a shared [`Mapper`].
//!
//! ```ignore
//! use pgload::{Loader, Record};
//!
//! #[derive(Record, Default)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! let loader = Loader::new(client);
//! let users: Vec<User> = loader.fetch_all("SELECT id, name FROM users", &[]).await?;
//!
//! let mut count = 0_i64;
//! loader
//!     .query_row("SELECT count(*) FROM users", &[], &mut count)
//!     .await?;
//! ```

use crate::client::{GenericClient, StreamingClient};
use crate::config::MapperConfig;
use crate::cursor::{Cursor, RowsCursor, StreamCursor};
use crate::error::OrmResult;
use crate::insert::StructInsert;
use crate::scan::{Scannable, Scanner};
use crate::schema::{Mapper, Record};
use crate::statement::Statement;
use crate::update::StructUpdate;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// Runs queries on `C` and maps results through a shared [`Mapper`].
pub struct Loader<C> {
    conn: C,
    mapper: Arc<Mapper>,
}

impl<C> Loader<C> {
    /// Loader with the default configuration (`db` tag, snake_case columns).
    pub fn new(conn: C) -> Self {
        Self::with_config(conn, MapperConfig::default())
    }

    pub fn with_config(conn: C, config: MapperConfig) -> Self {
        Self::from_parts(conn, Arc::new(Mapper::new(config)))
    }

    /// Loader sharing an existing mapper and its schema cache.
    pub fn from_parts(conn: C, mapper: Arc<Mapper>) -> Self {
        Self { conn, mapper }
    }

    pub fn mapper(&self) -> &Arc<Mapper> {
        &self.mapper
    }

    pub fn client(&self) -> &C {
        &self.conn
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    pub fn into_inner(self) -> C {
        self.conn
    }

    /// Scanner over `cursor` using this loader's mapper.
    pub fn scanner<K: Cursor>(&self, cursor: K) -> Scanner<K> {
        Scanner::new(cursor, Arc::clone(&self.mapper))
    }
}

impl<C: GenericClient> Loader<C> {
    /// Run a query and return a scanner over its rows.
    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> OrmResult<Scanner<RowsCursor>> {
        tracing::debug!(sql, params = params.len(), "query");
        let rows = self.conn.query(sql, params).await?;
        Ok(self.scanner(RowsCursor::new(rows)))
    }

    pub async fn query_statement(&self, stmt: &Statement) -> OrmResult<Scanner<RowsCursor>> {
        self.query(stmt.sql(), &stmt.params_ref()).await
    }

    /// Run a query that must return exactly one row and scan it into `dest`.
    pub async fn query_row(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        dest: &mut dyn Scannable,
    ) -> OrmResult<()> {
        self.query(sql, params).await?.scan_row(dest).await
    }

    /// Run a query and collect every row into a new `Vec`.
    pub async fn fetch_all<R: Record + Default>(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> OrmResult<Vec<R>> {
        let mut out: Vec<R> = Vec::new();
        self.query(sql, params).await?.scan(&mut [&mut out]).await?;
        Ok(out)
    }

    /// Execute a statement and return the number of affected rows.
    pub async fn exec(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<u64> {
        tracing::debug!(sql, params = params.len(), "exec");
        self.conn.execute(sql, params).await
    }

    pub async fn exec_statement(&self, stmt: &Statement) -> OrmResult<u64> {
        stmt.execute(&self.conn).await
    }

    /// Insert `data` into `table`.
    pub async fn insert<R: Record>(&self, table: &str, data: &[&R]) -> OrmResult<u64> {
        let stmt = StructInsert::new(table, data).generate(&self.mapper)?;
        self.exec_statement(&stmt).await
    }

    /// Update the row of `table` whose `column` equals the record's value for it.
    pub async fn update_exact<R: Record>(
        &self,
        table: &str,
        record: &R,
        column: &str,
    ) -> OrmResult<u64> {
        let stmt = StructUpdate::new(table, record).generate_exact_update(&self.mapper, column)?;
        self.exec_statement(&stmt).await
    }
}

impl<C: StreamingClient> Loader<C> {
    /// Run a query and return a scanner that streams its rows.
    pub async fn query_stream(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> OrmResult<Scanner<StreamCursor>> {
        tracing::debug!(sql, params = params.len(), "query stream");
        let stream = self.conn.query_stream(sql, params).await?;
        Ok(self.scanner(StreamCursor::new(stream)))
    }
}
