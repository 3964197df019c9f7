//! Connection capability used by loaders and statements.

use crate::error::{OrmError, OrmResult};
use futures_core::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// A trait that unifies database clients and transactions.
///
/// Anything that can run a query and a statement can back a [`Loader`](crate::Loader).
pub trait GenericClient: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = OrmResult<Vec<Row>>> + Send;

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send;
}

impl GenericClient for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<Vec<Row>> {
        tokio_postgres::Client::query(self, sql, params)
            .await
            .map_err(OrmError::from_db_error)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<u64> {
        tokio_postgres::Client::execute(self, sql, params)
            .await
            .map_err(OrmError::from_db_error)
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<Vec<Row>> {
        tokio_postgres::Transaction::query(self, sql, params)
            .await
            .map_err(OrmError::from_db_error)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<u64> {
        tokio_postgres::Transaction::execute(self, sql, params)
            .await
            .map_err(OrmError::from_db_error)
    }
}

/// A stream of database rows.
#[must_use]
pub struct RowStream {
    inner: Pin<Box<dyn Stream<Item = OrmResult<Row>> + Send>>,
}

impl RowStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = OrmResult<Row>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }
}

impl Stream for RowStream {
    type Item = OrmResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// Clients that can stream rows instead of buffering them.
pub trait StreamingClient: GenericClient {
    fn query_stream(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = OrmResult<RowStream>> + Send;
}

struct MapDbRowStream<S> {
    inner: Pin<Box<S>>,
}

impl<S> Stream for MapDbRowStream<S>
where
    S: Stream<Item = Result<Row, tokio_postgres::Error>> + Send + 'static,
{
    type Item = OrmResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner
            .as_mut()
            .poll_next(cx)
            .map(|item| item.map(|row| row.map_err(OrmError::from_db_error)))
    }
}

fn map_stream<S>(stream: S) -> RowStream
where
    S: Stream<Item = Result<Row, tokio_postgres::Error>> + Send + 'static,
{
    RowStream::new(MapDbRowStream {
        inner: Box::pin(stream),
    })
}

impl StreamingClient for tokio_postgres::Client {
    async fn query_stream(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> OrmResult<RowStream> {
        let stream = tokio_postgres::Client::query_raw(self, sql, params.iter().copied())
            .await
            .map_err(OrmError::from_db_error)?;
        Ok(map_stream(stream))
    }
}

impl StreamingClient for tokio_postgres::Transaction<'_> {
    async fn query_stream(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> OrmResult<RowStream> {
        let stream = tokio_postgres::Transaction::query_raw(self, sql, params.iter().copied())
            .await
            .map_err(OrmError::from_db_error)?;
        Ok(map_stream(stream))
    }
}
