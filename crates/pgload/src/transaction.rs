//! All-or-nothing units of work.
//!
//! [`run_in_transaction`] begins a transaction, hands the work a [`Loader`] bound to it, and
//! then commits or rolls back:
//!
//! - `Ok(_)`: commit
//! - `Err(_)`: rollback, then return the error
//! - panic: rollback, then resume the panic
//!
//! # Example
//!
//! ```ignore
//! use pgload::{Loader, run_in_transaction};
//!
//! let mut loader = Loader::new(client);
//! let moved = run_in_transaction(&mut loader, |tx| {
//!     Box::pin(async move {
//!         tx.exec("UPDATE accounts SET balance = balance - $1 WHERE id = $2", &[&100_i64, &1_i64])
//!             .await?;
//!         tx.exec("UPDATE accounts SET balance = balance + $1 WHERE id = $2", &[&100_i64, &2_i64])
//!             .await
//!     })
//! })
//! .await?;
//! ```

use crate::client::GenericClient;
use crate::error::{OrmError, OrmResult};
use crate::loader::Loader;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// An open transaction.
pub trait TransactionHandle: GenericClient {
    fn commit(self) -> impl Future<Output = OrmResult<()>> + Send;

    fn rollback(self) -> impl Future<Output = OrmResult<()>> + Send;
}

/// A connection that can open a transaction.
pub trait Begin: GenericClient {
    type Transaction<'a>: TransactionHandle
    where
        Self: 'a;

    fn begin(&mut self) -> impl Future<Output = OrmResult<Self::Transaction<'_>>> + Send;
}

impl TransactionHandle for tokio_postgres::Transaction<'_> {
    async fn commit(self) -> OrmResult<()> {
        tokio_postgres::Transaction::commit(self)
            .await
            .map_err(OrmError::from_db_error)
    }

    async fn rollback(self) -> OrmResult<()> {
        tokio_postgres::Transaction::rollback(self)
            .await
            .map_err(OrmError::from_db_error)
    }
}

impl Begin for tokio_postgres::Client {
    type Transaction<'a> = tokio_postgres::Transaction<'a>;

    async fn begin(&mut self) -> OrmResult<tokio_postgres::Transaction<'_>> {
        self.transaction().await.map_err(OrmError::from_db_error)
    }
}

/// Nested transactions are savepoints.
impl<'t> Begin for tokio_postgres::Transaction<'t> {
    type Transaction<'a>
        = tokio_postgres::Transaction<'a>
    where
        Self: 'a;

    async fn begin(&mut self) -> OrmResult<tokio_postgres::Transaction<'_>> {
        tokio_postgres::Transaction::transaction(self)
            .await
            .map_err(OrmError::from_db_error)
    }
}

async fn rollback_quietly<X: TransactionHandle>(tx: X) {
    if let Err(err) = tx.rollback().await {
        tracing::warn!(error = %err, "transaction rollback failed");
    }
}

/// Run `work` inside a transaction on `loader`'s connection.
///
/// The transaction-scoped loader shares `loader`'s mapper. Rollback failures are logged and
/// the original error (or panic) is surfaced.
pub async fn run_in_transaction<'c, C, T, F>(loader: &'c mut Loader<C>, work: F) -> OrmResult<T>
where
    C: Begin,
    F: for<'t> FnOnce(&'t Loader<C::Transaction<'c>>) -> BoxFuture<'t, OrmResult<T>>,
{
    let mapper = Arc::clone(loader.mapper());
    let tx = loader
        .client_mut()
        .begin()
        .await
        .map_err(|e| OrmError::transaction("begin", e))?;
    let tx_loader = Loader::from_parts(tx, mapper);

    let outcome = AssertUnwindSafe(async { work(&tx_loader).await })
        .catch_unwind()
        .await;
    let tx = tx_loader.into_inner();

    match outcome {
        Ok(Ok(value)) => {
            tx.commit()
                .await
                .map_err(|e| OrmError::transaction("commit", e))?;
            Ok(value)
        }
        Ok(Err(err)) => {
            rollback_quietly(tx).await;
            Err(err)
        }
        Err(panic) => {
            rollback_quietly(tx).await;
            std::panic::resume_unwind(panic)
        }
    }
}
