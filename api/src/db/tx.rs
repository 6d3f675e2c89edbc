//! Run a unit of work inside a transaction: commit on success, roll back on
//! failure or panic.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use futures::future::BoxFuture;
use sqlx::{Postgres, Transaction};

use super::error::StoreError;
use super::repository::Repositories;

/// A transaction scope that can be finished exactly once.
pub trait Transactional: Send {
    fn commit(self) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    fn rollback(self) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

/// Repositories bound to an open Postgres transaction.
pub type TxRepositories = Repositories<Transaction<'static, Postgres>>;

impl<'c> Transactional for Repositories<Transaction<'c, Postgres>> {
    async fn commit(self) -> Result<(), sqlx::Error> {
        self.into_inner().commit().await
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        self.into_inner().rollback().await
    }
}

/// Run `f` against `scope` and finish the transaction according to its
/// outcome.
///
/// A panic inside `f` rolls back before the panic is resumed, so the scope
/// is never left open.
pub async fn run_in_transaction<S, T, F>(mut scope: S, f: F) -> Result<T, StoreError>
where
    S: Transactional,
    F: for<'s> FnOnce(&'s mut S) -> BoxFuture<'s, Result<T, StoreError>>,
{
    let outcome = AssertUnwindSafe(f(&mut scope)).catch_unwind().await;

    match outcome {
        Ok(Ok(value)) => {
            scope
                .commit()
                .await
                .map_err(|e| StoreError::query("commit transaction", e))?;
            Ok(value)
        }
        Ok(Err(err)) => match scope.rollback().await {
            Ok(()) => Err(err),
            Err(rollback) => {
                tracing::error!(error = %err, rollback_error = %rollback, "rollback failed");
                Err(StoreError::RollbackFailed {
                    original: Box::new(err),
                    rollback,
                })
            }
        },
        Err(panic) => {
            if let Err(rollback) = scope.rollback().await {
                tracing::error!(rollback_error = %rollback, "rollback after panic failed");
            }
            std::panic::resume_unwind(panic)
        }
    }
}
