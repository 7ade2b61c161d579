//! PostgreSQL transaction support for bulk imports

use async_trait::async_trait;
use sqlx::{Acquire, Postgres, Transaction};

use super::{store::insert_row, traits::ImportTransaction};
use crate::{
    models::{Certificate, NewCertificate},
    Error, Result,
};

/// Enclosing transaction of a bulk import.
///
/// Every row runs inside its own SAVEPOINT so a rejected row does not abort
/// the enclosing transaction.
pub struct PostgresImportTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresImportTransaction {
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx: Some(tx) }
    }

    fn tx_mut(&mut self) -> Result<&mut Transaction<'static, Postgres>> {
        self.tx.as_mut().ok_or_else(|| {
            Error::Internal("Transaction already committed or rolled back".to_string())
        })
    }
}

#[async_trait]
impl ImportTransaction for PostgresImportTransaction {
    async fn insert(&mut self, certificate: &NewCertificate) -> Result<Certificate> {
        let tx = self.tx_mut()?;

        // Nested `begin` issues SAVEPOINT.
        let mut savepoint = tx.begin().await.map_err(|e| {
            Error::Internal(format!("Failed to create savepoint: {e}"))
        })?;

        match insert_row(&mut *savepoint, certificate).await {
            Ok(row) => {
                savepoint.commit().await.map_err(|e| {
                    Error::Internal(format!("Failed to release savepoint: {e}"))
                })?;
                Ok(row)
            }
            Err(err) => {
                savepoint.rollback().await.map_err(|e| {
                    Error::Internal(format!("Failed to roll back savepoint: {e}"))
                })?;
                Err(err)
            }
        }
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| Error::Internal("Transaction already committed".to_string()))?;
        tx.commit().await.map_err(Error::Database)
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| Error::Internal("Transaction already rolled back".to_string()))?;
        tx.rollback().await.map_err(Error::Database)
    }
}
