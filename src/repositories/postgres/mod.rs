//! Repositorios PostgreSQL/PostGIS
//!
//! Una `PgNetworkTx` envuelve una transacción de sqlx; cada entidad implementa
//! su repositorio sobre ella en su propio archivo.

mod association_repository;
mod line_repository;
mod schedule_repository;
mod stop_repository;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use super::{NetworkStore, NetworkTx};
use crate::utils::errors::{AppError, AppResult};

pub struct PgNetworkStore {
    pool: PgPool,
}

impl PgNetworkStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NetworkStore for PgNetworkStore {
    async fn begin(&self) -> AppResult<Box<dyn NetworkTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgNetworkTx { tx: Some(tx) }))
    }
}

pub struct PgNetworkTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgNetworkTx {
    fn conn(&mut self) -> AppResult<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| AppError::Internal("transaction already committed".to_string()))
    }
}

#[async_trait]
impl NetworkTx for PgNetworkTx {
    async fn commit(&mut self) -> AppResult<()> {
        match self.tx.take() {
            Some(tx) => Ok(tx.commit().await?),
            None => Err(AppError::Internal("transaction already committed".to_string())),
        }
    }
}
