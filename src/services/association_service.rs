//! Asociaciones explícitas parada-línea y sus horarios

use std::sync::Arc;

use chrono::NaiveTime;
use tracing::info;
use uuid::Uuid;

use crate::models::{Association, Schedule, Stop};
use crate::repositories::{NetworkStore, NetworkTx};
use crate::services::association_engine::AssociationConsistencyEngine;
use crate::utils::errors::{already_exists_error, not_found_error, AppError, AppResult, Entity};
use crate::utils::geo::locate_fraction;

#[derive(Debug, Clone)]
pub struct AssociationDetail {
    pub association: Association,
    pub schedules: Vec<Schedule>,
}

/// Parada de una línea con su posición relativa sobre el recorrido (0..=1)
#[derive(Debug, Clone)]
pub struct LineStop {
    pub association: Association,
    pub stop: Stop,
    pub schedules: Vec<Schedule>,
    pub position: f64,
}

pub struct AssociationService {
    store: Arc<dyn NetworkStore>,
    engine: Arc<AssociationConsistencyEngine>,
}

impl AssociationService {
    pub fn new(store: Arc<dyn NetworkStore>, engine: Arc<AssociationConsistencyEngine>) -> Self {
        Self { store, engine }
    }

    /// Crea una asociación habilitada con sus horarios
    pub async fn associate(&self, stop_id: Uuid, line_id: Uuid, times: &[NaiveTime]) -> AppResult<AssociationDetail> {
        let mut tx = self.store.begin().await?;
        tx.lock_lines(&[line_id]).await?;
        tx.lock_stops(&[stop_id]).await?;

        let stop = tx.find_stop(stop_id).await?.ok_or_else(|| not_found_error(Entity::Stop, stop_id))?;
        let line = tx.find_line(line_id).await?.ok_or_else(|| not_found_error(Entity::Line, line_id))?;

        if tx.find_association_by_pair(stop_id, line_id).await?.is_some() {
            return Err(already_exists_error(
                Entity::Association,
                format!("stop '{}' is already associated with line '{}'", stop.name, line.description),
            ));
        }

        if !self.engine.stop_near_route(&stop, line.route.as_ref()).await? {
            return Err(AppError::AssociationTooFarFromRoute(format!(
                "stop '{}' is more than {} m from the route of line '{}'",
                stop.name,
                self.engine.max_distance_m(),
                line.description
            )));
        }

        let association = tx.insert_association(stop_id, line_id, true).await?;
        let schedules = tx.insert_schedules(association.id, times).await?;
        self.engine.recompute(tx.as_mut(), &[stop_id], &[line_id]).await?;
        tx.commit().await?;

        info!(association = %association.id, stop = %stop_id, line = %line_id, "association created");
        Ok(AssociationDetail { association, schedules })
    }

    pub async fn set_association_enabled(&self, id: Uuid, enabled: bool) -> AppResult<Association> {
        let mut tx = self.store.begin().await?;
        lock_association(tx.as_mut(), id).await?;
        let association = if enabled {
            self.engine.enable(tx.as_mut(), id).await?
        } else {
            self.engine.disable(tx.as_mut(), id).await?
        };
        tx.commit().await?;

        info!(association = %id, enabled, "association state changed");
        Ok(association)
    }

    pub async fn add_schedules(&self, id: Uuid, times: &[NaiveTime]) -> AppResult<Vec<Schedule>> {
        let mut tx = self.store.begin().await?;
        if tx.find_association(id).await?.is_none() {
            return Err(not_found_error(Entity::Association, id));
        }
        let schedules = tx.insert_schedules(id, times).await?;
        tx.commit().await?;
        Ok(schedules)
    }

    pub async fn delete_schedule(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_schedule(id).await? {
            return Err(not_found_error(Entity::Schedule, id));
        }
        tx.commit().await
    }

    /// Borra la asociación y sus horarios, y recalcula parada y línea
    pub async fn delete_association(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        let association = tx
            .find_association(id)
            .await?
            .ok_or_else(|| not_found_error(Entity::Association, id))?;
        tx.lock_lines(&[association.line_id]).await?;
        tx.lock_stops(&[association.stop_id]).await?;

        tx.delete_association(id).await?;
        self.engine
            .recompute(tx.as_mut(), &[association.stop_id], &[association.line_id])
            .await?;
        tx.commit().await?;

        info!(association = %id, "association deleted");
        Ok(())
    }

    pub async fn list_associations(&self) -> AppResult<Vec<AssociationDetail>> {
        let mut tx = self.store.begin().await?;
        let associations = tx.list_associations().await?;
        with_schedules(tx.as_mut(), associations).await
    }

    /// Paradas de una línea con horarios, ordenadas según el recorrido
    pub async fn line_stops(&self, line_id: Uuid) -> AppResult<Vec<LineStop>> {
        let mut tx = self.store.begin().await?;
        let line = tx.find_line(line_id).await?.ok_or_else(|| not_found_error(Entity::Line, line_id))?;

        let mut stops = Vec::new();
        for association in tx.associations_for_line(line_id).await? {
            let Some(stop) = tx.find_stop(association.stop_id).await? else {
                continue;
            };
            let schedules = tx.schedules_for_association(association.id).await?;
            let position = line
                .route
                .as_ref()
                .map(|route| locate_fraction(route, stop.location))
                .unwrap_or(0.0);
            stops.push(LineStop {
                association,
                stop,
                schedules,
                position,
            });
        }

        stops.sort_by(|a, b| a.position.total_cmp(&b.position));
        Ok(stops)
    }
}

/// Bloquea la línea y la parada de la asociación, si existe
async fn lock_association(tx: &mut dyn NetworkTx, id: Uuid) -> AppResult<()> {
    if let Some(association) = tx.find_association(id).await? {
        tx.lock_lines(&[association.line_id]).await?;
        tx.lock_stops(&[association.stop_id]).await?;
    }
    Ok(())
}

async fn with_schedules(tx: &mut dyn NetworkTx, associations: Vec<Association>) -> AppResult<Vec<AssociationDetail>> {
    let mut details = Vec::with_capacity(associations.len());
    for association in associations {
        let schedules = tx.schedules_for_association(association.id).await?;
        details.push(AssociationDetail { association, schedules });
    }
    Ok(details)
}
