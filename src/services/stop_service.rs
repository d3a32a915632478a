//! Servicio de paradas
//!
//! Las paradas nuevas deben estar cerca de la red caminera y nacen
//! deshabilitadas: su estado depende de sus asociaciones.

use std::sync::Arc;

use geo::Point;
use tracing::info;
use uuid::Uuid;

use crate::config::NetworkConfig;
use crate::models::{NewStop, Stop, StopChanges};
use crate::repositories::NetworkStore;
use crate::services::association_engine::AssociationConsistencyEngine;
use crate::spatial::SpatialQueryGateway;
use crate::utils::errors::{not_found_error, AppError, AppResult, Entity};

pub struct StopService {
    store: Arc<dyn NetworkStore>,
    gateway: Arc<dyn SpatialQueryGateway>,
    engine: Arc<AssociationConsistencyEngine>,
    network_buffer_m: f64,
}

impl StopService {
    pub fn new(
        store: Arc<dyn NetworkStore>,
        gateway: Arc<dyn SpatialQueryGateway>,
        engine: Arc<AssociationConsistencyEngine>,
        config: &NetworkConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            engine,
            network_buffer_m: config.stop_network_buffer_m,
        }
    }

    pub async fn create_stop(&self, stop: NewStop) -> AppResult<Stop> {
        self.ensure_near_network(stop.location).await?;

        let mut tx = self.store.begin().await?;
        let created = tx.insert_stop(stop).await?;
        tx.commit().await?;

        info!(stop = %created.id, name = %created.name, "stop created");
        Ok(created)
    }

    pub async fn get_stop(&self, id: Uuid) -> AppResult<Stop> {
        let mut tx = self.store.begin().await?;
        tx.find_stop(id).await?.ok_or_else(|| not_found_error(Entity::Stop, id))
    }

    pub async fn list_stops(&self) -> AppResult<Vec<Stop>> {
        let mut tx = self.store.begin().await?;
        tx.list_stops().await
    }

    /// Aplica cambios parciales; si la parada se mueve, las asociaciones que
    /// quedan lejos de su línea se deshabilitan
    pub async fn modify_stop(&self, id: Uuid, changes: StopChanges) -> AppResult<Stop> {
        if let Some(location) = changes.location {
            self.ensure_near_network(location).await?;
        }

        let mut tx = self.store.begin().await?;
        tx.lock_stops(&[id]).await?;
        let mut stop = tx.find_stop(id).await?.ok_or_else(|| not_found_error(Entity::Stop, id))?;

        if let Some(name) = changes.name {
            stop.name = name;
        }
        if let Some(shelter) = changes.shelter {
            stop.shelter = shelter;
        }
        if let Some(note) = changes.note {
            stop.note = Some(note);
        }
        let moved = changes.location.is_some_and(|location| location != stop.location);
        if let Some(location) = changes.location {
            stop.location = location;
        }
        let stop = tx.update_stop(&stop).await?;

        if moved {
            let mut lines = Vec::new();
            for association in tx.associations_for_stop(id).await? {
                lines.push(association.line_id);
                if !association.enabled {
                    continue;
                }
                let route = tx.find_line(association.line_id).await?.and_then(|l| l.route);
                if !self.engine.stop_near_route(&stop, route.as_ref()).await? {
                    tx.set_association_enabled(association.id, false).await?;
                    info!(stop = %id, line = %association.line_id, "association disabled after stop move");
                }
            }
            self.engine.recompute(tx.as_mut(), &[id], &lines).await?;
        }

        let stop = tx.find_stop(id).await?.ok_or_else(|| not_found_error(Entity::Stop, id))?;
        tx.commit().await?;
        Ok(stop)
    }

    pub async fn delete_stop(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        tx.lock_stops(&[id]).await?;
        let lines: Vec<Uuid> = tx
            .associations_for_stop(id)
            .await?
            .into_iter()
            .map(|a| a.line_id)
            .collect();

        if !tx.delete_stop(id).await? {
            return Err(not_found_error(Entity::Stop, id));
        }
        self.engine.recompute(tx.as_mut(), &[], &lines).await?;
        tx.commit().await?;

        info!(stop = %id, lines = lines.len(), "stop deleted");
        Ok(())
    }

    async fn ensure_near_network(&self, location: Point<f64>) -> AppResult<()> {
        let distance = self.gateway.distance_to_network(location).await?;
        match distance {
            Some(d) if d <= self.network_buffer_m => Ok(()),
            Some(d) => Err(AppError::StopTooFarFromNetwork(format!(
                "stop at ({}, {}) is {:.1} m from the road network (max {} m)",
                location.x(),
                location.y(),
                d,
                self.network_buffer_m
            ))),
            None => Err(AppError::StopTooFarFromNetwork(format!(
                "no road network near ({}, {})",
                location.x(),
                location.y()
            ))),
        }
    }
}
