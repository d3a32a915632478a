//! Motor de consistencia de asociaciones
//!
//! Máquina de estados `{Deshabilitada, Habilitada}` por asociación y cascadas
//! sobre los estados derivados:
//! - una parada está habilitada si tiene al menos una asociación habilitada;
//! - una línea está habilitada si tiene al menos `min_valid_associations`
//!   asociaciones habilitadas cuya parada también lo está;
//! - una asociación solo puede estar habilitada si su parada está a
//!   `max_distance_m` o menos del recorrido de la línea.
//!
//! Los estados derivados se recalculan siempre a partir de los conteos del
//! almacén dentro de la transacción en curso, con las filas de paradas y
//! líneas bloqueadas antes de contar.

use std::collections::BTreeSet;
use std::sync::Arc;

use geo::MultiLineString;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::NetworkConfig;
use crate::models::{Association, Line, Stop};
use crate::repositories::NetworkTx;
use crate::spatial::SpatialQueryGateway;
use crate::utils::errors::{not_found_error, AppError, AppResult, Entity};

pub struct AssociationConsistencyEngine {
    gateway: Arc<dyn SpatialQueryGateway>,
    max_distance_m: f64,
    min_valid_associations: i64,
}

impl AssociationConsistencyEngine {
    pub fn new(gateway: Arc<dyn SpatialQueryGateway>, config: &NetworkConfig) -> Self {
        Self {
            gateway,
            max_distance_m: config.association_max_distance_m,
            min_valid_associations: config.line_min_valid_associations as i64,
        }
    }

    pub fn max_distance_m(&self) -> f64 {
        self.max_distance_m
    }

    /// Verdadero si la parada está dentro de la distancia máxima del recorrido
    pub async fn stop_near_route(&self, stop: &Stop, route: Option<&MultiLineString<f64>>) -> AppResult<bool> {
        let Some(route) = route else {
            return Ok(false);
        };
        self.gateway
            .within_distance(
                &geo::Geometry::Point(stop.location),
                &geo::Geometry::MultiLineString(route.clone()),
                self.max_distance_m,
            )
            .await
    }

    /// Habilita una asociación; falla si la parada está lejos del recorrido
    pub async fn enable(&self, tx: &mut dyn NetworkTx, association_id: Uuid) -> AppResult<Association> {
        let (association, stop, line) = load_association(tx, association_id).await?;

        if !self.stop_near_route(&stop, line.route.as_ref()).await? {
            return Err(AppError::AssociationTooFarFromRoute(format!(
                "stop '{}' is more than {} m from the route of line '{}'",
                stop.name, self.max_distance_m, line.description
            )));
        }

        if !association.enabled {
            tx.set_association_enabled(association.id, true).await?;
        }
        self.recompute(tx, &[stop.id], &[line.id]).await?;
        reload(tx, association_id).await
    }

    pub async fn disable(&self, tx: &mut dyn NetworkTx, association_id: Uuid) -> AppResult<Association> {
        let (association, stop, line) = load_association(tx, association_id).await?;

        if association.enabled {
            tx.set_association_enabled(association.id, false).await?;
        }
        self.recompute(tx, &[stop.id], &[line.id]).await?;
        reload(tx, association_id).await
    }

    pub async fn on_line_disabled(&self, tx: &mut dyn NetworkTx, line_id: Uuid) -> AppResult<()> {
        let associations = tx.associations_for_line(line_id).await?;
        let mut stops = Vec::with_capacity(associations.len());
        for association in &associations {
            if association.enabled {
                tx.set_association_enabled(association.id, false).await?;
            }
            stops.push(association.stop_id);
        }

        debug!(%line_id, associations = associations.len(), "line disabled, associations disabled");
        self.recompute(tx, &stops, &[line_id]).await
    }

    /// Habilita, en la medida de lo posible, las asociaciones cercanas al recorrido
    pub async fn on_line_enabled(&self, tx: &mut dyn NetworkTx, line_id: Uuid) -> AppResult<()> {
        let line = load_line(tx, line_id).await?;
        let associations = tx.associations_for_line(line_id).await?;

        let mut stops = Vec::with_capacity(associations.len());
        for association in &associations {
            stops.push(association.stop_id);
            if association.enabled {
                continue;
            }
            let Some(stop) = tx.find_stop(association.stop_id).await? else {
                continue;
            };
            if self.stop_near_route(&stop, line.route.as_ref()).await? {
                tx.set_association_enabled(association.id, true).await?;
            } else {
                debug!(association = %association.id, "association left disabled, stop too far from route");
            }
        }

        self.recompute(tx, &stops, &[line_id]).await
    }

    /// Deshabilita las asociaciones habilitadas que quedan lejos del nuevo
    /// recorrido. Nunca habilita por cercanía. Devuelve las deshabilitadas.
    pub async fn on_route_geometry_changed(
        &self,
        tx: &mut dyn NetworkTx,
        line_id: Uuid,
        route: &MultiLineString<f64>,
    ) -> AppResult<Vec<Uuid>> {
        let associations = tx.associations_for_line(line_id).await?;

        let mut stops = Vec::with_capacity(associations.len());
        let mut disabled = Vec::new();
        for association in associations.iter().filter(|a| a.enabled) {
            stops.push(association.stop_id);
            let near = match tx.find_stop(association.stop_id).await? {
                Some(stop) => self.stop_near_route(&stop, Some(route)).await?,
                None => false,
            };
            if !near {
                tx.set_association_enabled(association.id, false).await?;
                disabled.push(association.id);
            }
        }

        if !disabled.is_empty() {
            warn!(%line_id, disabled = disabled.len(), "associations disabled after route change");
        }
        self.recompute(tx, &stops, &[line_id]).await?;
        Ok(disabled)
    }

    /// Asociación automática de una parada cercana a un extremo del recorrido.
    /// Si la parada queda fuera de la distancia máxima la asociación queda
    /// deshabilitada y la parada no se fuerza.
    pub async fn on_association_created_automatically(
        &self,
        tx: &mut dyn NetworkTx,
        stop_id: Uuid,
        line_id: Uuid,
    ) -> AppResult<Association> {
        let stop = load_stop(tx, stop_id).await?;
        let line = load_line(tx, line_id).await?;
        let near = self.stop_near_route(&stop, line.route.as_ref()).await?;

        let association = match tx.find_association_by_pair(stop_id, line_id).await? {
            Some(existing) if existing.enabled || !near => existing,
            Some(existing) => {
                tx.set_association_enabled(existing.id, true).await?;
                Association {
                    enabled: true,
                    ..existing
                }
            }
            None => tx.insert_association(stop_id, line_id, near).await?,
        };

        if association.enabled {
            tx.set_stop_enabled(stop_id, true).await?;
            info!(stop = %stop_id, line = %line_id, "stop associated automatically");
        } else {
            warn!(stop = %stop_id, line = %line_id, "automatic association left disabled, stop too far from route");
        }
        Ok(association)
    }

    /// Vincula una parada cercana a un extremo de una línea que se está
    /// deshabilitando: la asociación nueva nace deshabilitada, la existente
    /// no se toca y la parada no se fuerza.
    pub async fn on_association_created_for_disabled_line(
        &self,
        tx: &mut dyn NetworkTx,
        stop_id: Uuid,
        line_id: Uuid,
    ) -> AppResult<Association> {
        load_stop(tx, stop_id).await?;
        if let Some(existing) = tx.find_association_by_pair(stop_id, line_id).await? {
            return Ok(existing);
        }

        debug!(stop = %stop_id, line = %line_id, "stop linked to a disabled line");
        tx.insert_association(stop_id, line_id, false).await
    }

    /// Recalcula los estados derivados: primero las paradas, luego toda línea
    /// vinculada a esas paradas más las indicadas.
    pub async fn recompute(&self, tx: &mut dyn NetworkTx, stops: &[Uuid], lines: &[Uuid]) -> AppResult<()> {
        let stops: BTreeSet<Uuid> = stops.iter().copied().collect();
        let mut lines: BTreeSet<Uuid> = lines.iter().copied().collect();

        tx.lock_stops(&stops.iter().copied().collect::<Vec<_>>()).await?;
        for stop_id in &stops {
            let enabled = tx.count_enabled_associations_for_stop(*stop_id).await? >= 1;
            tx.set_stop_enabled(*stop_id, enabled).await?;
            for association in tx.associations_for_stop(*stop_id).await? {
                lines.insert(association.line_id);
            }
        }

        tx.lock_lines(&lines.iter().copied().collect::<Vec<_>>()).await?;
        for line_id in &lines {
            let valid = tx.count_valid_associations_for_line(*line_id).await?;
            tx.set_line_enabled(*line_id, valid >= self.min_valid_associations).await?;
        }

        debug!(stops = stops.len(), lines = lines.len(), "derived states recomputed");
        Ok(())
    }
}

async fn load_stop(tx: &mut dyn NetworkTx, id: Uuid) -> AppResult<Stop> {
    tx.find_stop(id).await?.ok_or_else(|| not_found_error(Entity::Stop, id))
}

async fn load_line(tx: &mut dyn NetworkTx, id: Uuid) -> AppResult<Line> {
    tx.find_line(id).await?.ok_or_else(|| not_found_error(Entity::Line, id))
}

async fn reload(tx: &mut dyn NetworkTx, id: Uuid) -> AppResult<Association> {
    tx.find_association(id)
        .await?
        .ok_or_else(|| not_found_error(Entity::Association, id))
}

async fn load_association(tx: &mut dyn NetworkTx, id: Uuid) -> AppResult<(Association, Stop, Line)> {
    let association = reload(tx, id).await?;
    let stop = load_stop(tx, association.stop_id).await?;
    let line = load_line(tx, association.line_id).await?;
    Ok((association, stop, line))
}
