//! Ciclo de vida de líneas
//!
//! Alta, modificación, baja y habilitación de líneas. Cada operación corre en
//! una única transacción: el cálculo del recorrido, la asociación automática
//! de paradas cercanas a los extremos y las cascadas del motor de
//! consistencia se confirman juntos o no se confirman.

use std::collections::BTreeSet;
use std::sync::Arc;

use geo::{MultiLineString, Point};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::NetworkConfig;
use crate::models::line::line_endpoints;
use crate::models::{Association, Line, NewLine, RouteGeometry};
use crate::repositories::{NetworkStore, NetworkTx};
use crate::services::association_engine::AssociationConsistencyEngine;
use crate::services::route_calculator::RouteCalculator;
use crate::spatial::SpatialQueryGateway;
use crate::utils::errors::{not_found_error, AppError, AppResult, Entity};

/// Datos de alta de una línea con la geometría ya parseada
#[derive(Debug, Clone)]
pub struct CreateLine {
    pub description: String,
    pub company: String,
    pub waypoints: Vec<Point<f64>>,
    pub note: Option<String>,
    /// Recorrido provisto por el cliente, se asume ya validado
    pub route: Option<MultiLineString<f64>>,
}

#[derive(Debug, Clone, Default)]
pub struct LineChanges {
    pub description: Option<String>,
    pub company: Option<String>,
    pub note: Option<String>,
    pub enabled: Option<bool>,
    pub waypoints: Option<Vec<Point<f64>>>,
    pub route: Option<MultiLineString<f64>>,
}

/// Línea persistida junto con sus asociaciones
#[derive(Debug, Clone)]
pub struct LineOutcome {
    pub line: Line,
    pub associations: Vec<Association>,
}

pub struct LineLifecycleManager {
    store: Arc<dyn NetworkStore>,
    gateway: Arc<dyn SpatialQueryGateway>,
    calculator: Arc<RouteCalculator>,
    engine: Arc<AssociationConsistencyEngine>,
    auto_association_distance_m: f64,
}

impl LineLifecycleManager {
    pub fn new(
        store: Arc<dyn NetworkStore>,
        gateway: Arc<dyn SpatialQueryGateway>,
        calculator: Arc<RouteCalculator>,
        engine: Arc<AssociationConsistencyEngine>,
        config: &NetworkConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            calculator,
            engine,
            auto_association_distance_m: config.auto_association_distance_m,
        }
    }

    pub async fn create_line(&self, input: CreateLine) -> AppResult<LineOutcome> {
        if input.waypoints.is_empty() {
            return Err(AppError::InsufficientWaypoints(
                "a line needs at least one waypoint".to_string(),
            ));
        }

        let route = match input.route {
            Some(route) => RouteGeometry::from_multi(route),
            None => self.calculator.compute(&input.waypoints).await?.geometry,
        };
        let (start, end) = endpoints(&input.waypoints, &route)?;
        let (origin, destination) = self.resolve_regions(start, end).await?;

        let mut tx = self.store.begin().await?;

        let near_start = tx.stops_within(start, self.auto_association_distance_m).await?;
        let near_end = tx.stops_within(end, self.auto_association_distance_m).await?;
        if near_start.is_empty() || near_end.is_empty() {
            return Err(AppError::RouteEndpointsNotNearStops(describe_missing_endpoints(
                near_start.is_empty(),
                near_end.is_empty(),
                self.auto_association_distance_m,
            )));
        }

        let line = tx
            .insert_line(NewLine {
                description: input.description,
                company: input.company,
                origin,
                destination,
                note: input.note,
                waypoints: input.waypoints,
                route: route.to_multi(),
            })
            .await?;

        let stops: BTreeSet<Uuid> = near_start.iter().chain(near_end.iter()).map(|s| s.id).collect();
        tx.lock_stops(&stops.iter().copied().collect::<Vec<_>>()).await?;
        for stop_id in &stops {
            self.engine
                .on_association_created_automatically(tx.as_mut(), *stop_id, line.id)
                .await?;
        }
        let stops: Vec<Uuid> = stops.into_iter().collect();
        self.engine.recompute(tx.as_mut(), &stops, &[line.id]).await?;

        let outcome = load_outcome(tx.as_mut(), line.id).await?;
        tx.commit().await?;

        info!(
            line = %outcome.line.id,
            associations = outcome.associations.len(),
            enabled = outcome.line.enabled,
            "line created"
        );
        Ok(outcome)
    }

    /// Un pedido explícito de deshabilitar se respeta aunque cambie el
    /// recorrido: las paradas de los nuevos extremos quedan vinculadas pero
    /// deshabilitadas.
    pub async fn modify_line(&self, id: Uuid, changes: LineChanges) -> AppResult<LineOutcome> {
        let new_route = match (changes.route, changes.waypoints.as_deref()) {
            (Some(route), _) => Some(RouteGeometry::from_multi(route)),
            (None, Some(waypoints)) => Some(self.calculator.compute(waypoints).await?.geometry),
            (None, None) => None,
        };
        let disabling = changes.enabled == Some(false);

        let mut tx = self.store.begin().await?;
        tx.lock_lines(&[id]).await?;
        let mut line = tx.find_line(id).await?.ok_or_else(|| not_found_error(Entity::Line, id))?;

        // El cambio explícito de estado corre antes que el resto de los cambios
        match changes.enabled {
            Some(true) => self.engine.on_line_enabled(tx.as_mut(), id).await?,
            Some(false) => self.engine.on_line_disabled(tx.as_mut(), id).await?,
            None => {}
        }

        if let Some(description) = changes.description {
            line.description = description;
        }
        if let Some(company) = changes.company {
            line.company = company;
        }
        if let Some(note) = changes.note {
            line.note = Some(note);
        }

        match new_route {
            Some(route) => {
                let multi = route.to_multi();
                let new_waypoints = changes.waypoints.unwrap_or_default();
                let (start, end) = endpoints(&new_waypoints, &route)?;

                self.engine.on_route_geometry_changed(tx.as_mut(), id, &multi).await?;

                let (origin, destination) = self.resolve_regions(start, end).await?;
                line.origin = origin;
                line.destination = destination;
                // Sin puntos de paso nuevos los extremos del recorrido los reemplazan
                line.waypoints = if new_waypoints.is_empty() {
                    vec![start, end]
                } else {
                    new_waypoints
                };
                line.route = Some(multi);
                tx.update_line(&line).await?;

                let mut stops = BTreeSet::new();
                for point in [start, end] {
                    for stop in tx.stops_within(point, self.auto_association_distance_m).await? {
                        stops.insert(stop.id);
                    }
                }
                if stops.is_empty() {
                    warn!(line = %id, "no stops near the new route endpoints");
                }
                tx.lock_stops(&stops.iter().copied().collect::<Vec<_>>()).await?;
                for stop_id in &stops {
                    if disabling {
                        self.engine
                            .on_association_created_for_disabled_line(tx.as_mut(), *stop_id, id)
                            .await?;
                    } else {
                        self.engine
                            .on_association_created_automatically(tx.as_mut(), *stop_id, id)
                            .await?;
                    }
                }
                let stops: Vec<Uuid> = stops.into_iter().collect();
                self.engine.recompute(tx.as_mut(), &stops, &[id]).await?;
            }
            None => {
                tx.update_line(&line).await?;
            }
        }

        let outcome = load_outcome(tx.as_mut(), id).await?;
        tx.commit().await?;

        info!(line = %id, enabled = outcome.line.enabled, "line modified");
        Ok(outcome)
    }

    pub async fn delete_line(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        tx.lock_lines(&[id]).await?;
        if tx.find_line(id).await?.is_none() {
            return Err(not_found_error(Entity::Line, id));
        }

        let stops: Vec<Uuid> = tx
            .associations_for_line(id)
            .await?
            .into_iter()
            .map(|a| a.stop_id)
            .collect();

        tx.delete_line(id).await?;
        self.engine.recompute(tx.as_mut(), &stops, &[]).await?;
        tx.commit().await?;

        info!(line = %id, stops = stops.len(), "line deleted");
        Ok(())
    }

    pub async fn set_line_enabled(&self, id: Uuid, enabled: bool) -> AppResult<LineOutcome> {
        let mut tx = self.store.begin().await?;
        tx.lock_lines(&[id]).await?;
        if tx.find_line(id).await?.is_none() {
            return Err(not_found_error(Entity::Line, id));
        }

        if enabled {
            self.engine.on_line_enabled(tx.as_mut(), id).await?;
        } else {
            self.engine.on_line_disabled(tx.as_mut(), id).await?;
        }

        let outcome = load_outcome(tx.as_mut(), id).await?;
        tx.commit().await?;

        if enabled && !outcome.line.enabled {
            warn!(line = %id, "line enable requested but not enough valid associations");
        }
        info!(line = %id, enabled = outcome.line.enabled, "line state changed");
        Ok(outcome)
    }

    async fn resolve_regions(&self, start: Point<f64>, end: Point<f64>) -> AppResult<(Option<String>, Option<String>)> {
        let origin = self.gateway.containing_region(start).await?;
        let destination = self.gateway.containing_region(end).await?;
        Ok((origin, destination))
    }
}

fn endpoints(waypoints: &[Point<f64>], route: &RouteGeometry) -> AppResult<(Point<f64>, Point<f64>)> {
    line_endpoints(waypoints, Some(route))
        .ok_or_else(|| AppError::InvalidGeometry("route geometry is empty".to_string()))
}

fn describe_missing_endpoints(start_missing: bool, end_missing: bool, meters: f64) -> String {
    let which = match (start_missing, end_missing) {
        (true, true) => "neither the start nor the end",
        (true, false) => "the start",
        _ => "the end",
    };
    format!("{} of the line has no stop within {} m", which, meters)
}

async fn load_outcome(tx: &mut dyn NetworkTx, id: Uuid) -> AppResult<LineOutcome> {
    let line = tx.find_line(id).await?.ok_or_else(|| not_found_error(Entity::Line, id))?;
    let associations = tx.associations_for_line(id).await?;
    Ok(LineOutcome { line, associations })
}
