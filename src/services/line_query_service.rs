//! Consultas de líneas: listados, filtros y búsquedas espaciales

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveTime;
use tracing::debug;
use uuid::Uuid;

use crate::models::Line;
use crate::repositories::NetworkStore;
use crate::spatial::SpatialQueryGateway;
use crate::utils::errors::{not_found_error, AppResult, Entity};
use crate::utils::geo::parse_polygon_geojson;

/// Radio alrededor de un poste kilométrico
pub const KILOMETRE_POST_RADIUS_M: f64 = 20.0;

pub struct LineQueryService {
    store: Arc<dyn NetworkStore>,
    gateway: Arc<dyn SpatialQueryGateway>,
}

impl LineQueryService {
    pub fn new(store: Arc<dyn NetworkStore>, gateway: Arc<dyn SpatialQueryGateway>) -> Self {
        Self { store, gateway }
    }

    pub async fn get_line(&self, id: Uuid) -> AppResult<Line> {
        let mut tx = self.store.begin().await?;
        tx.find_line(id).await?.ok_or_else(|| not_found_error(Entity::Line, id))
    }

    pub async fn list_lines(&self) -> AppResult<Vec<Line>> {
        let mut tx = self.store.begin().await?;
        tx.list_lines().await
    }

    pub async fn lines_by_company(&self, company: &str) -> AppResult<Vec<Line>> {
        let mut tx = self.store.begin().await?;
        tx.lines_by_company(company).await
    }

    pub async fn lines_by_origin_destination(&self, origin: &str, destination: &str) -> AppResult<Vec<Line>> {
        let mut tx = self.store.begin().await?;
        tx.lines_by_origin_destination(origin, destination).await
    }

    pub async fn lines_by_destination(&self, destination: &str) -> AppResult<Vec<Line>> {
        let mut tx = self.store.begin().await?;
        tx.lines_by_destination(destination).await
    }

    pub async fn list_companies(&self) -> AppResult<Vec<String>> {
        let mut tx = self.store.begin().await?;
        tx.list_companies().await
    }

    /// Líneas cuyo recorrido corta el polígono GeoJSON
    pub async fn lines_intersecting_polygon(&self, polygon_geojson: &str) -> AppResult<Vec<Line>> {
        let polygon = parse_polygon_geojson(polygon_geojson)?;
        let mut tx = self.store.begin().await?;
        let hits = tx.lines_intersecting(&polygon).await?;
        debug!(hits = hits.len(), "polygon search");
        Ok(hits)
    }

    /// Líneas que pasan a 20 m o menos del poste `km` de la ruta `road`
    pub async fn lines_at_kilometre(&self, road: i32, km: i32) -> AppResult<Vec<Line>> {
        let post = self
            .gateway
            .kilometre_post(road, km)
            .await?
            .ok_or_else(|| not_found_error(Entity::KilometrePost, format!("road {} km {}", road, km)))?;

        let mut tx = self.store.begin().await?;
        tx.lines_within(post, KILOMETRE_POST_RADIUS_M).await
    }

    /// Líneas con algún horario entre `from` y `to`. Si `from` es posterior a
    /// `to` el rango cruza la medianoche.
    pub async fn lines_active_between(&self, from: NaiveTime, to: NaiveTime) -> AppResult<Vec<Line>> {
        let mut tx = self.store.begin().await?;
        if from <= to {
            return tx.lines_with_schedule_between(from, to).await;
        }

        let mut merged: BTreeMap<Uuid, Line> = BTreeMap::new();
        let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
        for line in tx.lines_with_schedule_between(from, end_of_day).await? {
            merged.insert(line.id, line);
        }
        for line in tx.lines_with_schedule_between(NaiveTime::MIN, to).await? {
            merged.insert(line.id, line);
        }

        let mut lines: Vec<Line> = merged.into_values().collect();
        lines.sort_by(|a, b| a.description.cmp(&b.description).then(a.id.cmp(&b.id)));
        Ok(lines)
    }

    /// Líneas cuyo recorrido pasa a `meters` o menos de la parada
    pub async fn lines_near_stop(&self, stop_id: Uuid, meters: f64) -> AppResult<Vec<Line>> {
        let mut tx = self.store.begin().await?;
        let stop = tx.find_stop(stop_id).await?.ok_or_else(|| not_found_error(Entity::Stop, stop_id))?;
        tx.lines_within(stop.location, meters).await
    }
}
