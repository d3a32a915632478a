//! Almacén de la red en memoria
//!
//! Las transacciones se serializan detrás de un mutex asíncrono: cada una
//! trabaja sobre una copia del estado y la publica al confirmar, así que los
//! bloqueos de fila no tienen efecto. Replica las restricciones de la base
//! (par parada-línea único y borrados en cascada).

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveTime, Utc};
use geo::{Intersects, MultiPolygon, Point};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{AssociationRepository, LineRepository, NetworkStore, NetworkTx, ScheduleRepository, StopRepository};
use crate::models::{Association, Line, NewLine, NewStop, Schedule, Stop};
use crate::utils::errors::{already_exists_error, internal_error, not_found_error, AppResult, Entity};
use crate::utils::geo::{haversine_m, point_to_lines_m};

#[derive(Debug, Clone, Default)]
struct NetworkState {
    stops: HashMap<Uuid, Stop>,
    lines: HashMap<Uuid, Line>,
    associations: HashMap<Uuid, Association>,
    schedules: HashMap<Uuid, Schedule>,
    companies: BTreeSet<String>,
}

impl NetworkState {
    fn remove_association(&mut self, id: Uuid) -> bool {
        let removed = self.associations.remove(&id).is_some();
        if removed {
            self.schedules.retain(|_, s| s.association_id != id);
        }
        removed
    }

    fn remove_associations_where(&mut self, predicate: impl Fn(&Association) -> bool) {
        let ids: Vec<Uuid> = self
            .associations
            .values()
            .filter(|a| predicate(a))
            .map(|a| a.id)
            .collect();
        for id in ids {
            self.remove_association(id);
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryNetworkStore {
    state: Arc<Mutex<NetworkState>>,
}

impl MemoryNetworkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NetworkStore for MemoryNetworkStore {
    async fn begin(&self) -> AppResult<Box<dyn NetworkTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(MemoryNetworkTx {
            guard: Some(guard),
            working,
        }))
    }
}

pub struct MemoryNetworkTx {
    guard: Option<OwnedMutexGuard<NetworkState>>,
    working: NetworkState,
}

fn sorted_stops(mut stops: Vec<Stop>) -> Vec<Stop> {
    stops.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    stops
}

fn sorted_lines(mut lines: Vec<Line>) -> Vec<Line> {
    lines.sort_by(|a, b| a.description.cmp(&b.description).then(a.id.cmp(&b.id)));
    lines
}

fn sorted_associations(mut associations: Vec<Association>) -> Vec<Association> {
    associations.sort_by_key(|a| (a.line_id, a.stop_id));
    associations
}

#[async_trait]
impl NetworkTx for MemoryNetworkTx {
    async fn commit(&mut self) -> AppResult<()> {
        let mut guard = self
            .guard
            .take()
            .ok_or_else(|| internal_error("transaction already committed"))?;
        *guard = std::mem::take(&mut self.working);
        Ok(())
    }
}

#[async_trait]
impl StopRepository for MemoryNetworkTx {
    async fn find_stop(&mut self, id: Uuid) -> AppResult<Option<Stop>> {
        Ok(self.working.stops.get(&id).cloned())
    }

    async fn list_stops(&mut self) -> AppResult<Vec<Stop>> {
        Ok(sorted_stops(self.working.stops.values().cloned().collect()))
    }

    async fn insert_stop(&mut self, stop: NewStop) -> AppResult<Stop> {
        let stop = Stop {
            id: Uuid::new_v4(),
            name: stop.name,
            location: stop.location,
            enabled: false,
            shelter: stop.shelter,
            note: stop.note,
            created_at: Utc::now(),
        };
        self.working.stops.insert(stop.id, stop.clone());
        Ok(stop)
    }

    async fn update_stop(&mut self, stop: &Stop) -> AppResult<Stop> {
        let current = self
            .working
            .stops
            .get_mut(&stop.id)
            .ok_or_else(|| not_found_error(Entity::Stop, stop.id))?;
        current.name = stop.name.clone();
        current.location = stop.location;
        current.shelter = stop.shelter;
        current.note = stop.note.clone();
        Ok(current.clone())
    }

    async fn set_stop_enabled(&mut self, id: Uuid, enabled: bool) -> AppResult<()> {
        if let Some(stop) = self.working.stops.get_mut(&id) {
            stop.enabled = enabled;
        }
        Ok(())
    }

    async fn delete_stop(&mut self, id: Uuid) -> AppResult<bool> {
        let removed = self.working.stops.remove(&id).is_some();
        if removed {
            self.working.remove_associations_where(|a| a.stop_id == id);
        }
        Ok(removed)
    }

    async fn stops_within(&mut self, point: Point<f64>, meters: f64) -> AppResult<Vec<Stop>> {
        let mut near: Vec<(f64, Stop)> = self
            .working
            .stops
            .values()
            .map(|s| (haversine_m(point, s.location), s.clone()))
            .filter(|(d, _)| *d <= meters)
            .collect();
        near.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(near.into_iter().map(|(_, s)| s).collect())
    }

    async fn lock_stops(&mut self, _ids: &[Uuid]) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl LineRepository for MemoryNetworkTx {
    async fn find_line(&mut self, id: Uuid) -> AppResult<Option<Line>> {
        Ok(self.working.lines.get(&id).cloned())
    }

    async fn list_lines(&mut self) -> AppResult<Vec<Line>> {
        Ok(sorted_lines(self.working.lines.values().cloned().collect()))
    }

    async fn insert_line(&mut self, line: NewLine) -> AppResult<Line> {
        self.working.companies.insert(line.company.clone());
        let line = Line {
            id: Uuid::new_v4(),
            description: line.description,
            company: line.company,
            origin: line.origin,
            destination: line.destination,
            note: line.note,
            waypoints: line.waypoints,
            route: Some(line.route),
            enabled: false,
            created_at: Utc::now(),
        };
        self.working.lines.insert(line.id, line.clone());
        Ok(line)
    }

    async fn update_line(&mut self, line: &Line) -> AppResult<Line> {
        let current = self
            .working
            .lines
            .get_mut(&line.id)
            .ok_or_else(|| not_found_error(Entity::Line, line.id))?;
        let enabled = current.enabled;
        *current = Line {
            enabled,
            ..line.clone()
        };
        let updated = current.clone();
        self.working.companies.insert(updated.company.clone());
        Ok(updated)
    }

    async fn set_line_enabled(&mut self, id: Uuid, enabled: bool) -> AppResult<()> {
        if let Some(line) = self.working.lines.get_mut(&id) {
            line.enabled = enabled;
        }
        Ok(())
    }

    async fn delete_line(&mut self, id: Uuid) -> AppResult<bool> {
        let removed = self.working.lines.remove(&id).is_some();
        if removed {
            self.working.remove_associations_where(|a| a.line_id == id);
        }
        Ok(removed)
    }

    async fn lines_by_company(&mut self, company: &str) -> AppResult<Vec<Line>> {
        Ok(sorted_lines(
            self.working
                .lines
                .values()
                .filter(|l| l.company == company)
                .cloned()
                .collect(),
        ))
    }

    async fn lines_by_origin_destination(&mut self, origin: &str, destination: &str) -> AppResult<Vec<Line>> {
        Ok(sorted_lines(
            self.working
                .lines
                .values()
                .filter(|l| l.origin.as_deref() == Some(origin) && l.destination.as_deref() == Some(destination))
                .cloned()
                .collect(),
        ))
    }

    async fn lines_with_schedule_between(&mut self, from: NaiveTime, to: NaiveTime) -> AppResult<Vec<Line>> {
        let state = &self.working;
        let lines = state
            .lines
            .values()
            .filter(|line| {
                state.schedules.values().any(|s| {
                    s.time >= from
                        && s.time <= to
                        && state
                            .associations
                            .get(&s.association_id)
                            .is_some_and(|a| a.line_id == line.id)
                })
            })
            .cloned()
            .collect();
        Ok(sorted_lines(lines))
    }

    async fn lines_by_destination(&mut self, destination: &str) -> AppResult<Vec<Line>> {
        Ok(sorted_lines(
            self.working
                .lines
                .values()
                .filter(|l| l.destination.as_deref() == Some(destination))
                .cloned()
                .collect(),
        ))
    }

    async fn lines_intersecting(&mut self, polygon: &MultiPolygon<f64>) -> AppResult<Vec<Line>> {
        Ok(sorted_lines(
            self.working
                .lines
                .values()
                .filter(|l| l.route.as_ref().is_some_and(|route| route.intersects(polygon)))
                .cloned()
                .collect(),
        ))
    }

    async fn lines_within(&mut self, point: Point<f64>, meters: f64) -> AppResult<Vec<Line>> {
        Ok(sorted_lines(
            self.working
                .lines
                .values()
                .filter(|l| l.route.as_ref().is_some_and(|route| point_to_lines_m(point, route) <= meters))
                .cloned()
                .collect(),
        ))
    }

    async fn list_companies(&mut self) -> AppResult<Vec<String>> {
        Ok(self.working.companies.iter().cloned().collect())
    }

    async fn lock_lines(&mut self, _ids: &[Uuid]) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl AssociationRepository for MemoryNetworkTx {
    async fn find_association(&mut self, id: Uuid) -> AppResult<Option<Association>> {
        Ok(self.working.associations.get(&id).cloned())
    }

    async fn find_association_by_pair(&mut self, stop_id: Uuid, line_id: Uuid) -> AppResult<Option<Association>> {
        Ok(self
            .working
            .associations
            .values()
            .find(|a| a.stop_id == stop_id && a.line_id == line_id)
            .cloned())
    }

    async fn list_associations(&mut self) -> AppResult<Vec<Association>> {
        Ok(sorted_associations(self.working.associations.values().cloned().collect()))
    }

    async fn associations_for_line(&mut self, line_id: Uuid) -> AppResult<Vec<Association>> {
        Ok(sorted_associations(
            self.working
                .associations
                .values()
                .filter(|a| a.line_id == line_id)
                .cloned()
                .collect(),
        ))
    }

    async fn associations_for_stop(&mut self, stop_id: Uuid) -> AppResult<Vec<Association>> {
        Ok(sorted_associations(
            self.working
                .associations
                .values()
                .filter(|a| a.stop_id == stop_id)
                .cloned()
                .collect(),
        ))
    }

    async fn insert_association(&mut self, stop_id: Uuid, line_id: Uuid, enabled: bool) -> AppResult<Association> {
        if !self.working.stops.contains_key(&stop_id) {
            return Err(not_found_error(Entity::Stop, stop_id));
        }
        if !self.working.lines.contains_key(&line_id) {
            return Err(not_found_error(Entity::Line, line_id));
        }
        if self.find_association_by_pair(stop_id, line_id).await?.is_some() {
            return Err(already_exists_error(
                Entity::Association,
                format!("stop {} is already associated with line {}", stop_id, line_id),
            ));
        }

        let association = Association {
            id: Uuid::new_v4(),
            stop_id,
            line_id,
            enabled,
        };
        self.working.associations.insert(association.id, association.clone());
        Ok(association)
    }

    async fn set_association_enabled(&mut self, id: Uuid, enabled: bool) -> AppResult<()> {
        if let Some(association) = self.working.associations.get_mut(&id) {
            association.enabled = enabled;
        }
        Ok(())
    }

    async fn delete_association(&mut self, id: Uuid) -> AppResult<bool> {
        Ok(self.working.remove_association(id))
    }

    async fn count_valid_associations_for_line(&mut self, line_id: Uuid) -> AppResult<i64> {
        let state = &self.working;
        let count = state
            .associations
            .values()
            .filter(|a| {
                a.line_id == line_id && a.enabled && state.stops.get(&a.stop_id).is_some_and(|s| s.enabled)
            })
            .count();
        Ok(count as i64)
    }

    async fn count_enabled_associations_for_stop(&mut self, stop_id: Uuid) -> AppResult<i64> {
        let count = self
            .working
            .associations
            .values()
            .filter(|a| a.stop_id == stop_id && a.enabled)
            .count();
        Ok(count as i64)
    }
}

#[async_trait]
impl ScheduleRepository for MemoryNetworkTx {
    async fn schedules_for_association(&mut self, association_id: Uuid) -> AppResult<Vec<Schedule>> {
        let mut schedules: Vec<Schedule> = self
            .working
            .schedules
            .values()
            .filter(|s| s.association_id == association_id)
            .cloned()
            .collect();
        schedules.sort_by_key(|s| (s.time, s.id));
        Ok(schedules)
    }

    async fn insert_schedules(&mut self, association_id: Uuid, times: &[NaiveTime]) -> AppResult<Vec<Schedule>> {
        if !self.working.associations.contains_key(&association_id) {
            return Err(not_found_error(Entity::Association, association_id));
        }

        let mut created: Vec<Schedule> = times
            .iter()
            .map(|time| Schedule {
                id: Uuid::new_v4(),
                association_id,
                time: *time,
            })
            .collect();
        for schedule in &created {
            self.working.schedules.insert(schedule.id, schedule.clone());
        }
        created.sort_by_key(|s| s.time);
        Ok(created)
    }

    async fn delete_schedule(&mut self, id: Uuid) -> AppResult<bool> {
        Ok(self.working.schedules.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_stop(name: &str) -> NewStop {
        NewStop {
            name: name.to_string(),
            location: Point::new(-56.0, -34.9),
            shelter: false,
            note: None,
        }
    }

    #[tokio::test]
    async fn uncommitted_transactions_roll_back() {
        let store = MemoryNetworkStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_stop(new_stop("Plaza")).await.unwrap();
        }

        let mut tx = store.begin().await.unwrap();
        assert!(tx.list_stops().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn committed_stops_are_visible_and_start_disabled() {
        let store = MemoryNetworkStore::new();
        let mut tx = store.begin().await.unwrap();
        let stop = tx.insert_stop(new_stop("Plaza")).await.unwrap();
        tx.commit().await.unwrap();
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        let found = tx.find_stop(stop.id).await.unwrap().unwrap();
        assert!(!found.enabled);
    }

    #[tokio::test]
    async fn deleting_a_stop_cascades_associations_and_schedules() {
        let store = MemoryNetworkStore::new();
        let mut tx = store.begin().await.unwrap();
        let stop = tx.insert_stop(new_stop("Plaza")).await.unwrap();
        let line = tx
            .insert_line(NewLine {
                description: "L1".to_string(),
                company: "CUTCSA".to_string(),
                origin: None,
                destination: None,
                note: None,
                waypoints: vec![],
                route: geo::MultiLineString::new(vec![geo::LineString::from(vec![(-56.0, -34.9), (-56.01, -34.9)])]),
            })
            .await
            .unwrap();
        let association = tx.insert_association(stop.id, line.id, true).await.unwrap();
        let time = NaiveTime::from_hms_opt(8, 30, 0).unwrap();
        tx.insert_schedules(association.id, &[time]).await.unwrap();

        assert!(tx.delete_stop(stop.id).await.unwrap());
        assert!(tx.find_association(association.id).await.unwrap().is_none());
        assert!(tx.schedules_for_association(association.id).await.unwrap().is_empty());
        assert!(tx.lines_with_schedule_between(time, time).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_pairs_are_rejected() {
        let store = MemoryNetworkStore::new();
        let mut tx = store.begin().await.unwrap();
        let stop = tx.insert_stop(new_stop("Plaza")).await.unwrap();
        let line = tx
            .insert_line(NewLine {
                description: "L1".to_string(),
                company: "CUTCSA".to_string(),
                origin: None,
                destination: None,
                note: None,
                waypoints: vec![],
                route: geo::MultiLineString::new(vec![]),
            })
            .await
            .unwrap();
        tx.insert_association(stop.id, line.id, false).await.unwrap();
        let err = tx.insert_association(stop.id, line.id, true).await.unwrap_err();
        assert!(matches!(err, crate::utils::errors::AppError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn companies_are_registered_once_and_sorted() {
        let store = MemoryNetworkStore::new();
        let mut tx = store.begin().await.unwrap();
        for company in ["UCOT", "CUTCSA", "UCOT"] {
            tx.insert_line(NewLine {
                description: "L1".to_string(),
                company: company.to_string(),
                origin: None,
                destination: Some("Montevideo".to_string()),
                note: None,
                waypoints: vec![],
                route: geo::MultiLineString::new(vec![geo::LineString::from(vec![(-56.0, -34.9), (-56.01, -34.9)])]),
            })
            .await
            .unwrap();
        }

        assert_eq!(tx.list_companies().await.unwrap(), vec!["CUTCSA", "UCOT"]);
        assert_eq!(tx.lines_by_destination("Montevideo").await.unwrap().len(), 3);
        assert_eq!(tx.lines_within(Point::new(-56.005, -34.9001), 20.0).await.unwrap().len(), 3);
        assert!(tx.lines_within(Point::new(-56.005, -34.91), 20.0).await.unwrap().is_empty());
    }
}
