//! Capa de persistencia
//!
//! Repositorios por entidad agrupados en una transacción (`NetworkTx`). Toda
//! operación que modifica la red abre una transacción con `NetworkStore::begin`
//! y la confirma con `commit`; soltarla sin confirmar la revierte.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveTime;
use geo::{MultiPolygon, Point};
use uuid::Uuid;

use crate::models::{Association, Line, NewLine, NewStop, Schedule, Stop};
use crate::utils::errors::AppResult;

pub use memory::MemoryNetworkStore;
pub use postgres::PgNetworkStore;

#[async_trait]
pub trait StopRepository: Send {
    async fn find_stop(&mut self, id: Uuid) -> AppResult<Option<Stop>>;
    async fn list_stops(&mut self) -> AppResult<Vec<Stop>>;
    async fn insert_stop(&mut self, stop: NewStop) -> AppResult<Stop>;
    /// Persiste nombre, ubicación, refugio y nota; `enabled` solo cambia por `set_stop_enabled`
    async fn update_stop(&mut self, stop: &Stop) -> AppResult<Stop>;
    async fn set_stop_enabled(&mut self, id: Uuid, enabled: bool) -> AppResult<()>;
    async fn delete_stop(&mut self, id: Uuid) -> AppResult<bool>;
    /// Paradas a `meters` o menos del punto
    async fn stops_within(&mut self, point: Point<f64>, meters: f64) -> AppResult<Vec<Stop>>;
    /// Bloquea las filas hasta el fin de la transacción, en orden de id
    async fn lock_stops(&mut self, ids: &[Uuid]) -> AppResult<()>;
}

#[async_trait]
pub trait LineRepository: Send {
    async fn find_line(&mut self, id: Uuid) -> AppResult<Option<Line>>;
    async fn list_lines(&mut self) -> AppResult<Vec<Line>>;
    async fn insert_line(&mut self, line: NewLine) -> AppResult<Line>;
    async fn update_line(&mut self, line: &Line) -> AppResult<Line>;
    async fn set_line_enabled(&mut self, id: Uuid, enabled: bool) -> AppResult<()>;
    async fn delete_line(&mut self, id: Uuid) -> AppResult<bool>;
    async fn lines_by_company(&mut self, company: &str) -> AppResult<Vec<Line>>;
    async fn lines_by_origin_destination(&mut self, origin: &str, destination: &str) -> AppResult<Vec<Line>>;
    async fn lines_by_destination(&mut self, destination: &str) -> AppResult<Vec<Line>>;
    /// Líneas con algún horario en `[from, to]`
    async fn lines_with_schedule_between(&mut self, from: NaiveTime, to: NaiveTime) -> AppResult<Vec<Line>>;
    /// Líneas cuyo recorrido corta el polígono
    async fn lines_intersecting(&mut self, polygon: &MultiPolygon<f64>) -> AppResult<Vec<Line>>;
    /// Líneas cuyo recorrido pasa a `meters` o menos del punto
    async fn lines_within(&mut self, point: Point<f64>, meters: f64) -> AppResult<Vec<Line>>;
    /// Empresas registradas, ordenadas por nombre
    async fn list_companies(&mut self) -> AppResult<Vec<String>>;
    /// Bloquea las filas hasta el fin de la transacción, en orden de id
    async fn lock_lines(&mut self, ids: &[Uuid]) -> AppResult<()>;
}

#[async_trait]
pub trait AssociationRepository: Send {
    async fn find_association(&mut self, id: Uuid) -> AppResult<Option<Association>>;
    async fn find_association_by_pair(&mut self, stop_id: Uuid, line_id: Uuid) -> AppResult<Option<Association>>;
    async fn list_associations(&mut self) -> AppResult<Vec<Association>>;
    async fn associations_for_line(&mut self, line_id: Uuid) -> AppResult<Vec<Association>>;
    async fn associations_for_stop(&mut self, stop_id: Uuid) -> AppResult<Vec<Association>>;
    async fn insert_association(&mut self, stop_id: Uuid, line_id: Uuid, enabled: bool) -> AppResult<Association>;
    async fn set_association_enabled(&mut self, id: Uuid, enabled: bool) -> AppResult<()>;
    async fn delete_association(&mut self, id: Uuid) -> AppResult<bool>;
    /// Asociaciones habilitadas de la línea cuya parada también está habilitada
    async fn count_valid_associations_for_line(&mut self, line_id: Uuid) -> AppResult<i64>;
    async fn count_enabled_associations_for_stop(&mut self, stop_id: Uuid) -> AppResult<i64>;
}

#[async_trait]
pub trait ScheduleRepository: Send {
    /// Horarios de la asociación ordenados por hora
    async fn schedules_for_association(&mut self, association_id: Uuid) -> AppResult<Vec<Schedule>>;
    async fn insert_schedules(&mut self, association_id: Uuid, times: &[NaiveTime]) -> AppResult<Vec<Schedule>>;
    async fn delete_schedule(&mut self, id: Uuid) -> AppResult<bool>;
}

/// Unidad de trabajo sobre la red completa
#[async_trait]
pub trait NetworkTx: StopRepository + LineRepository + AssociationRepository + ScheduleRepository + Send {
    async fn commit(&mut self) -> AppResult<()>;
}

#[async_trait]
pub trait NetworkStore: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn NetworkTx>>;
}
