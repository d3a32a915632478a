//! Services module
//!
//! Lógica de negocio de la red: cálculo y validación de recorridos, motor de
//! consistencia de asociaciones y ciclo de vida de líneas y paradas. Los
//! servicios reciben sus dependencias por constructor.

pub mod association_engine;
pub mod association_service;
pub mod line_lifecycle;
pub mod line_query_service;
pub mod route_calculator;
pub mod route_validator;
pub mod stop_service;

pub use association_engine::AssociationConsistencyEngine;
pub use association_service::{AssociationDetail, AssociationService, LineStop};
pub use line_lifecycle::{CreateLine, LineChanges, LineLifecycleManager, LineOutcome};
pub use line_query_service::LineQueryService;
pub use route_calculator::{ComputedRoute, RouteCalculator};
pub use route_validator::{RouteValidation, RouteValidator, ValidationStrategy};
pub use stop_service::StopService;
