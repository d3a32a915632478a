//! Modelos del sistema
//!
//! Entidades de la red de transporte: paradas, líneas, asociaciones y horarios.
//! Las relaciones se expresan por id; nunca se mantienen referencias vivas
//! entre entidades fuera de una transacción.

pub mod association;
pub mod geometry;
pub mod line;
pub mod stop;

pub use association::{Association, Schedule};
pub use geometry::RouteGeometry;
pub use line::{Line, NewLine};
pub use stop::{NewStop, Stop, StopChanges};
