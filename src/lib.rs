//! Motor de consistencia y ruteo de la red de líneas y paradas
//!
//! Calcula recorridos sobre la red caminera, los valida contra los buffers
//! de red y de paradas, y mantiene consistentes los estados de líneas,
//! paradas y asociaciones dentro de cada transacción.

pub mod config;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod spatial;
pub mod state;
pub mod utils;

pub use state::AppState;
