//! Tolerancias espaciales de la red
//!
//! Todas las distancias están en metros.

use std::time::Duration;

use anyhow::Result;

use super::environment::env_or;

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Distancia máxima de un waypoint al nodo vial más cercano
    pub max_snap_distance_m: f64,
    /// Buffer de la red caminera para validar recorridos
    pub network_buffer_m: f64,
    /// Buffer de paradas para los extremos de un recorrido
    pub stop_buffer_m: f64,
    /// Distancia máxima parada-recorrido para habilitar una asociación
    pub association_max_distance_m: f64,
    /// Distancia de una parada a un extremo para asociarla automáticamente
    pub auto_association_distance_m: f64,
    /// Distancia máxima de una parada nueva a la red caminera
    pub stop_network_buffer_m: f64,
    pub route_sample_interval_m: f64,
    pub route_validation_timeout: Duration,
    pub permissive_fallback: bool,
    pub routing_directed: bool,
    /// Asociaciones válidas necesarias para que una línea esté habilitada
    pub line_min_valid_associations: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_snap_distance_m: 100.0,
            network_buffer_m: 40.0,
            stop_buffer_m: 50.0,
            association_max_distance_m: 100.0,
            auto_association_distance_m: 50.0,
            stop_network_buffer_m: 100.0,
            route_sample_interval_m: 100.0,
            route_validation_timeout: Duration::from_millis(3000),
            permissive_fallback: true,
            routing_directed: false,
            line_min_valid_associations: 2,
        }
    }
}

impl NetworkConfig {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            max_snap_distance_m: env_or("ROUTE_MAX_SNAP_DISTANCE_M", d.max_snap_distance_m)?,
            network_buffer_m: env_or("NETWORK_BUFFER_M", d.network_buffer_m)?,
            stop_buffer_m: env_or("STOP_BUFFER_M", d.stop_buffer_m)?,
            association_max_distance_m: env_or("ASSOCIATION_MAX_DISTANCE_M", d.association_max_distance_m)?,
            auto_association_distance_m: env_or("AUTO_ASSOCIATION_DISTANCE_M", d.auto_association_distance_m)?,
            stop_network_buffer_m: env_or("STOP_NETWORK_BUFFER_M", d.stop_network_buffer_m)?,
            route_sample_interval_m: env_or("ROUTE_SAMPLE_INTERVAL_M", d.route_sample_interval_m)?,
            route_validation_timeout: Duration::from_millis(env_or("ROUTE_VALIDATION_TIMEOUT_MS", 3000u64)?),
            permissive_fallback: env_or("ROUTE_PERMISSIVE_FALLBACK", d.permissive_fallback)?,
            routing_directed: env_or("ROUTING_DIRECTED", d.routing_directed)?,
            line_min_valid_associations: env_or("LINE_MIN_VALID_ASSOCIATIONS", d.line_min_valid_associations)?,
        })
    }
}
