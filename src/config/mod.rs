//! Configuración del proyecto
//!
//! Este módulo contiene la configuración de base de datos, variables de entorno
//! y tolerancias espaciales de la red.

pub mod database;
pub mod environment;
pub mod network;

pub use environment::*;
pub use network::NetworkConfig;
