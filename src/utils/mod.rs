//! Utilidades del sistema
//!
//! Manejo de errores y utilidades geográficas (GeoJSON, distancias en metros).

pub mod errors;
pub mod geo;
