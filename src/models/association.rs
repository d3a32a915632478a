//! Modelos de Association (parada-línea) y Schedule (horario)

use chrono::NaiveTime;
use uuid::Uuid;

/// Vínculo habilitable entre una parada y una línea
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub id: Uuid,
    pub stop_id: Uuid,
    pub line_id: Uuid,
    pub enabled: bool,
}

/// Horario de paso de una línea por una parada
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub id: Uuid,
    pub association_id: Uuid,
    pub time: NaiveTime,
}
