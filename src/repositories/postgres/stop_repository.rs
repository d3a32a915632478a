use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geo::Point;
use uuid::Uuid;

use super::PgNetworkTx;
use crate::models::{NewStop, Stop};
use crate::repositories::StopRepository;
use crate::utils::errors::AppResult;

const STOP_COLUMNS: &str =
    "id, name, ST_X(location) AS lon, ST_Y(location) AS lat, enabled, shelter, note, created_at";

#[derive(Debug, sqlx::FromRow)]
struct StopRow {
    id: Uuid,
    name: String,
    lon: f64,
    lat: f64,
    enabled: bool,
    shelter: bool,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<StopRow> for Stop {
    fn from(row: StopRow) -> Self {
        Stop {
            id: row.id,
            name: row.name,
            location: Point::new(row.lon, row.lat),
            enabled: row.enabled,
            shelter: row.shelter,
            note: row.note,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl StopRepository for PgNetworkTx {
    async fn find_stop(&mut self, id: Uuid) -> AppResult<Option<Stop>> {
        let row = sqlx::query_as::<_, StopRow>(&format!("SELECT {STOP_COLUMNS} FROM stops WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;

        Ok(row.map(Stop::from))
    }

    async fn list_stops(&mut self) -> AppResult<Vec<Stop>> {
        let rows = sqlx::query_as::<_, StopRow>(&format!("SELECT {STOP_COLUMNS} FROM stops ORDER BY name, id"))
            .fetch_all(self.conn()?)
            .await?;

        Ok(rows.into_iter().map(Stop::from).collect())
    }

    async fn insert_stop(&mut self, stop: NewStop) -> AppResult<Stop> {
        let row = sqlx::query_as::<_, StopRow>(&format!(
            r#"
            INSERT INTO stops (id, name, location, enabled, shelter, note, created_at)
            VALUES ($1, $2, ST_SetSRID(ST_MakePoint($3, $4), 4326), FALSE, $5, $6, $7)
            RETURNING {STOP_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(stop.name)
        .bind(stop.location.x())
        .bind(stop.location.y())
        .bind(stop.shelter)
        .bind(stop.note)
        .bind(Utc::now())
        .fetch_one(self.conn()?)
        .await?;

        Ok(row.into())
    }

    async fn update_stop(&mut self, stop: &Stop) -> AppResult<Stop> {
        let row = sqlx::query_as::<_, StopRow>(&format!(
            r#"
            UPDATE stops
            SET name = $2, location = ST_SetSRID(ST_MakePoint($3, $4), 4326), shelter = $5, note = $6
            WHERE id = $1
            RETURNING {STOP_COLUMNS}
            "#
        ))
        .bind(stop.id)
        .bind(&stop.name)
        .bind(stop.location.x())
        .bind(stop.location.y())
        .bind(stop.shelter)
        .bind(&stop.note)
        .fetch_one(self.conn()?)
        .await?;

        Ok(row.into())
    }

    async fn set_stop_enabled(&mut self, id: Uuid, enabled: bool) -> AppResult<()> {
        sqlx::query("UPDATE stops SET enabled = $2 WHERE id = $1")
            .bind(id)
            .bind(enabled)
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn delete_stop(&mut self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM stops WHERE id = $1")
            .bind(id)
            .execute(self.conn()?)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn stops_within(&mut self, point: Point<f64>, meters: f64) -> AppResult<Vec<Stop>> {
        let rows = sqlx::query_as::<_, StopRow>(&format!(
            r#"
            SELECT {STOP_COLUMNS}
            FROM stops
            WHERE ST_DWithin(
                ST_Transform(location, 3857),
                ST_Transform(ST_SetSRID(ST_MakePoint($1, $2), 4326), 3857),
                $3
            )
            ORDER BY location <-> ST_SetSRID(ST_MakePoint($1, $2), 4326)
            "#
        ))
        .bind(point.x())
        .bind(point.y())
        .bind(meters)
        .fetch_all(self.conn()?)
        .await?;

        Ok(rows.into_iter().map(Stop::from).collect())
    }

    async fn lock_stops(&mut self, ids: &[Uuid]) -> AppResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        sqlx::query("SELECT id FROM stops WHERE id = ANY($1) ORDER BY id FOR NO KEY UPDATE")
            .bind(ids.to_vec())
            .execute(self.conn()?)
            .await?;
        Ok(())
    }
}
