use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use geo::{MultiPolygon, Point};
use uuid::Uuid;

use super::PgNetworkTx;
use crate::models::{Line, NewLine};
use crate::repositories::LineRepository;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::geo::{
    multi_line_to_geojson, parse_points_geojson, parse_route_geojson, points_to_geojson, to_geojson_string,
};

const LINE_COLUMNS: &str = "l.id, l.description, l.company, l.origin, l.destination, l.note, \
     ST_AsGeoJSON(l.waypoints) AS waypoints, ST_AsGeoJSON(l.route) AS route, l.enabled, l.created_at";

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    id: Uuid,
    description: String,
    company: String,
    origin: Option<String>,
    destination: Option<String>,
    note: Option<String>,
    waypoints: Option<String>,
    route: Option<String>,
    enabled: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<LineRow> for Line {
    type Error = AppError;

    fn try_from(row: LineRow) -> Result<Self, Self::Error> {
        let waypoints = match row.waypoints.as_deref() {
            Some(raw) => parse_points_geojson(raw)?,
            None => Vec::new(),
        };
        let route = row.route.as_deref().map(parse_route_geojson).transpose()?;

        Ok(Line {
            id: row.id,
            description: row.description,
            company: row.company,
            origin: row.origin,
            destination: row.destination,
            note: row.note,
            waypoints,
            route,
            enabled: row.enabled,
            created_at: row.created_at,
        })
    }
}

fn into_lines(rows: Vec<LineRow>) -> AppResult<Vec<Line>> {
    rows.into_iter().map(Line::try_from).collect()
}

fn waypoints_param(line_waypoints: &[Point<f64>]) -> Option<String> {
    (!line_waypoints.is_empty()).then(|| points_to_geojson(line_waypoints))
}

impl PgNetworkTx {
    async fn register_company(&mut self, company: &str) -> AppResult<()> {
        sqlx::query("INSERT INTO companies (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(company)
            .execute(self.conn()?)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl LineRepository for PgNetworkTx {
    async fn find_line(&mut self, id: Uuid) -> AppResult<Option<Line>> {
        let row = sqlx::query_as::<_, LineRow>(&format!("SELECT {LINE_COLUMNS} FROM lines l WHERE l.id = $1"))
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;

        row.map(Line::try_from).transpose()
    }

    async fn list_lines(&mut self) -> AppResult<Vec<Line>> {
        let rows = sqlx::query_as::<_, LineRow>(&format!(
            "SELECT {LINE_COLUMNS} FROM lines l ORDER BY l.description, l.id"
        ))
        .fetch_all(self.conn()?)
        .await?;

        into_lines(rows)
    }

    async fn insert_line(&mut self, line: NewLine) -> AppResult<Line> {
        self.register_company(&line.company).await?;
        let row = sqlx::query_as::<_, LineRow>(&format!(
            r#"
            WITH l AS (
                INSERT INTO lines (id, description, company, origin, destination, note, waypoints, route, enabled, created_at)
                VALUES (
                    $1, $2, $3, $4, $5, $6,
                    ST_SetSRID(ST_GeomFromGeoJSON($7), 4326),
                    ST_Multi(ST_SetSRID(ST_GeomFromGeoJSON($8), 4326)),
                    FALSE, $9
                )
                RETURNING *
            )
            SELECT {LINE_COLUMNS} FROM l
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(line.description)
        .bind(line.company)
        .bind(line.origin)
        .bind(line.destination)
        .bind(line.note)
        .bind(waypoints_param(&line.waypoints))
        .bind(multi_line_to_geojson(&line.route))
        .bind(Utc::now())
        .fetch_one(self.conn()?)
        .await?;

        row.try_into()
    }

    async fn update_line(&mut self, line: &Line) -> AppResult<Line> {
        self.register_company(&line.company).await?;
        let row = sqlx::query_as::<_, LineRow>(&format!(
            r#"
            WITH l AS (
                UPDATE lines
                SET description = $2, company = $3, origin = $4, destination = $5, note = $6,
                    waypoints = ST_SetSRID(ST_GeomFromGeoJSON($7), 4326),
                    route = ST_Multi(ST_SetSRID(ST_GeomFromGeoJSON($8), 4326))
                WHERE id = $1
                RETURNING *
            )
            SELECT {LINE_COLUMNS} FROM l
            "#
        ))
        .bind(line.id)
        .bind(&line.description)
        .bind(&line.company)
        .bind(&line.origin)
        .bind(&line.destination)
        .bind(&line.note)
        .bind(waypoints_param(&line.waypoints))
        .bind(line.route.as_ref().map(multi_line_to_geojson))
        .fetch_one(self.conn()?)
        .await?;

        row.try_into()
    }

    async fn set_line_enabled(&mut self, id: Uuid, enabled: bool) -> AppResult<()> {
        sqlx::query("UPDATE lines SET enabled = $2 WHERE id = $1")
            .bind(id)
            .bind(enabled)
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn delete_line(&mut self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM lines WHERE id = $1")
            .bind(id)
            .execute(self.conn()?)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn lines_by_company(&mut self, company: &str) -> AppResult<Vec<Line>> {
        let rows = sqlx::query_as::<_, LineRow>(&format!(
            "SELECT {LINE_COLUMNS} FROM lines l WHERE l.company = $1 ORDER BY l.description, l.id"
        ))
        .bind(company)
        .fetch_all(self.conn()?)
        .await?;

        into_lines(rows)
    }

    async fn lines_by_origin_destination(&mut self, origin: &str, destination: &str) -> AppResult<Vec<Line>> {
        let rows = sqlx::query_as::<_, LineRow>(&format!(
            r#"
            SELECT {LINE_COLUMNS}
            FROM lines l
            WHERE l.origin = $1 AND l.destination = $2
            ORDER BY l.description, l.id
            "#
        ))
        .bind(origin)
        .bind(destination)
        .fetch_all(self.conn()?)
        .await?;

        into_lines(rows)
    }

    async fn lines_with_schedule_between(&mut self, from: NaiveTime, to: NaiveTime) -> AppResult<Vec<Line>> {
        let rows = sqlx::query_as::<_, LineRow>(&format!(
            r#"
            SELECT {LINE_COLUMNS}
            FROM lines l
            WHERE EXISTS (
                SELECT 1
                FROM stop_lines sl
                JOIN stop_line_schedules s ON s.stop_line_id = sl.id
                WHERE sl.line_id = l.id AND s.time BETWEEN $1 AND $2
            )
            ORDER BY l.description, l.id
            "#
        ))
        .bind(from)
        .bind(to)
        .fetch_all(self.conn()?)
        .await?;

        into_lines(rows)
    }

    async fn lines_by_destination(&mut self, destination: &str) -> AppResult<Vec<Line>> {
        let rows = sqlx::query_as::<_, LineRow>(&format!(
            "SELECT {LINE_COLUMNS} FROM lines l WHERE l.destination = $1 ORDER BY l.description, l.id"
        ))
        .bind(destination)
        .fetch_all(self.conn()?)
        .await?;

        into_lines(rows)
    }

    async fn lines_intersecting(&mut self, polygon: &MultiPolygon<f64>) -> AppResult<Vec<Line>> {
        let rows = sqlx::query_as::<_, LineRow>(&format!(
            r#"
            SELECT {LINE_COLUMNS}
            FROM lines l
            WHERE ST_Intersects(l.route, ST_SetSRID(ST_GeomFromGeoJSON($1), 4326))
            ORDER BY l.description, l.id
            "#
        ))
        .bind(to_geojson_string(&geo::Geometry::MultiPolygon(polygon.clone())))
        .fetch_all(self.conn()?)
        .await?;

        into_lines(rows)
    }

    async fn lines_within(&mut self, point: Point<f64>, meters: f64) -> AppResult<Vec<Line>> {
        let rows = sqlx::query_as::<_, LineRow>(&format!(
            r#"
            SELECT {LINE_COLUMNS}
            FROM lines l
            WHERE ST_DWithin(
                ST_Transform(l.route, 3857),
                ST_Transform(ST_SetSRID(ST_MakePoint($1, $2), 4326), 3857),
                $3
            )
            ORDER BY l.description, l.id
            "#
        ))
        .bind(point.x())
        .bind(point.y())
        .bind(meters)
        .fetch_all(self.conn()?)
        .await?;

        into_lines(rows)
    }

    async fn list_companies(&mut self) -> AppResult<Vec<String>> {
        let companies = sqlx::query_scalar::<_, String>("SELECT name FROM companies ORDER BY name")
            .fetch_all(self.conn()?)
            .await?;
        Ok(companies)
    }

    async fn lock_lines(&mut self, ids: &[Uuid]) -> AppResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        sqlx::query("SELECT id FROM lines WHERE id = ANY($1) ORDER BY id FOR NO KEY UPDATE")
            .bind(ids.to_vec())
            .execute(self.conn()?)
            .await?;
        Ok(())
    }
}
