//! Gateway PostGIS/pgRouting
//!
//! Consultas sobre las capas de referencia `ft_caminera_nacional` (grafo vial),
//! `ft_departamentos` y `ft_postes`. Las geometrías viajan como texto GeoJSON y los
//! buffers se calculan en SRID 3857.

use async_trait::async_trait;
use geo::{Coord, LineString, Point};
use sqlx::PgPool;
use tracing::debug;

use super::{NodeId, RoadEdge, SpatialQueryGateway};
use crate::models::RouteGeometry;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::geo::{parse_polygon_geojson, parse_route_geojson, to_geojson_string};

/// Aristas para pgRouting, con costo en metros
const EDGES_SQL: &str = "SELECT gid AS id, source, target, \
     ST_Length(geom::geography) AS cost, ST_Length(geom::geography) AS reverse_cost \
     FROM ft_caminera_nacional";

pub struct PostgisGateway {
    pool: PgPool,
}

impl PostgisGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EdgeRow {
    id: i64,
    geojson: String,
}

impl EdgeRow {
    fn into_edge(self) -> AppResult<RoadEdge> {
        let parts = parse_route_geojson(&self.geojson)?;
        let coords: Vec<Coord<f64>> = parts.0.into_iter().flat_map(|l| l.0).collect();
        Ok(RoadEdge {
            id: self.id,
            geometry: LineString::new(coords),
        })
    }
}

#[async_trait]
impl SpatialQueryGateway for PostgisGateway {
    async fn nearest_node(&self, point: Point<f64>) -> AppResult<Option<NodeId>> {
        let node = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT source::bigint
            FROM ft_caminera_nacional
            ORDER BY geom <-> ST_SetSRID(ST_MakePoint($1, $2), 4326)
            LIMIT 1
            "#,
        )
        .bind(point.x())
        .bind(point.y())
        .fetch_optional(&self.pool)
        .await?;

        Ok(node)
    }

    async fn distance_to_network(&self, point: Point<f64>) -> AppResult<Option<f64>> {
        let distance = sqlx::query_scalar::<_, f64>(
            r#"
            SELECT ST_Distance(geom::geography, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography)::float8
            FROM ft_caminera_nacional
            ORDER BY geom <-> ST_SetSRID(ST_MakePoint($1, $2), 4326)
            LIMIT 1
            "#,
        )
        .bind(point.x())
        .bind(point.y())
        .fetch_optional(&self.pool)
        .await?;

        Ok(distance)
    }

    async fn shortest_path(&self, nodes: &[NodeId], directed: bool) -> AppResult<Vec<RoadEdge>> {
        let rows = match nodes {
            [] | [_] => return Ok(Vec::new()),
            [start, end] => {
                sqlx::query_as::<_, EdgeRow>(
                    r#"
                    SELECT e.gid::bigint AS id, ST_AsGeoJSON(ST_LineMerge(e.geom)) AS geojson
                    FROM pgr_dijkstra($1, $2::bigint, $3::bigint, $4) AS r
                    JOIN ft_caminera_nacional e ON e.gid = r.edge
                    ORDER BY r.seq
                    "#,
                )
                .bind(EDGES_SQL)
                .bind(*start)
                .bind(*end)
                .bind(directed)
                .fetch_all(&self.pool)
                .await?
            }
            via => {
                sqlx::query_as::<_, EdgeRow>(
                    r#"
                    SELECT e.gid::bigint AS id, ST_AsGeoJSON(ST_LineMerge(e.geom)) AS geojson
                    FROM pgr_dijkstraVia($1, $2::bigint[], $3) AS r
                    JOIN ft_caminera_nacional e ON e.gid = r.edge
                    ORDER BY r.seq
                    "#,
                )
                .bind(EDGES_SQL)
                .bind(via.to_vec())
                .bind(directed)
                .fetch_all(&self.pool)
                .await?
            }
        };

        debug!(nodes = nodes.len(), edges = rows.len(), "shortest path resolved");
        rows.into_iter().map(EdgeRow::into_edge).collect()
    }

    async fn merge_geometry(&self, edges: &[RoadEdge]) -> AppResult<RouteGeometry> {
        let parts: Vec<String> = edges
            .iter()
            .map(|e| to_geojson_string(&geo::Geometry::LineString(e.geometry.clone())))
            .collect();

        let merged = sqlx::query_scalar::<_, Option<String>>(
            r#"
            SELECT ST_AsGeoJSON(ST_LineMerge(ST_Collect(ST_SetSRID(ST_GeomFromGeoJSON(g), 4326))))
            FROM unnest($1::text[]) AS g
            "#,
        )
        .bind(parts)
        .fetch_one(&self.pool)
        .await?
        .ok_or_else(|| AppError::RouteGeometryMergeFailed("merge produced no geometry".to_string()))?;

        let multi = parse_route_geojson(&merged)
            .map_err(|e| AppError::RouteGeometryMergeFailed(e.to_string()))?;
        Ok(RouteGeometry::from_multi(multi))
    }

    async fn within_distance(
        &self,
        a: &geo::Geometry<f64>,
        b: &geo::Geometry<f64>,
        meters: f64,
    ) -> AppResult<bool> {
        let within = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT ST_DWithin(
                ST_Transform(ST_SetSRID(ST_GeomFromGeoJSON($1), 4326), 3857),
                ST_Transform(ST_SetSRID(ST_GeomFromGeoJSON($2), 4326), 3857),
                $3
            )
            "#,
        )
        .bind(to_geojson_string(a))
        .bind(to_geojson_string(b))
        .bind(meters)
        .fetch_one(&self.pool)
        .await?;

        Ok(within)
    }

    async fn containing_region(&self, point: Point<f64>) -> AppResult<Option<String>> {
        let region = sqlx::query_scalar::<_, String>(
            r#"
            SELECT nombre::text
            FROM ft_departamentos
            WHERE ST_Contains(geom, ST_SetSRID(ST_MakePoint($1, $2), 4326))
            LIMIT 1
            "#,
        )
        .bind(point.x())
        .bind(point.y())
        .fetch_optional(&self.pool)
        .await?;

        Ok(region)
    }

    async fn kilometre_post(&self, road: i32, km: i32) -> AppResult<Option<Point<f64>>> {
        let post = sqlx::query_as::<_, (f64, f64)>(
            r#"
            SELECT ST_X(geom)::float8, ST_Y(geom)::float8
            FROM ft_postes
            WHERE ruta = $1 AND km = $2
            LIMIT 1
            "#,
        )
        .bind(road)
        .bind(km)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post.map(|(lon, lat)| Point::new(lon, lat)))
    }

    async fn intersects(&self, geometry: &geo::Geometry<f64>, polygon_geojson: &str) -> AppResult<bool> {
        parse_polygon_geojson(polygon_geojson)?;

        let intersects = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT ST_Intersects(
                ST_SetSRID(ST_GeomFromGeoJSON($1), 4326),
                ST_SetSRID(ST_GeomFromGeoJSON($2), 4326)
            )
            "#,
        )
        .bind(to_geojson_string(geometry))
        .bind(polygon_geojson)
        .fetch_one(&self.pool)
        .await?;

        Ok(intersects)
    }

    async fn points_within_network(&self, points: &[Point<f64>], meters: f64) -> AppResult<bool> {
        let xs: Vec<f64> = points.iter().map(|p| p.x()).collect();
        let ys: Vec<f64> = points.iter().map(|p| p.y()).collect();

        let all_within = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT COALESCE(bool_and(EXISTS (
                SELECT 1
                FROM ft_caminera_nacional c
                WHERE ST_DWithin(ST_Transform(c.geom, 3857), ST_Transform(p.geom, 3857), $3)
            )), TRUE)
            FROM (
                SELECT ST_SetSRID(ST_MakePoint(x, y), 4326) AS geom
                FROM unnest($1::float8[], $2::float8[]) AS t(x, y)
            ) p
            "#,
        )
        .bind(xs)
        .bind(ys)
        .bind(meters)
        .fetch_one(&self.pool)
        .await?;

        Ok(all_within)
    }
}
