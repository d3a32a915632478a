//! Utilidades geográficas
//!
//! Conversión GeoJSON/WKT en el borde de la API y cálculo de distancias en
//! metros sobre coordenadas SRID 4326: haversine para longitudes y un plano
//! tangente local para proyecciones sobre líneas.

use geo::{
    Closest, ClosestPoint, Coord, Distance, Euclidean, Haversine, Intersects, Length, LineInterpolatePoint,
    LineLocatePoint, LineString, MapCoords, MultiLineString, MultiPolygon, Point,
};
use geojson::GeoJson;
use wkt::ToWkt;

use crate::utils::errors::{AppError, AppResult};

/// Radio medio terrestre, el mismo que usa `geo::Haversine`
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

pub fn point(lon: f64, lat: f64) -> Point<f64> {
    Point::new(lon, lat)
}

/// Valida que unas coordenadas sean lon/lat WGS84
pub fn validate_lon_lat(lon: f64, lat: f64) -> AppResult<Point<f64>> {
    if !lon.is_finite() || !lat.is_finite() || !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return Err(AppError::InvalidGeometry(format!(
            "({}, {}) is not a valid lon/lat pair",
            lon, lat
        )));
    }
    Ok(Point::new(lon, lat))
}

fn parse_geometry(raw: &str) -> AppResult<geo::Geometry<f64>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(AppError::InvalidGeometry("GeoJSON must not be empty or null".to_string()));
    }

    let geojson: GeoJson = trimmed
        .parse()
        .map_err(|e| AppError::InvalidGeometry(format!("malformed GeoJSON: {}", e)))?;

    let geometry = match geojson {
        GeoJson::Geometry(geometry) => geometry,
        GeoJson::Feature(feature) => feature
            .geometry
            .ok_or_else(|| AppError::InvalidGeometry("feature has no geometry".to_string()))?,
        GeoJson::FeatureCollection(_) => {
            return Err(AppError::InvalidGeometry(
                "expected a single geometry, got a FeatureCollection".to_string(),
            ))
        }
    };

    geo::Geometry::<f64>::try_from(geometry.value)
        .map_err(|e| AppError::InvalidGeometry(format!("unsupported GeoJSON geometry: {}", e)))
}

/// Parsea un recorrido GeoJSON (LineString o MultiLineString)
pub fn parse_route_geojson(raw: &str) -> AppResult<MultiLineString<f64>> {
    let multi = match parse_geometry(raw)? {
        geo::Geometry::LineString(line) => MultiLineString::new(vec![line]),
        geo::Geometry::MultiLineString(multi) => multi,
        other => {
            return Err(AppError::InvalidGeometry(format!(
                "route must be a LineString or MultiLineString, got {}",
                geometry_kind(&other)
            )))
        }
    };

    let usable = multi.0.iter().any(|line| line.0.len() >= 2);
    if !usable {
        return Err(AppError::InvalidGeometry("route has no segment with two points".to_string()));
    }
    Ok(multi)
}

/// Parsea un polígono GeoJSON (Polygon o MultiPolygon)
pub fn parse_polygon_geojson(raw: &str) -> AppResult<MultiPolygon<f64>> {
    match parse_geometry(raw)? {
        geo::Geometry::Polygon(polygon) => Ok(MultiPolygon::new(vec![polygon])),
        geo::Geometry::MultiPolygon(multi) => Ok(multi),
        other => Err(AppError::InvalidGeometry(format!(
            "expected a Polygon or MultiPolygon, got {}",
            geometry_kind(&other)
        ))),
    }
}

/// Parsea una lista de puntos GeoJSON (Point o MultiPoint)
pub fn parse_points_geojson(raw: &str) -> AppResult<Vec<Point<f64>>> {
    match parse_geometry(raw)? {
        geo::Geometry::Point(p) => Ok(vec![p]),
        geo::Geometry::MultiPoint(multi) => Ok(multi.0),
        other => Err(AppError::InvalidGeometry(format!(
            "expected a Point or MultiPoint, got {}",
            geometry_kind(&other)
        ))),
    }
}

pub fn points_to_geojson(points: &[Point<f64>]) -> String {
    to_geojson_string(&geo::Geometry::MultiPoint(geo::MultiPoint::new(points.to_vec())))
}

fn geometry_kind(geometry: &geo::Geometry<f64>) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        _ => "Geometry",
    }
}

pub fn to_geojson_string(geometry: &geo::Geometry<f64>) -> String {
    geojson::Geometry::new(geojson::Value::from(geometry)).to_string()
}

pub fn multi_line_to_geojson(route: &MultiLineString<f64>) -> String {
    to_geojson_string(&geo::Geometry::MultiLineString(route.clone()))
}

/// Representación WKT de un recorrido, solo para depuración
pub fn multi_line_to_wkt(route: &MultiLineString<f64>) -> String {
    route.wkt_string()
}

pub fn haversine_m(a: Point<f64>, b: Point<f64>) -> f64 {
    Haversine.distance(a, b)
}

/// Plano tangente local (equirectangular) en metros alrededor de un origen.
/// Suficiente para las distancias de una red urbana o departamental.
#[derive(Debug, Clone, Copy)]
pub struct LocalTangentPlane {
    origin: Coord<f64>,
    cos_lat0: f64,
}

impl LocalTangentPlane {
    pub fn new(origin: Coord<f64>) -> Self {
        Self {
            origin,
            cos_lat0: origin.y.to_radians().cos(),
        }
    }

    pub fn project(&self, c: Coord<f64>) -> Coord<f64> {
        Coord {
            x: EARTH_RADIUS_M * self.cos_lat0 * (c.x - self.origin.x).to_radians(),
            y: EARTH_RADIUS_M * (c.y - self.origin.y).to_radians(),
        }
    }

    pub fn unproject(&self, c: Coord<f64>) -> Coord<f64> {
        Coord {
            x: self.origin.x + (c.x / (EARTH_RADIUS_M * self.cos_lat0)).to_degrees(),
            y: self.origin.y + (c.y / EARTH_RADIUS_M).to_degrees(),
        }
    }

    pub fn project_line(&self, line: &LineString<f64>) -> LineString<f64> {
        line.map_coords(|c| self.project(c))
    }
}

fn closest_distance(line: &LineString<f64>, p: Point<f64>) -> Option<f64> {
    match line.closest_point(&p) {
        Closest::Intersection(q) | Closest::SinglePoint(q) => Some(Euclidean.distance(p, q)),
        Closest::Indeterminate => None,
    }
}

pub fn point_to_line_m(p: Point<f64>, line: &LineString<f64>) -> f64 {
    match line.0.as_slice() {
        [] => f64::INFINITY,
        [only] => haversine_m(p, Point::from(*only)),
        _ => {
            let plane = LocalTangentPlane::new(p.0);
            closest_distance(&plane.project_line(line), Point::new(0.0, 0.0)).unwrap_or(f64::INFINITY)
        }
    }
}

pub fn point_to_lines_m(p: Point<f64>, lines: &MultiLineString<f64>) -> f64 {
    lines
        .0
        .iter()
        .map(|line| point_to_line_m(p, line))
        .fold(f64::INFINITY, f64::min)
}

fn lines_to_lines_m(a: &MultiLineString<f64>, b: &MultiLineString<f64>) -> f64 {
    let crosses = a.0.iter().flat_map(|l| l.lines()).any(|sa| {
        b.0.iter().flat_map(|l| l.lines()).any(|sb| sa.intersects(&sb))
    });
    if crosses {
        return 0.0;
    }
    let a_to_b = a
        .0
        .iter()
        .flat_map(|l| l.coords())
        .map(|c| point_to_lines_m(Point::from(*c), b))
        .fold(f64::INFINITY, f64::min);
    let b_to_a = b
        .0
        .iter()
        .flat_map(|l| l.coords())
        .map(|c| point_to_lines_m(Point::from(*c), a))
        .fold(f64::INFINITY, f64::min);
    a_to_b.min(b_to_a)
}

enum Shape {
    Points(Vec<Point<f64>>),
    Lines(MultiLineString<f64>),
}

fn shape_of(geometry: &geo::Geometry<f64>) -> AppResult<Shape> {
    match geometry {
        geo::Geometry::Point(p) => Ok(Shape::Points(vec![*p])),
        geo::Geometry::MultiPoint(mp) => Ok(Shape::Points(mp.0.clone())),
        geo::Geometry::LineString(l) => Ok(Shape::Lines(MultiLineString::new(vec![l.clone()]))),
        geo::Geometry::MultiLineString(m) => Ok(Shape::Lines(m.clone())),
        other => Err(AppError::InvalidGeometry(format!(
            "distance not supported for {}",
            geometry_kind(other)
        ))),
    }
}

/// Distancia mínima en metros entre puntos y/o líneas
pub fn geometry_distance_m(a: &geo::Geometry<f64>, b: &geo::Geometry<f64>) -> AppResult<f64> {
    let distance = match (shape_of(a)?, shape_of(b)?) {
        (Shape::Points(pa), Shape::Points(pb)) => pa
            .iter()
            .flat_map(|x| pb.iter().map(move |y| haversine_m(*x, *y)))
            .fold(f64::INFINITY, f64::min),
        (Shape::Points(points), Shape::Lines(lines)) | (Shape::Lines(lines), Shape::Points(points)) => points
            .iter()
            .map(|p| point_to_lines_m(*p, &lines))
            .fold(f64::INFINITY, f64::min),
        (Shape::Lines(la), Shape::Lines(lb)) => lines_to_lines_m(&la, &lb),
    };
    Ok(distance)
}

/// Longitud del recorrido en metros
pub fn route_length_m(route: &MultiLineString<f64>) -> f64 {
    route.0.iter().map(|line| Haversine.length(line)).sum()
}

/// Recorrido proyectado al plano local de su primer vértice, con la longitud
/// de cada parte. Los saltos entre partes de una multilínea no suman longitud.
struct PlanarRoute {
    plane: LocalTangentPlane,
    parts: Vec<(LineString<f64>, f64)>,
    total: f64,
}

impl PlanarRoute {
    fn new(route: &MultiLineString<f64>) -> Option<Self> {
        let origin = route.0.iter().flat_map(|l| l.coords()).next()?;
        let plane = LocalTangentPlane::new(*origin);
        let parts: Vec<(LineString<f64>, f64)> = route
            .0
            .iter()
            .filter(|l| l.0.len() >= 2)
            .map(|l| {
                let projected = plane.project_line(l);
                let length = Euclidean.length(&projected);
                (projected, length)
            })
            .collect();
        let total = parts.iter().map(|(_, length)| length).sum();
        Some(Self { plane, parts, total })
    }
}

/// Punto a la fracción `fraction` (0..=1) de la longitud del recorrido
pub fn interpolate(route: &MultiLineString<f64>, fraction: f64) -> Option<Point<f64>> {
    let mut coords = route.0.iter().flat_map(|l| l.coords());
    let first = *coords.next()?;
    let last = coords.last().copied().unwrap_or(first);
    let fraction = fraction.clamp(0.0, 1.0);
    if fraction == 0.0 {
        return Some(Point::from(first));
    }
    if fraction == 1.0 {
        return Some(Point::from(last));
    }

    let planar = PlanarRoute::new(route)?;
    if planar.total == 0.0 {
        return Some(Point::from(first));
    }

    let target = planar.total * fraction;
    let mut walked = 0.0;
    for (part, length) in &planar.parts {
        if *length > 0.0 && walked + length >= target {
            let local = part.line_interpolate_point((target - walked) / length)?;
            return Some(Point::from(planar.plane.unproject(local.0)));
        }
        walked += length;
    }
    Some(Point::from(last))
}

/// Fracción (0..=1) del recorrido en la que cae el punto más cercano a `p`
pub fn locate_fraction(route: &MultiLineString<f64>, p: Point<f64>) -> f64 {
    let Some(planar) = PlanarRoute::new(route) else {
        return 0.0;
    };
    if planar.total == 0.0 {
        return 0.0;
    }

    let target = Point::from(planar.plane.project(p.0));
    let mut walked = 0.0;
    let mut best = (f64::INFINITY, 0.0);
    for (part, length) in &planar.parts {
        if let (Some(distance), Some(along)) = (closest_distance(part, target), part.line_locate_point(&target)) {
            if distance < best.0 {
                best = (distance, walked + along * length);
            }
        }
        walked += length;
    }
    best.1 / planar.total
}
