//! Geometría de recorridos
//!
//! Resultado de fusionar los tramos de la red vial: una línea continua o, cuando
//! la fusión no logra unirlos, una multilínea que se expone tal cual.

use geo::{Coord, LineString, MultiLineString, Point};

/// Geometría de un recorrido en SRID 4326
#[derive(Debug, Clone, PartialEq)]
pub enum RouteGeometry {
    Line(LineString<f64>),
    MultiLine(MultiLineString<f64>),
}

impl RouteGeometry {
    /// Construye la geometría más simple posible a partir de una multilínea
    pub fn from_multi(multi: MultiLineString<f64>) -> Self {
        if multi.0.len() == 1 {
            let mut lines = multi.0;
            RouteGeometry::Line(lines.remove(0))
        } else {
            RouteGeometry::MultiLine(multi)
        }
    }

    pub fn is_continuous(&self) -> bool {
        matches!(self, RouteGeometry::Line(_))
    }

    pub fn is_empty(&self) -> bool {
        self.coords().next().is_none()
    }

    pub fn to_multi(&self) -> MultiLineString<f64> {
        match self {
            RouteGeometry::Line(line) => MultiLineString::new(vec![line.clone()]),
            RouteGeometry::MultiLine(multi) => multi.clone(),
        }
    }

    pub fn coords(&self) -> Box<dyn Iterator<Item = &Coord<f64>> + '_> {
        match self {
            RouteGeometry::Line(line) => Box::new(line.coords()),
            RouteGeometry::MultiLine(multi) => Box::new(multi.0.iter().flat_map(|l| l.coords())),
        }
    }

    /// Primer punto del recorrido
    pub fn start(&self) -> Option<Point<f64>> {
        self.coords().next().map(|c| Point::from(*c))
    }

    /// Último punto del recorrido
    pub fn end(&self) -> Option<Point<f64>> {
        self.coords().last().map(|c| Point::from(*c))
    }

    pub fn to_geometry(&self) -> geo::Geometry<f64> {
        match self {
            RouteGeometry::Line(line) => geo::Geometry::LineString(line.clone()),
            RouteGeometry::MultiLine(multi) => geo::Geometry::MultiLineString(multi.clone()),
        }
    }
}

impl From<LineString<f64>> for RouteGeometry {
    fn from(line: LineString<f64>) -> Self {
        RouteGeometry::Line(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_part_multiline_collapses_to_line() {
        let line = LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]);
        let geometry = RouteGeometry::from_multi(MultiLineString::new(vec![line.clone()]));
        assert_eq!(geometry, RouteGeometry::Line(line));
        assert!(geometry.is_continuous());
    }

    #[test]
    fn endpoints_span_every_part() {
        let geometry = RouteGeometry::from_multi(MultiLineString::new(vec![
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0)]),
            LineString::from(vec![(2.0, 0.0), (3.0, 1.0)]),
        ]));
        assert!(!geometry.is_continuous());
        assert_eq!(geometry.start(), Some(Point::new(0.0, 0.0)));
        assert_eq!(geometry.end(), Some(Point::new(3.0, 1.0)));
    }
}
