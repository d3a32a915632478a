//! Validación de recorridos propuestos
//!
//! Dos chequeos independientes:
//! - buffer de red: el recorrido se muestrea cada `route_sample_interval_m`
//!   y todas las muestras deben quedar dentro de `network_buffer_m` de la red
//!   caminera. Si la consulta por lotes no puede ejecutarse (error o timeout)
//!   se recurre a cinco puntos clave y, como último recurso y solo si está
//!   habilitado, a una mayoría de tres puntos con el buffer duplicado.
//! - extremos: el inicio y el fin deben tener alguna parada dentro de
//!   `stop_buffer_m`.

use std::sync::Arc;
use std::time::Duration;

use geo::{MultiLineString, Point};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::NetworkConfig;
use crate::models::RouteGeometry;
use crate::repositories::NetworkTx;
use crate::spatial::SpatialQueryGateway;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::geo::{interpolate, route_length_m};

const KEY_POINT_FRACTIONS: [f64; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];
const PERMISSIVE_FRACTIONS: [f64; 3] = [0.0, 0.5, 1.0];
const MIN_SAMPLE_STEP: f64 = 0.01;

/// Estrategia que decidió el chequeo de buffer de red
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStrategy {
    Sampled,
    KeyPoints,
    Permissive,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteValidation {
    pub network_ok: bool,
    pub strategy: ValidationStrategy,
    pub samples: usize,
    pub start_near_stop: bool,
    pub end_near_stop: bool,
    pub failures: Vec<String>,
}

impl RouteValidation {
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    /// Convierte el informe en un rechazo tipado cuando algún chequeo falló
    pub fn into_result(self) -> AppResult<Self> {
        if self.is_valid() {
            return Ok(self);
        }
        let reason = self.failures.join("; ");
        if self.network_ok {
            Err(AppError::RouteEndpointsNotNearStops(reason))
        } else {
            Err(AppError::RouteOutsideNetworkBuffer(reason))
        }
    }
}

struct NetworkCheck {
    ok: bool,
    strategy: ValidationStrategy,
    samples: usize,
}

pub struct RouteValidator {
    gateway: Arc<dyn SpatialQueryGateway>,
    network_buffer_m: f64,
    stop_buffer_m: f64,
    sample_interval_m: f64,
    timeout: Duration,
    permissive_fallback: bool,
}

impl RouteValidator {
    pub fn new(gateway: Arc<dyn SpatialQueryGateway>, config: &NetworkConfig) -> Self {
        Self {
            gateway,
            network_buffer_m: config.network_buffer_m,
            stop_buffer_m: config.stop_buffer_m,
            sample_interval_m: config.route_sample_interval_m,
            timeout: config.route_validation_timeout,
            permissive_fallback: config.permissive_fallback,
        }
    }

    /// Ejecuta ambos chequeos y devuelve el informe completo
    pub async fn validate(&self, tx: &mut dyn NetworkTx, route: &RouteGeometry) -> AppResult<RouteValidation> {
        let (start, end) = match (route.start(), route.end()) {
            (Some(start), Some(end)) => (start, end),
            _ => return Err(AppError::InvalidGeometry("route geometry is empty".to_string())),
        };
        let multi = route.to_multi();

        let network = self.check_network(&multi).await?;
        let start_near_stop = !tx.stops_within(start, self.stop_buffer_m).await?.is_empty();
        let end_near_stop = !tx.stops_within(end, self.stop_buffer_m).await?.is_empty();

        let mut failures = Vec::new();
        if !network.ok {
            failures.push(format!(
                "route leaves the {} m road network buffer ({:?} check)",
                self.network_buffer_m, network.strategy
            ));
        }
        match (start_near_stop, end_near_stop) {
            (false, false) => failures.push(format!(
                "neither the start nor the end of the route is within {} m of a stop",
                self.stop_buffer_m
            )),
            (false, true) => failures.push(format!(
                "the start of the route is not within {} m of a stop",
                self.stop_buffer_m
            )),
            (true, false) => failures.push(format!(
                "the end of the route is not within {} m of a stop",
                self.stop_buffer_m
            )),
            (true, true) => {}
        }

        if !failures.is_empty() {
            warn!(?failures, "route validation failed");
        }

        Ok(RouteValidation {
            network_ok: network.ok,
            strategy: network.strategy,
            samples: network.samples,
            start_near_stop,
            end_near_stop,
            failures,
        })
    }

    /// Igual que `validate` pero devuelve el rechazo como error
    pub async fn ensure_valid(&self, tx: &mut dyn NetworkTx, route: &RouteGeometry) -> AppResult<RouteValidation> {
        self.validate(tx, route).await?.into_result()
    }

    /// Un rechazo del chequeo por lotes es definitivo. Si ninguna consulta de
    /// respaldo pudo responder se devuelve el último error del gateway.
    async fn check_network(&self, route: &MultiLineString<f64>) -> AppResult<NetworkCheck> {
        let samples = sample_points(route, self.sample_interval_m);
        let batched = tokio::time::timeout(
            self.timeout,
            self.gateway.points_within_network(&samples, self.network_buffer_m),
        )
        .await;

        match batched {
            Ok(Ok(ok)) => {
                debug!(samples = samples.len(), ok, "sampled network check");
                return Ok(NetworkCheck {
                    ok,
                    strategy: ValidationStrategy::Sampled,
                    samples: samples.len(),
                });
            }
            Ok(Err(e)) => warn!(error = %e, "sampled network check failed, falling back to key points"),
            Err(_) => warn!(timeout_ms = self.timeout.as_millis() as u64, "sampled network check timed out, falling back to key points"),
        }

        let key_points = fractions_to_points(route, &KEY_POINT_FRACTIONS);
        if self.count_within(&key_points, self.network_buffer_m).await? == key_points.len() {
            return Ok(NetworkCheck {
                ok: true,
                strategy: ValidationStrategy::KeyPoints,
                samples: key_points.len(),
            });
        }

        if !self.permissive_fallback {
            return Ok(NetworkCheck {
                ok: false,
                strategy: ValidationStrategy::KeyPoints,
                samples: key_points.len(),
            });
        }

        let majority = fractions_to_points(route, &PERMISSIVE_FRACTIONS);
        let within = self.count_within(&majority, self.network_buffer_m * 2.0).await?;
        warn!(within, of = majority.len(), "permissive network check used");
        Ok(NetworkCheck {
            ok: within >= 2,
            strategy: ValidationStrategy::Permissive,
            samples: majority.len(),
        })
    }

    /// Puntos dentro del buffer. Una consulta fallida cuenta como fuera, salvo
    /// que fallen todas: entonces el gateway no está disponible.
    async fn count_within(&self, points: &[Point<f64>], meters: f64) -> AppResult<usize> {
        let mut within = 0;
        let mut last_error = None;
        let mut answered = 0;
        for point in points {
            match self.gateway.distance_to_network(*point).await {
                Ok(distance) => {
                    answered += 1;
                    if distance.is_some_and(|d| d <= meters) {
                        within += 1;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "key point distance query failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if answered == 0 => Err(e),
            _ => Ok(within),
        }
    }
}

/// Muestras cada `interval_m` metros, con un paso mínimo del 1% del recorrido.
/// Siempre incluye el inicio y el fin.
pub fn sample_points(route: &MultiLineString<f64>, interval_m: f64) -> Vec<Point<f64>> {
    let length = route_length_m(route);
    if length <= 0.0 {
        return interpolate(route, 0.0).into_iter().collect();
    }

    let step = (interval_m / length).max(MIN_SAMPLE_STEP);
    let count = (1.0 / step).ceil() as usize;
    let mut fractions: Vec<f64> = (0..count).map(|i| i as f64 * step).filter(|f| *f < 1.0).collect();
    fractions.push(1.0);
    fractions_to_points(route, &fractions)
}

fn fractions_to_points(route: &MultiLineString<f64>, fractions: &[f64]) -> Vec<Point<f64>> {
    fractions.iter().filter_map(|f| interpolate(route, *f)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::LineString;

    fn straight_route(length_deg: f64) -> MultiLineString<f64> {
        MultiLineString::new(vec![LineString::from(vec![(-56.0, -34.9), (-56.0 - length_deg, -34.9)])])
    }

    #[test]
    fn long_routes_are_capped_at_a_hundred_and_one_samples() {
        // ~91 km
        let samples = sample_points(&straight_route(1.0), 100.0);
        assert_eq!(samples.len(), 101);
        assert_eq!(samples.first(), Some(&Point::new(-56.0, -34.9)));
        assert_eq!(samples.last(), Some(&Point::new(-57.0, -34.9)));
    }

    #[test]
    fn short_routes_get_start_and_end() {
        // ~46 m, menos que un intervalo
        let samples = sample_points(&straight_route(0.0005), 100.0);
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn sample_spacing_follows_the_interval() {
        // ~912 m -> paso de ~11%, diez muestras más el fin
        let samples = sample_points(&straight_route(0.01), 100.0);
        assert_eq!(samples.len(), 11);
    }

    #[test]
    fn endpoint_failures_map_to_the_endpoint_error() {
        let report = RouteValidation {
            network_ok: true,
            strategy: ValidationStrategy::Sampled,
            samples: 2,
            start_near_stop: true,
            end_near_stop: false,
            failures: vec!["the end of the route is not within 50 m of a stop".to_string()],
        };
        match report.into_result() {
            Err(AppError::RouteEndpointsNotNearStops(msg)) => assert!(msg.contains("end")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
