//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum. Los servicios se construyen una sola vez a
//! partir del almacén y del gateway espacial elegidos al arrancar.

use std::sync::Arc;

use crate::config::NetworkConfig;
use crate::repositories::NetworkStore;
use crate::services::{
    AssociationConsistencyEngine, AssociationService, LineLifecycleManager, LineQueryService, RouteCalculator,
    RouteValidator, StopService,
};
use crate::spatial::SpatialQueryGateway;

#[derive(Clone)]
pub struct AppState {
    pub network: NetworkConfig,
    pub store: Arc<dyn NetworkStore>,
    pub calculator: Arc<RouteCalculator>,
    pub validator: Arc<RouteValidator>,
    pub lines: Arc<LineLifecycleManager>,
    pub line_queries: Arc<LineQueryService>,
    pub stops: Arc<StopService>,
    pub associations: Arc<AssociationService>,
}

impl AppState {
    pub fn new(network: NetworkConfig, store: Arc<dyn NetworkStore>, gateway: Arc<dyn SpatialQueryGateway>) -> Self {
        let calculator = Arc::new(RouteCalculator::new(gateway.clone(), &network));
        let validator = Arc::new(RouteValidator::new(gateway.clone(), &network));
        let engine = Arc::new(AssociationConsistencyEngine::new(gateway.clone(), &network));

        let lines = Arc::new(LineLifecycleManager::new(
            store.clone(),
            gateway.clone(),
            calculator.clone(),
            engine.clone(),
            &network,
        ));
        let line_queries = Arc::new(LineQueryService::new(store.clone(), gateway.clone()));
        let stops = Arc::new(StopService::new(store.clone(), gateway, engine.clone(), &network));
        let associations = Arc::new(AssociationService::new(store.clone(), engine));

        Self {
            network,
            store,
            calculator,
            validator,
            lines,
            line_queries,
            stops,
            associations,
        }
    }
}
