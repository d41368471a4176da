use std::collections::HashMap;

use super::clearance::RouteLeg;

/// Boundary to the airport taxiway graph.
pub trait TaxiRouteProvider: Send {
    /// Taxiways from a parking spot to a runway, or `None` if unknown.
    fn route(&self, parking_id: &str, runway: &str) -> Option<Vec<RouteLeg>>;
}

/// Fixed table of routes, keyed case-insensitively.
#[derive(Clone, Debug, Default)]
pub struct StaticRoutes {
    routes: HashMap<(String, String), Vec<RouteLeg>>,
}

impl StaticRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, parking_id: &str, runway: &str, legs: Vec<RouteLeg>) -> Self {
        self.insert(parking_id, runway, legs);
        self
    }

    pub fn insert(&mut self, parking_id: &str, runway: &str, legs: Vec<RouteLeg>) {
        self.routes.insert(key(parking_id, runway), legs);
    }
}

fn key(parking_id: &str, runway: &str) -> (String, String) {
    (parking_id.to_ascii_lowercase(), runway.to_ascii_lowercase())
}

impl TaxiRouteProvider for StaticRoutes {
    fn route(&self, parking_id: &str, runway: &str) -> Option<Vec<RouteLeg>> {
        self.routes.get(&key(parking_id, runway)).cloned()
    }
}
