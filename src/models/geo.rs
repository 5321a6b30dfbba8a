//! Static area-code to coordinates lookup.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One `[[geo]]` entry of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoPoint {
    pub code: u32,
    pub latitude: f64,
    pub longitude: f64,
}

/// Area code lookup table.
#[derive(Debug, Clone, Default)]
pub struct GeoTable {
    points: HashMap<u32, (f64, f64)>,
}

impl GeoTable {
    pub fn new(points: &[GeoPoint]) -> Self {
        Self {
            points: points
                .iter()
                .map(|p| (p.code, (p.latitude, p.longitude)))
                .collect(),
        }
    }

    /// Latitude and longitude for an area code.
    pub fn lat_long(&self, code: u32) -> Option<(f64, f64)> {
        self.points.get(&code).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let table = GeoTable::new(&[GeoPoint {
            code: 28001,
            latitude: 40.42,
            longitude: -3.68,
        }]);
        assert_eq!(table.lat_long(28001), Some((40.42, -3.68)));
        assert_eq!(table.lat_long(8001), None);
    }
}
