use super::Coordinates;
use crate::error::{PescaError, Result};
use serde::{Deserialize, Serialize};

/// A named tide reference point ("Vitória-ES").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub coordinates: Coordinates,
    /// Mean high-water height used by the local tide model
    pub mean_tide_height_m: f64,
    #[serde(default)]
    pub marinha_code: Option<String>,
    #[serde(default)]
    pub inph_code: Option<String>,
}

impl Location {
    pub const DEFAULT_MEAN_TIDE_HEIGHT_M: f64 = 1.2;

    fn new(
        name: &str,
        latitude: f64,
        longitude: f64,
        mean_tide_height_m: f64,
        marinha_code: Option<&str>,
        inph_code: Option<&str>,
    ) -> Self {
        Self {
            name: name.to_string(),
            coordinates: Coordinates {
                latitude,
                longitude,
            },
            mean_tide_height_m,
            marinha_code: marinha_code.map(String::from),
            inph_code: inph_code.map(String::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRegistry {
    locations: Vec<Location>,
}

impl LocationRegistry {
    pub fn new(locations: Vec<Location>) -> Self {
        Self { locations }
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Exact name match, ignoring case.
    pub fn find(&self, name: &str) -> Option<&Location> {
        let wanted = name.trim().to_lowercase();
        self.locations
            .iter()
            .find(|l| l.name.to_lowercase() == wanted)
    }

    pub fn require(&self, name: &str) -> Result<&Location> {
        self.find(name).ok_or_else(|| {
            PescaError::InvalidRequest(format!("Local \"{}\" não cadastrado", name))
        })
    }

    /// Closest registered location by great-circle distance.
    pub fn nearest(&self, point: &Coordinates) -> Option<(&Location, f64)> {
        self.locations
            .iter()
            .map(|l| (l, l.coordinates.distance_km(point)))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }
}

impl Default for LocationRegistry {
    fn default() -> Self {
        Self::new(vec![
            Location::new("Vitória-ES", -20.3155, -40.3128, 1.2, Some("ES-001"), Some("49009")),
            Location::new("Vila Velha-ES", -20.3397, -40.2944, 1.3, Some("ES-002"), Some("49010")),
            Location::new("Serra-ES", -20.1286, -40.3078, 1.1, Some("ES-001"), Some("49011")),
            Location::new("Guarapari-ES", -20.6589, -40.5095, 1.2, Some("ES-003"), None),
            Location::new("Anchieta-ES", -20.8058, -40.6425, 1.2, None, None),
        ])
    }
}
