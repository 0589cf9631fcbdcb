use crate::error::{PescaError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(PescaError::InvalidRequest(format!(
                "coordinates out of range: {}, {}",
                latitude, longitude
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Great-circle distance (haversine).
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.latitude.to_radians().cos()
                * other.latitude.to_radians().cos()
                * (d_lon / 2.0).sin().powi(2);
        EARTH_RADIUS_KM * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
    }

    /// Stable cache key component.
    pub fn cache_key(&self) -> String {
        format!("{:.4}_{:.4}", self.latitude, self.longitude)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeachKind {
    #[default]
    Sand,
    Rocky,
    Mixed,
    Estuary,
}

impl BeachKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BeachKind::Sand => "Areia",
            BeachKind::Rocky => "Costão rochoso",
            BeachKind::Mixed => "Mista",
            BeachKind::Estuary => "Estuário",
        }
    }
}

impl std::fmt::Display for BeachKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inclusive closure period, compared as YYYYMMDD integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosurePeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

fn date_key(date: NaiveDate) -> u32 {
    date.year() as u32 * 10_000 + date.month() * 100 + date.day()
}

impl ClosurePeriod {
    pub fn contains(&self, date: NaiveDate) -> bool {
        let d = date_key(date);
        d >= date_key(self.start) && d <= date_key(self.end)
    }

    /// Parses "2024-01-01 a 2024-01-31" (also accepts " to " and " - ").
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = [" a ", " to ", " - "]
            .iter()
            .find_map(|sep| {
                let p: Vec<&str> = s.split(sep).collect();
                (p.len() == 2).then_some(p)
            })
            .ok_or_else(|| PescaError::InvalidData(format!("unrecognised period '{}'", s)))?;

        let parse_date = |raw: &str| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|e| PescaError::InvalidData(format!("bad date '{}': {}", raw.trim(), e)))
        };

        let start = parse_date(parts[0])?;
        let end = parse_date(parts[1])?;
        if end < start {
            return Err(PescaError::InvalidData(format!(
                "period ends before it starts: '{}'",
                s
            )));
        }
        Ok(Self { start, end })
    }
}

impl std::fmt::Display for ClosurePeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} a {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

impl Serialize for ClosurePeriod {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ClosurePeriod {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        let value = String::deserialize(deserializer)?;
        ClosurePeriod::parse(&value).map_err(|e| D::Error::custom(e.to_string()))
    }
}

/// A defeso entry. Without a period it is an unconditional restriction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalClosure {
    pub species: String,
    #[serde(default)]
    pub period: Option<ClosurePeriod>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestrictionRuleSet {
    #[serde(default)]
    pub seasonal_closures: Vec<SeasonalClosure>,
    #[serde(default)]
    pub restricted_hours: bool,
    #[serde(default)]
    pub prohibited_area: Option<String>,
    #[serde(default)]
    pub license_required: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Technique {
    pub name: String,
    /// Reported success rate, percent
    pub effectiveness_pct: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub rod: String,
    pub line: String,
}

/// Local angling advice published with a beach.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FishingGuide {
    #[serde(default)]
    pub techniques: Vec<Technique>,
    #[serde(default)]
    pub baits: Vec<String>,
    #[serde(default)]
    pub equipment: Option<Equipment>,
    #[serde(default)]
    pub best_hours: Vec<String>,
}

impl FishingGuide {
    pub fn is_empty(&self) -> bool {
        self.techniques.is_empty()
            && self.baits.is_empty()
            && self.equipment.is_none()
            && self.best_hours.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Beach {
    pub coordinates: Coordinates,
    #[serde(default)]
    pub kind: BeachKind,
    #[serde(default)]
    pub characteristics: Vec<String>,
    #[serde(default)]
    pub restrictions: Option<RestrictionRuleSet>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub verified: Option<bool>,
    #[serde(default)]
    pub fishing: Option<FishingGuide>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct City {
    #[serde(default)]
    pub beaches: BTreeMap<String, Beach>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    #[serde(default)]
    pub cities: BTreeMap<String, City>,
}

/// A beach resolved from the database, with its path.
#[derive(Debug, Clone)]
pub struct BeachRef<'a> {
    pub region: &'a str,
    pub city: &'a str,
    pub name: &'a str,
    pub beach: &'a Beach,
}

impl BeachRef<'_> {
    /// Location name in the "City-UF" form used by the tide registry.
    pub fn location_name(&self) -> String {
        format!("{}-{}", self.city, self.region)
    }

    pub fn label(&self) -> String {
        format!("{}, {} - {}", self.name, self.city, self.region)
    }
}

/// Region → city → beach, keyed by region code ("ES").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeachDatabase {
    #[serde(default)]
    pub regions: BTreeMap<String, Region>,
}

impl BeachDatabase {
    pub fn beach(&self, region: &str, city: &str, name: &str) -> Result<BeachRef<'_>> {
        let (region_code, region_data) = self
            .regions
            .get_key_value(region)
            .ok_or_else(|| PescaError::NotFound(format!("Região \"{}\" não encontrada", region)))?;

        let (city_name, city_data) = region_data.cities.get_key_value(city).ok_or_else(|| {
            PescaError::NotFound(format!(
                "Cidade \"{}\" não encontrada em {}",
                city, region_code
            ))
        })?;

        let (beach_name, beach) = city_data.beaches.get_key_value(name).ok_or_else(|| {
            PescaError::NotFound(format!(
                "Praia \"{}\" não encontrada em {}",
                name, city_name
            ))
        })?;

        Ok(BeachRef {
            region: region_code,
            city: city_name,
            name: beach_name,
            beach,
        })
    }

    pub fn beaches_in_region(&self, region: &str) -> Result<Vec<BeachRef<'_>>> {
        let (region_code, region_data) = self
            .regions
            .get_key_value(region)
            .ok_or_else(|| PescaError::NotFound(format!("Região \"{}\" não encontrada", region)))?;

        Ok(region_data
            .cities
            .iter()
            .flat_map(|(city_name, city)| {
                city.beaches.iter().map(move |(beach_name, beach)| BeachRef {
                    region: region_code,
                    city: city_name,
                    name: beach_name,
                    beach,
                })
            })
            .collect())
    }

    pub fn all_beaches(&self) -> Vec<BeachRef<'_>> {
        self.regions
            .keys()
            .filter_map(|code| self.beaches_in_region(code).ok())
            .flatten()
            .collect()
    }

    /// Case- and accent-insensitive match on beach or city name.
    pub fn search(&self, query: &str) -> Vec<BeachRef<'_>> {
        let needle = fold(query.trim());
        if needle.is_empty() {
            return Vec::new();
        }
        self.all_beaches()
            .into_iter()
            .filter(|b| fold(b.name).contains(&needle) || fold(b.city).contains(&needle))
            .collect()
    }
}

fn fold(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}
