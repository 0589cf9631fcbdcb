use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 8-point compass direction for wind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompassDirection {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl CompassDirection {
    pub const ALL: [CompassDirection; 8] = [
        CompassDirection::N,
        CompassDirection::NE,
        CompassDirection::E,
        CompassDirection::SE,
        CompassDirection::S,
        CompassDirection::SW,
        CompassDirection::W,
        CompassDirection::NW,
    ];

    pub fn from_degrees(degrees: f64) -> Self {
        let index = (degrees.rem_euclid(360.0) / 45.0).round() as usize % 8;
        Self::ALL[index]
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|d| d == self).unwrap_or(0)
    }

    /// Rotate clockwise (positive) or counter-clockwise (negative) by whole steps.
    pub fn rotate(&self, steps: i32) -> Self {
        let i = (self.index() as i32 + steps).rem_euclid(8) as usize;
        Self::ALL[i]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompassDirection::N => "N",
            CompassDirection::NE => "NE",
            CompassDirection::E => "E",
            CompassDirection::SE => "SE",
            CompassDirection::S => "S",
            CompassDirection::SW => "SW",
            CompassDirection::W => "W",
            CompassDirection::NW => "NW",
        }
    }
}

impl std::fmt::Display for CompassDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperature_c: f64,
    pub pressure_hpa: f64,
    pub wind_speed_ms: f64,
    pub wind_direction: CompassDirection,
    pub humidity_pct: f64,
    pub condition_text: String,
    pub raining: bool,
    pub city: Option<String>,
    pub source_label: String,
    pub fetched_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    pub const FALLBACK_SOURCE: &'static str = "fallback";

    /// Fixed snapshot used whenever the weather source cannot answer.
    pub fn fallback(fetched_at: DateTime<Utc>) -> Self {
        Self {
            temperature_c: 28.0,
            pressure_hpa: 1018.0,
            wind_speed_ms: 15.0,
            wind_direction: CompassDirection::NE,
            humidity_pct: 70.0,
            condition_text: "sem dados".into(),
            raining: false,
            city: None,
            source_label: Self::FALLBACK_SOURCE.into(),
            fetched_at,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source_label == Self::FALLBACK_SOURCE
    }

    pub fn conditions(&self) -> SkyConditions {
        SkyConditions::from_text(&self.condition_text, self.raining)
    }
}

/// Keyword reading of the free-text condition (Portuguese or English).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkyConditions {
    pub raining: bool,
    pub overcast: bool,
    pub sunny: bool,
    pub partly_cloudy: bool,
}

impl SkyConditions {
    pub fn from_text(text: &str, raining_flag: bool) -> Self {
        let t = text.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| t.contains(w));

        let partly_cloudy = has(&["parcialmente", "partly", "nuvens dispersas", "algumas nuvens"]);
        let raining = raining_flag || has(&["chuva", "rain", "shower", "garoa", "drizzle"]);
        // "parcialmente nublado" also reads as overcast; both terms apply
        let overcast = has(&["nublado", "cloudy", "overcast", "encoberto"]);
        let sunny = has(&["sol", "clear", "sunny", "céu limpo", "limpo"]);

        Self {
            raining,
            overcast,
            sunny,
            partly_cloudy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PressureCategory {
    High,
    Stable,
    Low,
}

impl PressureCategory {
    pub fn classify(pressure_hpa: f64) -> Self {
        if pressure_hpa > 1020.0 {
            PressureCategory::High
        } else if pressure_hpa < 1000.0 {
            PressureCategory::Low
        } else {
            PressureCategory::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PressureCategory::High => "Alta",
            PressureCategory::Stable => "Estável",
            PressureCategory::Low => "Baixa",
        }
    }
}

impl std::fmt::Display for PressureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindCategory {
    Calm,
    Light,
    Moderate,
    Strong,
    VeryStrong,
}

impl WindCategory {
    pub fn classify(speed_ms: f64) -> Self {
        if speed_ms < 3.0 {
            WindCategory::Calm
        } else if speed_ms < 6.0 {
            WindCategory::Light
        } else if speed_ms < 10.0 {
            WindCategory::Moderate
        } else if speed_ms < 15.0 {
            WindCategory::Strong
        } else {
            WindCategory::VeryStrong
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WindCategory::Calm => "Calmo",
            WindCategory::Light => "Fraco",
            WindCategory::Moderate => "Moderado",
            WindCategory::Strong => "Forte",
            WindCategory::VeryStrong => "Muito Forte",
        }
    }
}

impl std::fmt::Display for WindCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
