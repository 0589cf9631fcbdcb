use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TideKind {
    High,
    Low,
}

impl TideKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TideKind::High => "Alta",
            TideKind::Low => "Baixa",
        }
    }

    /// Accepts the labels seen in remote tide tables.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "alta" | "high" | "preamar" | "h" | "hw" => Some(TideKind::High),
            "baixa" | "low" | "baixamar" | "l" | "lw" => Some(TideKind::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for TideKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TideEvent {
    pub timestamp: DateTime<FixedOffset>,
    pub kind: TideKind,
    pub height_m: f64,
    /// 0.0-1.0, reflects which tier produced the event
    pub confidence: f64,
    pub source: String,
}

/// One day of tide events for a location, as produced by a single tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TideReport {
    pub location: String,
    pub date: NaiveDate,
    pub events: Vec<TideEvent>,
    pub source: String,
    pub note: Option<String>,
}

impl TideReport {
    pub const EVENTS_PER_DAY: usize = 4;

    /// Events at or after `at`, up to `window_hours` ahead.
    pub fn upcoming(&self, at: DateTime<FixedOffset>, window_hours: i64) -> Vec<&TideEvent> {
        let cutoff = at + chrono::Duration::hours(window_hours);
        self.events
            .iter()
            .filter(|e| e.timestamp >= at && e.timestamp <= cutoff)
            .collect()
    }

    /// A usable day: exactly four events on `date`, strictly ordered by time,
    /// with at least one high and one low.
    pub fn is_complete(&self) -> bool {
        self.events.len() == Self::EVENTS_PER_DAY
            && self.events.iter().any(|e| e.kind == TideKind::High)
            && self.events.iter().any(|e| e.kind == TideKind::Low)
            && self.events.iter().all(|e| e.timestamp.date_naive() == self.date)
            && self
                .events
                .windows(2)
                .all(|w| w[0].timestamp < w[1].timestamp)
    }

    pub fn min_confidence(&self) -> f64 {
        self.events
            .iter()
            .map(|e| e.confidence)
            .fold(1.0_f64, f64::min)
    }
}

/// Coarse tide stage by hour of day, used for forecast cards.
///
/// Fixed six-hour cycle: high, ebbing, low, flooding, repeated twice a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TideStage {
    High,
    Ebbing,
    Low,
    Flooding,
}

impl TideStage {
    pub fn for_hour(hour: u32) -> Self {
        match hour % 12 {
            0..=2 => TideStage::High,
            3..=5 => TideStage::Ebbing,
            6..=8 => TideStage::Low,
            _ => TideStage::Flooding,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TideStage::High => "Alta",
            TideStage::Ebbing => "Vazando",
            TideStage::Low => "Baixa",
            TideStage::Flooding => "Enchendo",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            TideStage::High => "📈",
            TideStage::Ebbing => "↘",
            TideStage::Low => "📉",
            TideStage::Flooding => "↗",
        }
    }
}

impl std::fmt::Display for TideStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
