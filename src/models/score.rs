use super::{FishingGuide, LunarPhaseResult, TideReport, WeatherSnapshot};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

pub const MAX_SCORE: f64 = 10.0;

/// One factor's sub-score with its explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorScore {
    /// 0-10
    pub score: f64,
    pub narrative: Vec<String>,
    /// Only populated by the restriction factor
    pub penalties: Vec<String>,
}

impl FactorScore {
    pub fn new(score: f64) -> Self {
        Self {
            score: score.clamp(0.0, MAX_SCORE),
            narrative: Vec::new(),
            penalties: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.narrative.push(note.into());
        self
    }

    pub fn with_penalty(mut self, penalty: impl Into<String>) -> Self {
        self.penalties.push(penalty.into());
        self
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.narrative.push(note.into());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorBreakdown {
    pub tide: FactorScore,
    pub weather: FactorScore,
    pub site: FactorScore,
    pub restrictions: FactorScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProbabilityBucket {
    Low,
    Medium,
    High,
}

impl ProbabilityBucket {
    pub fn from_score(score: f64) -> Self {
        if score >= 7.0 {
            ProbabilityBucket::High
        } else if score >= 5.0 {
            ProbabilityBucket::Medium
        } else {
            ProbabilityBucket::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbabilityBucket::Low => "Baixa",
            ProbabilityBucket::Medium => "Média",
            ProbabilityBucket::High => "Alta",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ProbabilityBucket::Low => "🔴",
            ProbabilityBucket::Medium => "🟡",
            ProbabilityBucket::High => "🟢",
        }
    }
}

impl std::fmt::Display for ProbabilityBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregated fishing probability for one site at one instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbabilityResult {
    pub site: String,
    pub evaluated_at: DateTime<FixedOffset>,
    /// round(clamp(raw_weighted_sum, 0, 10))
    pub final_score: u8,
    pub raw_weighted_sum: f64,
    pub bucket: ProbabilityBucket,
    pub breakdown: FactorBreakdown,
    pub narrative: Vec<String>,
    pub lunar: LunarPhaseResult,
    pub weather: WeatherSnapshot,
    pub tides: TideReport,
    /// Present when the site is a catalogued beach with advice
    pub fishing: Option<FishingGuide>,
}

impl ProbabilityResult {
    /// All restriction penalties, for display.
    pub fn penalties(&self) -> &[String] {
        &self.breakdown.restrictions.penalties
    }

    /// Next tide event at or after the evaluation time.
    pub fn next_tide(&self) -> Option<&super::TideEvent> {
        self.tides
            .events
            .iter()
            .find(|e| e.timestamp >= self.evaluated_at)
    }
}
