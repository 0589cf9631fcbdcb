use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The eight canonical moon phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LunarPhase {
    New,
    WaxingCrescent,
    FirstQuarter,
    WaxingGibbous,
    Full,
    WaningGibbous,
    LastQuarter,
    WaningCrescent,
}

impl LunarPhase {
    #[cfg(test)]
    pub const CYCLE: [LunarPhase; 8] = [
        LunarPhase::New,
        LunarPhase::WaxingCrescent,
        LunarPhase::FirstQuarter,
        LunarPhase::WaxingGibbous,
        LunarPhase::Full,
        LunarPhase::WaningGibbous,
        LunarPhase::LastQuarter,
        LunarPhase::WaningCrescent,
    ];

    /// Phase from position in the synodic cycle, in percent (0-100).
    pub fn from_cycle_percentage(pct: f64) -> Self {
        if !(1.5..=98.5).contains(&pct) {
            LunarPhase::New
        } else if pct < 23.5 {
            LunarPhase::WaxingCrescent
        } else if pct < 26.5 {
            LunarPhase::FirstQuarter
        } else if pct < 48.5 {
            LunarPhase::WaxingGibbous
        } else if pct < 51.5 {
            LunarPhase::Full
        } else if pct < 73.5 {
            LunarPhase::WaningGibbous
        } else if pct < 76.5 {
            LunarPhase::LastQuarter
        } else {
            LunarPhase::WaningCrescent
        }
    }

    /// Fishing suitability, 0-10. New and full moons rate highest.
    pub fn fishing_score(&self) -> f64 {
        match self {
            LunarPhase::New | LunarPhase::Full => 9.0,
            LunarPhase::WaxingCrescent | LunarPhase::WaxingGibbous => 7.0,
            LunarPhase::FirstQuarter | LunarPhase::WaningGibbous => 6.0,
            LunarPhase::LastQuarter | LunarPhase::WaningCrescent => 4.0,
        }
    }

    /// Spring tides (larger range) around new and full moon.
    pub fn is_spring_tide(&self) -> bool {
        matches!(self, LunarPhase::New | LunarPhase::Full)
    }

    /// Neap tides (smaller range) at the quarters.
    pub fn is_neap_tide(&self) -> bool {
        matches!(self, LunarPhase::FirstQuarter | LunarPhase::LastQuarter)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LunarPhase::New => "Nova",
            LunarPhase::WaxingCrescent => "Crescente",
            LunarPhase::FirstQuarter => "Quarto Crescente",
            LunarPhase::WaxingGibbous => "Crescente Gibosa",
            LunarPhase::Full => "Cheia",
            LunarPhase::WaningGibbous => "Minguante Gibosa",
            LunarPhase::LastQuarter => "Quarto Minguante",
            LunarPhase::WaningCrescent => "Minguante",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            LunarPhase::New => "🌑",
            LunarPhase::WaxingCrescent => "🌒",
            LunarPhase::FirstQuarter => "🌓",
            LunarPhase::WaxingGibbous => "🌔",
            LunarPhase::Full => "🌕",
            LunarPhase::WaningGibbous => "🌖",
            LunarPhase::LastQuarter => "🌗",
            LunarPhase::WaningCrescent => "🌘",
        }
    }
}

impl std::fmt::Display for LunarPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LunarPhaseResult {
    pub date: NaiveDate,
    pub phase: LunarPhase,
    /// Illuminated fraction, 0-1
    pub illumination: f64,
    pub fishing_score: f64,
    pub age_days: f64,
    /// Position in the synodic cycle, 0-100
    pub cycle_percentage: f64,
}
