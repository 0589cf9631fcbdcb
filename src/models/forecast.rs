use super::{CompassDirection, LunarPhase, PressureCategory, ProbabilityBucket, TideStage, WindCategory};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One projected day of fishing conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    /// 0 is the baseline day
    pub offset_days: u32,
    pub score: f64,
    pub bucket: ProbabilityBucket,
    pub pressure_hpa: f64,
    pub pressure_category: PressureCategory,
    pub wind_speed_ms: f64,
    pub wind_category: WindCategory,
    pub wind_direction: CompassDirection,
    pub tide_stage: TideStage,
    pub lunar_phase: LunarPhase,
}

impl ForecastDay {
    pub fn is_baseline(&self) -> bool {
        self.offset_days == 0
    }

    pub fn label(&self) -> String {
        match self.offset_days {
            0 => "Hoje".to_string(),
            1 => "Amanhã".to_string(),
            _ => self.date.format("%d/%m").to_string(),
        }
    }
}

/// Multi-day projection for a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub site: String,
    pub days: Vec<ForecastDay>,
}

impl Forecast {
    /// Best projected day, ties resolved towards the earliest.
    pub fn best_day(&self) -> Option<&ForecastDay> {
        self.days.iter().fold(None, |best: Option<&ForecastDay>, day| match best {
            Some(b) if b.score >= day.score => Some(b),
            _ => Some(day),
        })
    }
}
