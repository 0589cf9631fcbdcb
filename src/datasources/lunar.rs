use crate::models::{LunarPhase, LunarPhaseResult};
use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Mean synodic month in days.
pub const SYNODIC_MONTH_DAYS: f64 = 29.53058867;

/// Given a date, the moon's phase and its fishing sub-score.
pub trait LunarPhaseProvider: Send + Sync {
    fn phase(&self, date: NaiveDate) -> LunarPhaseResult;
}

/// Moon age from the elapsed time since a known new moon.
///
/// Accurate to within a day or so, which is enough for phase names.
#[derive(Debug, Clone)]
pub struct SynodicLunarCalculator {
    reference_new_moon: NaiveDateTime,
}

impl Default for SynodicLunarCalculator {
    fn default() -> Self {
        // 2000-01-06 18:14
        let reference_new_moon = NaiveDate::from_ymd_opt(2000, 1, 6)
            .and_then(|d| d.and_hms_opt(18, 14, 0))
            .unwrap_or_default();
        Self { reference_new_moon }
    }
}

impl SynodicLunarCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moon age in days at a local instant, in [0, cycle).
    pub fn age_at(&self, at: NaiveDateTime) -> f64 {
        let elapsed = at - self.reference_new_moon;
        let days = elapsed.num_seconds() as f64 / 86_400.0;
        days.rem_euclid(SYNODIC_MONTH_DAYS)
    }

    pub fn phase_at(&self, at: NaiveDateTime) -> LunarPhaseResult {
        let age_days = self.age_at(at);
        let cycle_percentage = age_days / SYNODIC_MONTH_DAYS * 100.0;
        let phase = LunarPhase::from_cycle_percentage(cycle_percentage);
        let illumination =
            (1.0 - (2.0 * std::f64::consts::PI * age_days / SYNODIC_MONTH_DAYS).cos()) / 2.0;

        LunarPhaseResult {
            date: at.date(),
            phase,
            illumination,
            fishing_score: phase.fishing_score(),
            age_days,
            cycle_percentage,
        }
    }

    /// One entry per day starting at `start`.
    pub fn forecast(&self, start: NaiveDate, days: u32) -> Vec<LunarPhaseResult> {
        (0..days)
            .map(|i| self.phase(start + Duration::days(i as i64)))
            .collect()
    }

    /// Date of the next full moon on or after `from`, and whole days until it.
    pub fn next_full_moon(&self, from: NaiveDate) -> (NaiveDate, i64) {
        let age = self.age_at(noon(from));
        let days = (SYNODIC_MONTH_DAYS / 2.0 - age).rem_euclid(SYNODIC_MONTH_DAYS);
        let whole = days.round() as i64;
        (from + Duration::days(whole), whole)
    }
}

impl LunarPhaseProvider for SynodicLunarCalculator {
    fn phase(&self, date: NaiveDate) -> LunarPhaseResult {
        self.phase_at(noon(date))
    }
}

fn noon(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(12, 0, 0).unwrap_or_default()
}
