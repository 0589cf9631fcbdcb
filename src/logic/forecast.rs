use crate::datasources::LunarPhaseProvider;
use crate::models::{
    CompassDirection, ForecastDay, PressureCategory, ProbabilityBucket, ProbabilityResult,
    TideStage, WindCategory, MAX_SCORE,
};
use chrono::{Duration, NaiveDate, Timelike};
use rand::Rng;
use std::sync::Arc;

/// Today's observed values that the projection starts from.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastBaseline {
    pub date: NaiveDate,
    pub hour: u32,
    pub score: f64,
    pub pressure_hpa: f64,
    pub wind_speed_ms: f64,
    pub wind_direction: CompassDirection,
}

impl ForecastBaseline {
    pub fn from_result(result: &ProbabilityResult) -> Self {
        Self {
            date: result.evaluated_at.date_naive(),
            hour: result.evaluated_at.hour(),
            score: result.final_score as f64,
            pressure_hpa: result.weather.pressure_hpa,
            wind_speed_ms: result.weather.wind_speed_ms,
            wind_direction: result.weather.wind_direction,
        }
    }
}

/// Short-range outlook made by perturbing today's values.
///
/// Not a meteorological forecast: spreads widen with distance from today and
/// the randomness comes from the caller, so a seeded RNG gives a repeatable
/// projection.
pub struct ForecastProjector {
    lunar: Arc<dyn LunarPhaseProvider>,
}

impl ForecastProjector {
    pub fn new(lunar: Arc<dyn LunarPhaseProvider>) -> Self {
        Self { lunar }
    }

    pub fn project<R: Rng + ?Sized>(
        &self,
        baseline: &ForecastBaseline,
        days: u32,
        rng: &mut R,
    ) -> Vec<ForecastDay> {
        (0..days)
            .map(|offset| self.project_day(baseline, offset, rng))
            .collect()
    }

    fn project_day<R: Rng + ?Sized>(
        &self,
        baseline: &ForecastBaseline,
        offset: u32,
        rng: &mut R,
    ) -> ForecastDay {
        let date = baseline.date + Duration::days(offset as i64);
        let tide_stage = TideStage::for_hour(baseline.hour + 6 * offset);
        let lunar_phase = self.lunar.phase(date).phase;
        // Whole hPa, so later deltas are measured from what day 0 shows
        let base_pressure = baseline.pressure_hpa.round();

        let (score, pressure_hpa, wind_speed_ms, wind_direction) = if offset == 0 {
            (
                baseline.score,
                base_pressure,
                baseline.wind_speed_ms,
                baseline.wind_direction,
            )
        } else {
            let (pressure_range, wind_spread) = if offset == 1 {
                (3.0..8.0, 0.3)
            } else {
                (5.0..12.0, 0.5)
            };

            let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            let pressure = (base_pressure + sign * rng.gen_range(pressure_range)).round();

            let factor = 1.0 + rng.gen_range(-wind_spread..=wind_spread);
            let wind = (baseline.wind_speed_ms * factor * 10.0).round() / 10.0;

            let direction = baseline.wind_direction.rotate(rng.gen_range(-1..=1));
            let score = (baseline.score + rng.gen_range(-1.0..=1.0)).clamp(0.0, MAX_SCORE);

            (score, pressure, wind.max(0.0), direction)
        };

        ForecastDay {
            date,
            offset_days: offset,
            score,
            bucket: ProbabilityBucket::from_score(score),
            pressure_hpa,
            pressure_category: PressureCategory::classify(pressure_hpa),
            wind_speed_ms,
            wind_category: WindCategory::classify(wind_speed_ms),
            wind_direction,
            tide_stage,
            lunar_phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasources::SynodicLunarCalculator;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn baseline() -> ForecastBaseline {
        ForecastBaseline {
            date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
            hour: 8,
            score: 6.0,
            pressure_hpa: 1016.0,
            wind_speed_ms: 5.0,
            wind_direction: CompassDirection::NE,
        }
    }

    fn projector() -> ForecastProjector {
        ForecastProjector::new(Arc::new(SynodicLunarCalculator::new()))
    }

    #[test]
    fn day_zero_repeats_baseline() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let days = projector().project(&baseline(), 3, &mut rng);
        let today = &days[0];

        assert_eq!(today.pressure_hpa, 1016.0);
        assert_eq!(today.wind_speed_ms, 5.0);
        assert_eq!(today.wind_direction, CompassDirection::NE);
        assert_eq!(today.bucket, ProbabilityBucket::Medium);
        assert_eq!(today.tide_stage, TideStage::Low);
    }

    #[test]
    fn perturbations_stay_within_bounds() {
        let b = baseline();
        for seed in 0..200 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let days = projector().project(&b, 4, &mut rng);

            let d1 = (days[1].pressure_hpa - b.pressure_hpa).abs();
            assert!((3.0..=8.0).contains(&d1), "day 1 pressure delta {}", d1);
            assert!(days[1].wind_speed_ms >= 3.5 - 0.05 && days[1].wind_speed_ms <= 6.5 + 0.05);

            for day in &days[2..] {
                let d = (day.pressure_hpa - b.pressure_hpa).abs();
                assert!((5.0..=12.0).contains(&d), "pressure delta {}", d);
                assert!(day.wind_speed_ms >= 2.5 - 0.05 && day.wind_speed_ms <= 7.5 + 0.05);
            }

            for day in &days[1..] {
                let steps = [-1, 0, 1].map(|s| b.wind_direction.rotate(s));
                assert!(steps.contains(&day.wind_direction));
                assert!((b.score - day.score).abs() <= 1.0 + 1e-9);
                assert!((0.0..=10.0).contains(&day.score));
            }
        }
    }

    #[test]
    fn fractional_baseline_pressure_keeps_delta_bounds() {
        let b = ForecastBaseline {
            pressure_hpa: 1016.4,
            ..baseline()
        };
        for seed in 0..50 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let days = projector().project(&b, 3, &mut rng);
            assert_eq!(days[0].pressure_hpa, 1016.0);

            let d1 = (days[1].pressure_hpa - days[0].pressure_hpa).abs();
            assert!((3.0..=8.0).contains(&d1), "day 1 pressure delta {}", d1);
            let d2 = (days[2].pressure_hpa - days[0].pressure_hpa).abs();
            assert!((5.0..=12.0).contains(&d2), "day 2 pressure delta {}", d2);
        }
    }

    #[test]
    fn same_seed_same_projection() {
        let mut a = ChaCha8Rng::seed_from_u64(42);
        let mut b = ChaCha8Rng::seed_from_u64(42);
        assert_eq!(
            projector().project(&baseline(), 3, &mut a),
            projector().project(&baseline(), 3, &mut b)
        );
    }

    #[test]
    fn tide_stage_advances_six_hours_a_day() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let days = projector().project(&baseline(), 3, &mut rng);
        let stages: Vec<TideStage> = days.iter().map(|d| d.tide_stage).collect();
        // 08h, 14h, 20h
        assert_eq!(stages, vec![TideStage::Low, TideStage::High, TideStage::Low]);
    }

    #[test]
    fn categories_follow_values() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for day in projector().project(&baseline(), 5, &mut rng) {
            assert_eq!(day.pressure_category, PressureCategory::classify(day.pressure_hpa));
            assert_eq!(day.wind_category, WindCategory::classify(day.wind_speed_ms));
            assert_eq!(day.bucket, ProbabilityBucket::from_score(day.score));
        }
    }
}
