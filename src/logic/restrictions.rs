use crate::cache::{CacheCategory, TimedCache};
use crate::config::CrowdConfig;
use crate::models::{FactorScore, RestrictionRuleSet, WeatherSnapshot};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Timelike, Weekday};
use std::sync::Arc;

const MIN_SCORE: f64 = 1.0;

/// Seasonal closure deductions for one site and day.
#[derive(Debug, Clone, Default)]
struct ClosureAssessment {
    deduction: f64,
    penalties: Vec<String>,
    notes: Vec<String>,
}

/// Beach-goer pressure estimate.
///
/// This is a heuristic placeholder, not a model: hour, weekday, season and
/// weather each add or remove a few points. Higher means more people in the
/// water and on the sand. Typical range is about -10 to 12.
pub fn crowd_index(at: DateTime<FixedOffset>, weather: &WeatherSnapshot) -> i32 {
    let hour = at.hour();
    let month = at.month();
    let sky = weather.conditions();
    let t = weather.temperature_c;
    let pleasant = (22.0..=28.0).contains(&t);

    let mut index = 0;

    match hour {
        10..=12 => index += 2,
        13..=15 => index += 4,
        16..=18 => index += 3,
        _ => {}
    }

    if is_weekend(at) {
        index += 3;
    }

    // Summer season, November to March
    if month >= 11 || month <= 3 {
        index += 2;
    }

    if sky.sunny && pleasant {
        index += 3;
    }
    if sky.partly_cloudy && pleasant {
        index += 2;
    }
    if sky.raining {
        index -= 5;
    }
    if sky.overcast {
        index -= 2;
    }
    if t < 20.0 {
        index -= 3;
    }
    if t > 32.0 {
        index -= 1;
    }
    if weather.wind_speed_ms > 25.0 {
        index -= 2;
    }

    index
}

fn is_weekend(at: DateTime<FixedOffset>) -> bool {
    matches!(at.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Legal, seasonal and crowding penalties for a beach. Base 10, floor 1.
pub struct RestrictionEvaluator {
    crowd: CrowdConfig,
    cache: Arc<TimedCache>,
}

impl RestrictionEvaluator {
    pub fn new(crowd: CrowdConfig, cache: Arc<TimedCache>) -> Self {
        Self { crowd, cache }
    }

    pub fn evaluate(
        &self,
        site: &str,
        rules: Option<&RestrictionRuleSet>,
        at: DateTime<FixedOffset>,
        weather: Option<&WeatherSnapshot>,
    ) -> FactorScore {
        let Some(rules) = rules else {
            return FactorScore::new(10.0).with_note("Sem restrições ativas");
        };

        let mut score = 10.0;
        let mut factor = FactorScore::new(score);

        let closures = self.closures(site, rules, at.date_naive());
        score -= closures.deduction;
        factor.penalties.extend(closures.penalties);
        factor.narrative.extend(closures.notes);

        if rules.restricted_hours {
            score -= self.crowding(at, weather, &mut factor);
        }

        if let Some(area) = &rules.prohibited_area {
            factor.penalties.push(format!("Área proibida: {}", area));
            score -= 2.0;
        }

        if let Some(license) = &rules.license_required {
            factor.penalties.push(format!("Licença: {}", license));
            score -= 1.0;
        }

        if factor.narrative.is_empty() {
            factor.note("Sem restrições críticas");
        }

        factor.score = score.max(MIN_SCORE);
        factor
    }

    /// Closure checks depend only on the date, so they are cached per site and day.
    fn closures(&self, site: &str, rules: &RestrictionRuleSet, date: NaiveDate) -> ClosureAssessment {
        let key = format!("{}_{}", site, date.format("%Y-%m-%d"));
        if let Some(cached) = self.cache.get::<ClosureAssessment>(CacheCategory::Defeso, &key) {
            return cached;
        }

        let mut assessment = ClosureAssessment::default();

        for closure in &rules.seasonal_closures {
            match &closure.period {
                Some(period) => {
                    if period.contains(date) {
                        assessment.deduction += 3.0;
                        assessment
                            .penalties
                            .push(format!("Defeso: {} ({})", closure.species, period));
                        assessment
                            .notes
                            .push(format!("Defeso ativo para {}", closure.species));
                    }
                }
                None => {
                    assessment.deduction += 1.0;
                    assessment
                        .penalties
                        .push(format!("Restrição: {}", closure.species));
                }
            }
        }

        self.cache.put(CacheCategory::Defeso, key, assessment.clone());
        assessment
    }

    fn crowding(
        &self,
        at: DateTime<FixedOffset>,
        weather: Option<&WeatherSnapshot>,
        factor: &mut FactorScore,
    ) -> f64 {
        let hour = at.hour();

        let Some(weather) = weather.filter(|w| !w.is_fallback()) else {
            if is_weekend(at) && (8..=18).contains(&hour) {
                factor.penalties.push("Final de semana: movimento intenso".into());
                return 2.0;
            }
            if (10..=16).contains(&hour) {
                factor
                    .penalties
                    .push("Horário comercial: atenção aos banhistas".into());
                return 1.0;
            }
            return 0.0;
        };

        let index = crowd_index(at, weather);
        if index >= self.crowd.high_threshold {
            factor
                .penalties
                .push("Alta concentração de banhistas (tempo agradável)".into());
            factor.note(format!("Índice de banhistas: {}/10", index));
            self.crowd.high_penalty
        } else if index >= self.crowd.moderate_threshold {
            factor.penalties.push("Movimento moderado de banhistas".into());
            factor.note(format!("Índice de banhistas: {}/10", index));
            self.crowd.moderate_penalty
        } else {
            if index < 0 {
                factor.note("Poucos banhistas (tempo desfavorável)");
            }
            0.0
        }
    }
}
