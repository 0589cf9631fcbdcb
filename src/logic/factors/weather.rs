use super::{Factor, FactorContext};
use crate::models::FactorScore;

/// Weather factor
///
/// Base 6, then +2 for pressure above 1015 hPa, +1 for wind under 20,
/// +1 when it isn't raining. Capped at 10.
pub struct WeatherFactor;

impl WeatherFactor {
    const HIGH_PRESSURE_HPA: f64 = 1015.0;
    const CALM_WIND: f64 = 20.0;
}

impl Factor for WeatherFactor {
    fn id(&self) -> &'static str {
        "weather"
    }

    fn name(&self) -> &'static str {
        "Condições atmosféricas"
    }

    fn evaluate(&self, ctx: &FactorContext<'_>) -> FactorScore {
        let w = ctx.weather;
        let mut score = 6.0;
        let mut notes = Vec::new();

        if w.pressure_hpa > Self::HIGH_PRESSURE_HPA {
            score += 2.0;
            notes.push("Pressão alta (bom para pesca)".to_string());
        }

        if w.wind_speed_ms < Self::CALM_WIND {
            score += 1.0;
            notes.push("Vento fraco".to_string());
        }

        if !w.conditions().raining {
            score += 1.0;
            notes.push("Sem chuva".to_string());
        }

        if w.is_fallback() {
            notes.push("Dados meteorológicos estimados".to_string());
        }

        let mut factor = FactorScore::new(score);
        factor.narrative = notes;
        factor
    }
}
