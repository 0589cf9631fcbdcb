use super::{Factor, FactorContext};
use crate::config::TideBand;
use crate::models::{FactorScore, TideKind};

/// Tide factor - rewards an imminent low-to-high transition
///
/// Looks at events in the next 6 hours:
/// - Low followed by High, the High within 2h: 9
/// - Same, within 4h: 7
/// - Otherwise: 5
/// - +1 if the nearest upcoming event's height is in the ideal band (capped at 10)
/// - No events in the window at all: 4
pub struct TideFactor {
    band: TideBand,
    window_hours: i64,
}

impl TideFactor {
    pub const WINDOW_HOURS: i64 = 6;

    pub fn new(band: TideBand) -> Self {
        Self {
            band,
            window_hours: Self::WINDOW_HOURS,
        }
    }
}

impl Default for TideFactor {
    fn default() -> Self {
        Self::new(TideBand::default())
    }
}

impl Factor for TideFactor {
    fn id(&self) -> &'static str {
        "tide"
    }

    fn name(&self) -> &'static str {
        "Maré"
    }

    fn evaluate(&self, ctx: &FactorContext<'_>) -> FactorScore {
        let upcoming = ctx.tides.upcoming(ctx.at, self.window_hours);
        if upcoming.is_empty() {
            return FactorScore::new(4.0).with_note("Sem dados de maré nas próximas horas");
        }

        let mut score = 5.0;
        let mut notes = Vec::new();

        let transition = upcoming
            .windows(2)
            .find(|pair| pair[0].kind == TideKind::Low && pair[1].kind == TideKind::High);
        if let Some(pair) = transition {
            let hours = (pair[1].timestamp - ctx.at).num_minutes() as f64 / 60.0;
            if hours <= 2.0 {
                score = 9.0;
                notes.push(format!("Excelente: maré começando a encher em {:.1}h", hours));
            } else if hours <= 4.0 {
                score = 7.0;
                notes.push(format!("Bom: maré começará a encher em {:.1}h", hours));
            }
        }

        let nearest = upcoming[0];
        if self.band.contains(nearest.height_m) {
            score += 1.0;
            notes.push(format!("Altura ideal: {:.2}m", nearest.height_m));
        }

        if notes.is_empty() {
            notes.push("Condições de maré normais".into());
        }

        let mut factor = FactorScore::new(score);
        factor.narrative = notes;
        factor
    }
}
