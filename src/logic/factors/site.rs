use super::{Factor, FactorContext};
use crate::models::{BeachKind, FactorScore};
use chrono::Timelike;

/// Local characteristics: +1 for sandy beaches, +1 at night (18h-6h).
pub struct SiteFactor;

impl Factor for SiteFactor {
    fn id(&self) -> &'static str {
        "site"
    }

    fn name(&self) -> &'static str {
        "Fatores locais"
    }

    fn evaluate(&self, ctx: &FactorContext<'_>) -> FactorScore {
        let Some(beach) = ctx.beach else {
            return FactorScore::new(5.0).with_note("Dados da praia não disponíveis");
        };

        let mut score = 5.0;
        let mut notes = Vec::new();

        if beach.kind == BeachKind::Sand {
            score += 1.0;
            notes.push("Praia de areia (boa para robalo)".to_string());
        }

        let hour = ctx.at.hour();
        if hour >= 18 || hour <= 6 {
            score += 1.0;
            notes.push("Período noturno (melhor para robalo)".to_string());
        }

        let mut factor = FactorScore::new(score);
        factor.narrative = notes;
        factor
    }
}
