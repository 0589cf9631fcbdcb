use crate::config::ScoringWeights;
use crate::models::{FactorBreakdown, FactorScore, ProbabilityBucket, MAX_SCORE};

/// The weighted combination of the four factor scores.
#[derive(Debug, Clone)]
pub struct AggregateScore {
    pub final_score: u8,
    pub raw_weighted_sum: f64,
    pub bucket: ProbabilityBucket,
    pub breakdown: FactorBreakdown,
    pub narrative: Vec<String>,
}

pub struct ScoreAggregator {
    weights: ScoringWeights,
}

impl ScoreAggregator {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn aggregate(
        &self,
        tide: FactorScore,
        weather: FactorScore,
        site: FactorScore,
        restrictions: FactorScore,
    ) -> AggregateScore {
        let w = &self.weights;
        let raw = tide.score * w.tide
            + weather.score * w.weather
            + site.score * w.site
            + restrictions.score * w.restrictions;
        let final_score = raw.clamp(0.0, MAX_SCORE).round() as u8;

        let mut narrative = vec![
            format!("Maré: {}/10", tide.score),
            format!("Condições atmosféricas: {}/10", weather.score),
            format!("Fatores locais: {}/10", site.score),
            format!("Restrições: {}/10", restrictions.score),
        ];
        if !restrictions.penalties.is_empty() {
            narrative.push(format!("Penalidades: {}", restrictions.penalties.join(", ")));
        }

        AggregateScore {
            final_score,
            raw_weighted_sum: raw,
            bucket: ProbabilityBucket::from_score(final_score as f64),
            breakdown: FactorBreakdown {
                tide,
                weather,
                site,
                restrictions,
            },
            narrative,
        }
    }
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        Self::new(ScoringWeights::default())
    }
}
