use super::scoring::{ScoreRequest, ScoringService};
use crate::error::Result;
use crate::models::ProbabilityResult;
use chrono::{DateTime, FixedOffset};

#[derive(Debug, Clone)]
pub struct RankedBeach {
    pub city: String,
    pub name: String,
    pub result: ProbabilityResult,
}

/// Best beaches of a region for a given instant.
pub struct Ranker<'a> {
    service: &'a ScoringService,
    pool: usize,
}

impl<'a> Ranker<'a> {
    pub fn new(service: &'a ScoringService, pool: usize) -> Self {
        Self { service, pool }
    }

    /// Scores up to `pool` beaches in database order and returns the best `top_n`.
    /// Ties keep database order.
    pub async fn rank(
        &self,
        region: &str,
        at: DateTime<FixedOffset>,
        top_n: usize,
    ) -> Result<Vec<RankedBeach>> {
        let candidates: Vec<(String, String, String)> = self
            .service
            .beaches()
            .beaches_in_region(region)?
            .into_iter()
            .take(self.pool)
            .map(|b| (b.region.to_string(), b.city.to_string(), b.name.to_string()))
            .collect();

        let mut ranked = Vec::with_capacity(candidates.len());
        for (region, city, name) in candidates {
            let result = self
                .service
                .score(&ScoreRequest::beach(&region, &city, &name, at))
                .await?;
            ranked.push(RankedBeach { city, name, result });
        }

        ranked.sort_by(|a, b| {
            b.result
                .final_score
                .cmp(&a.result.final_score)
                .then(b.result.raw_weighted_sum.total_cmp(&a.result.raw_weighted_sum))
        });
        ranked.truncate(top_n);

        tracing::debug!("Ranked {} beaches in {}", ranked.len(), region);
        Ok(ranked)
    }
}
