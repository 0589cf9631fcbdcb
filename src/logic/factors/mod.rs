pub mod site;
pub mod tide;
pub mod weather;

pub use site::SiteFactor;
pub use tide::TideFactor;
pub use weather::WeatherFactor;

use crate::models::{Beach, FactorScore, TideReport, WeatherSnapshot};
use chrono::{DateTime, FixedOffset};

/// Everything a factor may look at for one evaluation.
pub struct FactorContext<'a> {
    pub at: DateTime<FixedOffset>,
    pub tides: &'a TideReport,
    pub weather: &'a WeatherSnapshot,
    pub beach: Option<&'a Beach>,
}

/// A 0-10 sub-score feeding the weighted aggregate
pub trait Factor: Send + Sync {
    /// Unique identifier for this factor
    fn id(&self) -> &'static str;

    /// Human-readable name
    fn name(&self) -> &'static str;

    fn evaluate(&self, ctx: &FactorContext<'_>) -> FactorScore;
}
