pub mod aggregator;
pub mod factors;
pub mod forecast;
pub mod ranking;
pub mod restrictions;
pub mod scoring;

pub use aggregator::ScoreAggregator;
pub use forecast::ForecastProjector;
pub use ranking::Ranker;
pub use restrictions::RestrictionEvaluator;
pub use scoring::{ScoreRequest, ScoringService, SiteRequest};
