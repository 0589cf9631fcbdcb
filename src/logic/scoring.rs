use super::aggregator::ScoreAggregator;
use super::factors::{Factor, FactorContext, SiteFactor, TideFactor, WeatherFactor};
use super::forecast::{ForecastBaseline, ForecastProjector};
use super::restrictions::RestrictionEvaluator;
use crate::cache::{CacheCategory, TimedCache};
use crate::config::Config;
use crate::datasources::{
    HttpTransport, InphSource, LocalTideModel, LunarPhaseProvider, MarinhaSource,
    SynodicLunarCalculator, TideEstimator, TideSource, WeatherProvider,
};
use crate::error::{PescaError, Result};
use crate::models::{
    Beach, BeachDatabase, Coordinates, FactorScore, Forecast, LocationRegistry,
    ProbabilityResult,
};
use chrono::{DateTime, FixedOffset, Timelike};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::Duration;

/// Where to score: a beach from the database, a registered location, or a raw point.
#[derive(Debug, Clone, PartialEq)]
pub enum SiteRequest {
    Beach {
        region: String,
        city: String,
        beach: String,
    },
    Location(String),
    Coordinates { latitude: f64, longitude: f64 },
}

impl SiteRequest {
    /// Parses "ES/Vitória/Camburi", "-20.31,-40.31" or a location name.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PescaError::InvalidRequest("Local não informado".into()));
        }

        let parts: Vec<&str> = s.split('/').map(str::trim).collect();
        if parts.len() == 3 {
            return Ok(SiteRequest::Beach {
                region: parts[0].to_string(),
                city: parts[1].to_string(),
                beach: parts[2].to_string(),
            });
        }
        if parts.len() > 1 {
            return Err(PescaError::InvalidRequest(format!(
                "Caminho inválido \"{}\", use REGIÃO/Cidade/Praia",
                s
            )));
        }

        if let Some((lat, lon)) = s.split_once(',') {
            if let (Ok(latitude), Ok(longitude)) = (lat.trim().parse(), lon.trim().parse()) {
                return Ok(SiteRequest::Coordinates {
                    latitude,
                    longitude,
                });
            }
        }

        Ok(SiteRequest::Location(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRequest {
    pub site: SiteRequest,
    pub at: DateTime<FixedOffset>,
}

impl ScoreRequest {
    pub fn new(site: SiteRequest, at: DateTime<FixedOffset>) -> Self {
        Self { site, at }
    }

    pub fn beach(region: &str, city: &str, beach: &str, at: DateTime<FixedOffset>) -> Self {
        Self::new(
            SiteRequest::Beach {
                region: region.to_string(),
                city: city.to_string(),
                beach: beach.to_string(),
            },
            at,
        )
    }

    pub fn location(name: &str, at: DateTime<FixedOffset>) -> Self {
        Self::new(SiteRequest::Location(name.to_string()), at)
    }
}

/// A request resolved against the database and registry.
#[derive(Debug, Clone)]
struct ResolvedSite {
    label: String,
    tide_location: String,
    coordinates: Coordinates,
    beach: Option<Beach>,
}

/// End-to-end fishing probability for one site and instant.
pub struct ScoringService {
    beaches: BeachDatabase,
    registry: LocationRegistry,
    tides: TideEstimator,
    weather: WeatherProvider,
    lunar: Arc<dyn LunarPhaseProvider>,
    tide_factor: TideFactor,
    weather_factor: WeatherFactor,
    site_factor: SiteFactor,
    restrictions: RestrictionEvaluator,
    aggregator: ScoreAggregator,
    projector: ForecastProjector,
    cache: Arc<TimedCache>,
    offset: FixedOffset,
    tide_budget: Duration,
    weather_budget: Duration,
    forecast_days: u32,
    seed: Option<u64>,
}

impl ScoringService {
    pub fn from_config(
        config: &Config,
        beaches: BeachDatabase,
        transport: Arc<dyn HttpTransport>,
        cache: Arc<TimedCache>,
    ) -> Result<Self> {
        let offset = config.locale.offset()?;
        let registry = config.registry();
        let lunar: Arc<dyn LunarPhaseProvider> = Arc::new(SynodicLunarCalculator::new());

        let tide_timeout = config.http.tide_timeout();
        let mut sources: Vec<Box<dyn TideSource>> = Vec::new();
        if config.tides.remote_enabled {
            sources.push(Box::new(MarinhaSource::new(
                transport.clone(),
                &config.tides,
                tide_timeout,
                offset,
            )));
            sources.push(Box::new(InphSource::new(
                transport.clone(),
                &config.tides,
                tide_timeout,
                offset,
            )));
        }
        // Each remote tier gets its own timeout, so the whole chain gets one per tier.
        let tide_budget = tide_timeout * (sources.len().max(1) as u32);

        let tides = TideEstimator::new(
            sources,
            LocalTideModel::new(lunar.clone(), offset),
            registry.clone(),
            cache.clone(),
        );
        let weather = WeatherProvider::new(
            transport,
            config.weather.clone(),
            config.http.weather_timeout(),
            cache.clone(),
        );

        Ok(Self {
            beaches,
            registry,
            tides,
            weather,
            lunar: lunar.clone(),
            tide_factor: TideFactor::new(config.scoring.ideal_tide_band),
            weather_factor: WeatherFactor,
            site_factor: SiteFactor,
            restrictions: RestrictionEvaluator::new(config.scoring.crowd, cache.clone()),
            aggregator: ScoreAggregator::new(config.scoring.weights),
            projector: ForecastProjector::new(lunar),
            cache,
            offset,
            tide_budget,
            weather_budget: config.http.weather_timeout(),
            forecast_days: config.forecast.days,
            seed: config.forecast.seed,
        })
    }

    /// Override the outer time budgets for the tide and weather lookups.
    pub fn with_timeouts(mut self, tide: Duration, weather: Duration) -> Self {
        self.tide_budget = tide;
        self.weather_budget = weather;
        self
    }

    pub fn beaches(&self) -> &BeachDatabase {
        &self.beaches
    }

    fn resolve(&self, site: &SiteRequest) -> Result<ResolvedSite> {
        match site {
            SiteRequest::Beach {
                region,
                city,
                beach,
            } => {
                let found = self.beaches.beach(region, city, beach)?;
                Ok(ResolvedSite {
                    label: found.label(),
                    tide_location: found.location_name(),
                    coordinates: found.beach.coordinates,
                    beach: Some(found.beach.clone()),
                })
            }
            SiteRequest::Location(name) => {
                let location = self.registry.require(name)?;
                Ok(ResolvedSite {
                    label: location.name.clone(),
                    tide_location: location.name.clone(),
                    coordinates: location.coordinates,
                    beach: None,
                })
            }
            SiteRequest::Coordinates {
                latitude,
                longitude,
            } => {
                let point = Coordinates::new(*latitude, *longitude)?;
                let tide_location = match self.registry.nearest(&point) {
                    Some((location, km)) => {
                        tracing::debug!("Nearest tide location to {} is {} ({:.1} km)", point, location.name, km);
                        location.name.clone()
                    }
                    None => point.to_string(),
                };
                Ok(ResolvedSite {
                    label: point.to_string(),
                    tide_location,
                    coordinates: point,
                    beach: None,
                })
            }
        }
    }

    pub async fn score(&self, request: &ScoreRequest) -> Result<ProbabilityResult> {
        let site = self.resolve(&request.site)?;
        let at = request.at.with_timezone(&self.offset);
        let date = at.date_naive();

        let key = format!("{}_{}_{}", site.label, date.format("%Y-%m-%d"), at.hour());
        if let Some(cached) = self.cache.get::<ProbabilityResult>(CacheCategory::Probability, &key) {
            tracing::debug!("Probability cache hit for {}", key);
            return Ok(cached);
        }

        let (tides, weather) = tokio::join!(
            tokio::time::timeout(self.tide_budget, self.tides.estimate(&site.tide_location, date)),
            tokio::time::timeout(self.weather_budget, self.weather.fetch(&site.coordinates)),
        );

        let tides = tides.unwrap_or_else(|_| {
            tracing::warn!(
                "Tide lookup for {} exceeded {:?}, using local model",
                site.tide_location,
                self.tide_budget
            );
            self.tides.heuristic(&site.tide_location, date)
        });
        let weather = weather.unwrap_or_else(|_| {
            tracing::warn!(
                "Weather lookup for {} exceeded {:?}, using fallback",
                site.coordinates,
                self.weather_budget
            );
            crate::models::WeatherSnapshot::fallback(self.cache.now())
        });

        let lunar = self.lunar.phase(date);

        let ctx = FactorContext {
            at,
            tides: &tides,
            weather: &weather,
            beach: site.beach.as_ref(),
        };
        let tide = evaluate_factor(&self.tide_factor, &ctx, &site.label);
        let weather_score = evaluate_factor(&self.weather_factor, &ctx, &site.label);
        let site_score = evaluate_factor(&self.site_factor, &ctx, &site.label);

        let rules = site.beach.as_ref().and_then(|b| b.restrictions.as_ref());
        let restrictions = self
            .restrictions
            .evaluate(&site.label, rules, at, Some(&weather));

        let aggregate = self
            .aggregator
            .aggregate(tide, weather_score, site_score, restrictions);

        let mut narrative = aggregate.narrative;
        narrative.push(format!("Lua: {} {}", lunar.phase.symbol(), lunar.phase));

        let fishing = site
            .beach
            .as_ref()
            .and_then(|b| b.fishing.clone())
            .filter(|g| !g.is_empty());

        let result = ProbabilityResult {
            site: site.label,
            evaluated_at: at,
            final_score: aggregate.final_score,
            raw_weighted_sum: aggregate.raw_weighted_sum,
            bucket: aggregate.bucket,
            breakdown: aggregate.breakdown,
            narrative,
            lunar,
            weather,
            tides,
            fishing,
        };

        tracing::info!(
            "{} at {}: {}/10 ({})",
            result.site,
            at.format("%Y-%m-%d %H:%M"),
            result.final_score,
            result.bucket
        );
        self.cache
            .put(CacheCategory::Probability, key, result.clone());
        Ok(result)
    }

    /// Scores today, then projects the configured number of days from it.
    pub async fn forecast(&self, request: &ScoreRequest) -> Result<Forecast> {
        let result = self.score(request).await?;
        let baseline = ForecastBaseline::from_result(&result);

        let mut rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let days = self
            .projector
            .project(&baseline, self.forecast_days, &mut rng);

        Ok(Forecast {
            site: result.site,
            days,
        })
    }
}

fn evaluate_factor(factor: &dyn Factor, ctx: &FactorContext<'_>, site: &str) -> FactorScore {
    let score = factor.evaluate(ctx);
    tracing::debug!("{} {} [{}]: {}", site, factor.name(), factor.id(), score.score);
    score
}


#[cfg(test)]
mod tests {
    use super::test_support::{harness, harness_with};
    use super::*;
    use crate::datasources::beaches;
    use crate::datasources::transport::test_support::{StubReply, StubTransport};
    use crate::datasources::tides::LOCAL_SOURCE;
    use crate::logic::factors::test_support::saturday_at;
    use crate::models::ProbabilityBucket;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use serde_json::json;

    fn keyed_weather() -> Config {
        let mut config = Config::default();
        config.weather.api_key = "test_key".into();
        config
    }

    fn owm_body() -> serde_json::Value {
        json!({
            "weather": [{ "description": "céu limpo" }],
            "main": { "temp": 25.0, "pressure": 1019, "humidity": 70 },
            "wind": { "speed": 3.0, "deg": 45 },
            "name": "Vitória"
        })
    }

    #[test]
    fn parses_site_requests() {
        assert_eq!(
            SiteRequest::parse("ES/Vitória/Camburi").unwrap(),
            SiteRequest::Beach {
                region: "ES".into(),
                city: "Vitória".into(),
                beach: "Camburi".into(),
            }
        );
        assert_eq!(
            SiteRequest::parse("-20.31, -40.31").unwrap(),
            SiteRequest::Coordinates {
                latitude: -20.31,
                longitude: -40.31,
            }
        );
        assert_eq!(
            SiteRequest::parse("Vila Velha-ES").unwrap(),
            SiteRequest::Location("Vila Velha-ES".into())
        );
        assert!(SiteRequest::parse("ES/Vitória").is_err());
        assert!(SiteRequest::parse("  ").is_err());
    }

    #[tokio::test]
    async fn vitoria_offline_scores_from_heuristics() {
        let h = harness(StubTransport::offline());
        let result = h
            .service
            .score(&ScoreRequest::location("Vitória-ES", saturday_at(8, 0)))
            .await
            .unwrap();

        assert_eq!(result.tides.events.len(), 4);
        assert_eq!(result.tides.source, LOCAL_SOURCE);
        assert!(result.tides.events.iter().all(|e| e.confidence <= 0.7));
        assert!(result.weather.is_fallback());

        // tide 5 (only a low ahead, out of band), weather 10, site 5, restrictions 10
        assert_eq!(result.breakdown.tide.score, 5.0);
        assert_eq!(result.breakdown.weather.score, 10.0);
        assert_eq!(result.breakdown.site.score, 5.0);
        assert_eq!(result.breakdown.restrictions.score, 10.0);
        assert!((result.raw_weighted_sum - 7.0).abs() < 1e-9);
        assert_eq!(result.final_score, 7);
        assert_eq!(result.bucket, ProbabilityBucket::High);
    }

    #[tokio::test]
    async fn breakdown_slots_hold_their_own_factor() {
        let h = harness(StubTransport::offline());
        let request = ScoreRequest::beach("ES", "Vitória", "Camburi", saturday_at(8, 0));
        let result = h.service.score(&request).await.unwrap();

        let db = beaches::bundled().unwrap();
        let beach = db.beach("ES", "Vitória", "Camburi").unwrap().beach;
        let ctx = FactorContext {
            at: result.evaluated_at,
            tides: &result.tides,
            weather: &result.weather,
            beach: Some(beach),
        };
        let tide = TideFactor::new(Config::default().scoring.ideal_tide_band);
        assert_eq!(result.breakdown.tide, tide.evaluate(&ctx));
        assert_eq!(result.breakdown.weather, WeatherFactor.evaluate(&ctx));
        assert_eq!(result.breakdown.site, SiteFactor.evaluate(&ctx));
        assert_eq!(tide.id(), "tide");
    }

    #[tokio::test]
    async fn catalogued_beach_carries_fishing_guide() {
        let h = harness(StubTransport::offline());
        let camburi = h
            .service
            .score(&ScoreRequest::beach("ES", "Vitória", "Camburi", saturday_at(8, 0)))
            .await
            .unwrap();
        assert_eq!(camburi.fishing.as_ref().map(|g| g.baits.len()), Some(3));
        assert!(crate::report::probability(&camburi).contains("Dicas de pesca"));

        let vitoria = h
            .service
            .score(&ScoreRequest::location("Vitória-ES", saturday_at(8, 0)))
            .await
            .unwrap();
        assert!(vitoria.fishing.is_none());
    }

    #[tokio::test]
    async fn repeated_request_is_served_from_cache() {
        let h = harness_with(
            keyed_weather(),
            beaches::bundled().unwrap(),
            StubTransport::new().route("/weather", StubReply::Json(owm_body())),
        );
        let request = ScoreRequest::beach("ES", "Vitória", "Camburi", saturday_at(9, 0));

        let first = h.service.score(&request).await.unwrap();
        let calls = h.transport.calls();
        assert!(calls > 0);

        let second = h.service.score(&request).await.unwrap();
        assert_eq!(h.transport.calls(), calls);
        assert_eq!(first.final_score, second.final_score);
        assert_eq!(first.narrative, second.narrative);
    }

    #[tokio::test]
    async fn probability_cache_expires_after_an_hour() {
        let h = harness_with(
            keyed_weather(),
            beaches::bundled().unwrap(),
            StubTransport::new().route("/weather", StubReply::Json(owm_body())),
        );
        let request = ScoreRequest::beach("ES", "Vitória", "Camburi", saturday_at(9, 0));

        h.service.score(&request).await.unwrap();
        assert_eq!(h.transport.calls_matching("/weather"), 1);

        h.clock.advance(ChronoDuration::minutes(61));
        h.service.score(&request).await.unwrap();
        // Weather TTL is also an hour, so the provider is asked again
        assert_eq!(h.transport.calls_matching("/weather"), 2);
    }

    #[tokio::test]
    async fn slow_weather_degrades_to_fallback() {
        let h = harness_with(
            keyed_weather(),
            beaches::bundled().unwrap(),
            StubTransport::new().route(
                "/weather",
                StubReply::Delayed(std::time::Duration::from_secs(5), owm_body()),
            ),
        );
        let service = h.service.with_timeouts(
            std::time::Duration::from_secs(5),
            std::time::Duration::from_millis(50),
        );

        let result = service
            .score(&ScoreRequest::location("Vitória-ES", saturday_at(8, 0)))
            .await
            .unwrap();

        assert!(result.weather.is_fallback());
        assert_eq!(result.weather.pressure_hpa, 1018.0);
        assert_eq!(result.tides.events.len(), 4);
    }

    #[tokio::test]
    async fn real_weather_is_used_when_available() {
        let h = harness_with(
            keyed_weather(),
            beaches::bundled().unwrap(),
            StubTransport::new().route("/weather", StubReply::Json(owm_body())),
        );
        let result = h
            .service
            .score(&ScoreRequest::location("Vitória-ES", saturday_at(8, 0)))
            .await
            .unwrap();

        assert!(!result.weather.is_fallback());
        assert_eq!(result.weather.pressure_hpa, 1019.0);
    }

    #[tokio::test]
    async fn unknown_beach_is_not_found() {
        let h = harness(StubTransport::offline());
        let err = h
            .service
            .score(&ScoreRequest::beach("ES", "Vitória", "Copacabana", saturday_at(8, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, PescaError::NotFound(_)));

        let err = h
            .service
            .score(&ScoreRequest::beach("RJ", "Rio", "Leme", saturday_at(8, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, PescaError::NotFound(_)));
    }

    #[tokio::test]
    async fn unknown_location_is_invalid_request() {
        let h = harness(StubTransport::offline());
        let err = h
            .service
            .score(&ScoreRequest::location("Atlântida-XX", saturday_at(8, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, PescaError::InvalidRequest(_)));
        assert_eq!(h.transport.calls(), 0);
    }

    #[tokio::test]
    async fn coordinates_use_nearest_tide_location() {
        let h = harness(StubTransport::offline());
        let request = ScoreRequest::new(
            SiteRequest::Coordinates {
                latitude: -20.34,
                longitude: -40.29,
            },
            saturday_at(8, 0),
        );
        let result = h.service.score(&request).await.unwrap();
        assert_eq!(result.tides.location, "Vila Velha-ES");

        let bad = ScoreRequest::new(
            SiteRequest::Coordinates {
                latitude: -120.0,
                longitude: 0.0,
            },
            saturday_at(8, 0),
        );
        assert!(matches!(
            h.service.score(&bad).await.unwrap_err(),
            PescaError::InvalidRequest(_)
        ));
    }

    #[tokio::test]
    async fn heavily_restricted_beach_floors_at_one() {
        let yaml = r#"
regions:
  ES:
    name: Espírito Santo
    cities:
      Vitória:
        beaches:
          Píer Fechado:
            coordinates: { latitude: -20.30, longitude: -40.29 }
            kind: rocky
            restrictions:
              restricted_hours: true
              prohibited_area: Área portuária
              license_required: Licença amadora
              seasonal_closures:
                - species: Robalo
                  period: "2024-06-01 a 2024-07-31"
                - species: Mero
"#;
        let h = harness_with(
            Config::default(),
            beaches::parse(yaml).unwrap(),
            StubTransport::offline(),
        );
        // Saturday 14h, weather fallback: weekend crowding applies
        let result = h
            .service
            .score(&ScoreRequest::beach("ES", "Vitória", "Píer Fechado", saturday_at(14, 0)))
            .await
            .unwrap();

        let restrictions = &result.breakdown.restrictions;
        assert_eq!(restrictions.score, 1.0);
        assert!(result.penalties().iter().any(|p| p.contains("Robalo")));
        assert!(result.penalties().iter().any(|p| p.contains("Área portuária")));
        assert!(result.final_score <= 10);
    }

    #[tokio::test]
    async fn evaluation_time_is_converted_to_local_offset() {
        let h = harness(StubTransport::offline());
        // 23:00 UTC is 20:00 in Vitória, which counts as night
        let at = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 15, 23, 0, 0)
            .unwrap();
        let result = h
            .service
            .score(&ScoreRequest::beach("ES", "Vitória", "Camburi", at))
            .await
            .unwrap();
        assert_eq!(result.evaluated_at.hour(), 20);
        assert_eq!(result.breakdown.site.score, 7.0);
    }

    #[tokio::test]
    async fn seeded_forecast_is_reproducible() {
        let mut config = Config::default();
        config.forecast.seed = Some(11);
        config.forecast.days = 4;
        let request = ScoreRequest::location("Vitória-ES", saturday_at(8, 0));

        let a = harness_with(config.clone(), beaches::bundled().unwrap(), StubTransport::offline());
        let b = harness_with(config, beaches::bundled().unwrap(), StubTransport::offline());
        let fa = a.service.forecast(&request).await.unwrap();
        let fb = b.service.forecast(&request).await.unwrap();

        assert_eq!(fa.days.len(), 4);
        assert_eq!(fa.days, fb.days);
        assert!(fa.days[0].is_baseline());
        assert_eq!(fa.days[0].pressure_hpa, 1018.0);
        assert_eq!(fa.site, "Vitória-ES");
    }
}
