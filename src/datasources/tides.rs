use super::lunar::LunarPhaseProvider;
use super::transport::HttpTransport;
use crate::cache::{CacheCategory, TimedCache};
use crate::config::TidesConfig;
use crate::error::{PescaError, Result};
use crate::models::{Location, LocationRegistry, TideEvent, TideKind, TideReport};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub const LOCAL_SOURCE: &str = "cálculo local";
const MARINHA_SOURCE: &str = "Marinha do Brasil";
const INPH_SOURCE: &str = "INPH";

/// One remote tier of the tide fallback chain.
#[async_trait]
pub trait TideSource: Send + Sync {
    fn name(&self) -> &str;

    /// Raw events for one day. Shape validation happens in the estimator.
    async fn fetch(&self, location: &Location, date: NaiveDate) -> Result<Vec<TideEvent>>;
}

// Remote payloads. Field names vary between publications, hence the aliases.
#[derive(Debug, Deserialize)]
struct RawTide {
    #[serde(alias = "time")]
    hora: String,
    #[serde(alias = "type")]
    tipo: String,
    #[serde(alias = "height")]
    altura: RawHeight,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawHeight {
    Number(f64),
    Text(String),
}

impl RawHeight {
    fn meters(&self) -> Option<f64> {
        match self {
            RawHeight::Number(n) => Some(*n),
            RawHeight::Text(s) => s.trim().replace(',', ".").parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawDay {
    #[serde(default, alias = "date")]
    data: Option<String>,
    #[serde(default, alias = "day")]
    dia: Option<u32>,
    #[serde(default, alias = "tides")]
    mares: Vec<RawTide>,
}

impl RawDay {
    fn is_for(&self, date: NaiveDate) -> bool {
        if let Some(raw) = &self.data {
            let prefix: String = raw.chars().take(10).collect();
            if let Ok(d) = NaiveDate::parse_from_str(&prefix, "%Y-%m-%d") {
                return d == date;
            }
        }
        self.dia == Some(date.day())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MarinhaPayload {
    Days(Vec<RawDay>),
    Wrapped {
        #[serde(alias = "days")]
        dias: Vec<RawDay>,
    },
}

#[derive(Debug, Deserialize)]
struct InphPayload {
    #[serde(alias = "tides")]
    mares: Vec<RawTide>,
}

/// Timestamp from a full datetime or a bare "HH:MM" on `date`.
fn parse_event_time(raw: &str, date: NaiveDate, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&offset));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return offset.from_local_datetime(&naive).single();
        }
    }
    for fmt in ["%H:%M:%S", "%H:%M", "%Hh%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(raw, fmt) {
            return offset.from_local_datetime(&date.and_time(t)).single();
        }
    }
    None
}

fn convert_tides(
    raw: &[RawTide],
    date: NaiveDate,
    offset: FixedOffset,
    confidence: f64,
    source: &str,
) -> Result<Vec<TideEvent>> {
    raw.iter()
        .map(|t| {
            let timestamp = parse_event_time(&t.hora, date, offset)
                .ok_or_else(|| PescaError::InvalidData(format!("{}: bad time '{}'", source, t.hora)))?;
            let kind = TideKind::from_str(&t.tipo)
                .ok_or_else(|| PescaError::InvalidData(format!("{}: bad tide type '{}'", source, t.tipo)))?;
            let height_m = t
                .altura
                .meters()
                .ok_or_else(|| PescaError::InvalidData(format!("{}: bad height", source)))?;
            Ok(TideEvent {
                timestamp,
                kind,
                height_m,
                confidence,
                source: source.to_string(),
            })
        })
        .collect()
}

/// Monthly tide tables published by the Navy hydrographic centre.
pub struct MarinhaSource {
    transport: Arc<dyn HttpTransport>,
    url_template: String,
    timeout: Duration,
    offset: FixedOffset,
}

impl MarinhaSource {
    pub const CONFIDENCE: f64 = 0.95;

    pub fn new(
        transport: Arc<dyn HttpTransport>,
        config: &TidesConfig,
        timeout: Duration,
        offset: FixedOffset,
    ) -> Self {
        Self {
            transport,
            url_template: config.marinha_url.clone(),
            timeout,
            offset,
        }
    }

    fn url(&self, code: &str, date: NaiveDate) -> String {
        self.url_template
            .replace("{year}", &date.year().to_string())
            .replace("{month}", &format!("{:02}", date.month()))
            .replace("{code}", code)
    }
}

#[async_trait]
impl TideSource for MarinhaSource {
    fn name(&self) -> &str {
        MARINHA_SOURCE
    }

    async fn fetch(&self, location: &Location, date: NaiveDate) -> Result<Vec<TideEvent>> {
        let code = location.marinha_code.as_deref().ok_or_else(|| {
            PescaError::DataSourceUnavailable(format!("no Marinha station for {}", location.name))
        })?;

        let body = self.transport.get_json(&self.url(code, date), self.timeout).await?;
        let payload: MarinhaPayload = serde_json::from_value(body)
            .map_err(|e| PescaError::InvalidData(format!("Marinha payload: {}", e)))?;

        let days = match payload {
            MarinhaPayload::Days(days) => days,
            MarinhaPayload::Wrapped { dias } => dias,
        };

        let day = days
            .iter()
            .find(|d| d.is_for(date))
            .ok_or_else(|| PescaError::InvalidData(format!("Marinha table has no entry for {}", date)))?;

        convert_tides(&day.mares, date, self.offset, Self::CONFIDENCE, MARINHA_SOURCE)
    }
}

/// Daily predictions from the national waterway research institute.
pub struct InphSource {
    transport: Arc<dyn HttpTransport>,
    url_template: String,
    timeout: Duration,
    offset: FixedOffset,
}

impl InphSource {
    pub const CONFIDENCE: f64 = 0.9;

    pub fn new(
        transport: Arc<dyn HttpTransport>,
        config: &TidesConfig,
        timeout: Duration,
        offset: FixedOffset,
    ) -> Self {
        Self {
            transport,
            url_template: config.inph_url.clone(),
            timeout,
            offset,
        }
    }

    fn url(&self, code: &str, date: NaiveDate) -> String {
        self.url_template
            .replace("{code}", code)
            .replace("{date}", &date.format("%Y-%m-%d").to_string())
    }
}

#[async_trait]
impl TideSource for InphSource {
    fn name(&self) -> &str {
        INPH_SOURCE
    }

    async fn fetch(&self, location: &Location, date: NaiveDate) -> Result<Vec<TideEvent>> {
        let code = location.inph_code.as_deref().ok_or_else(|| {
            PescaError::DataSourceUnavailable(format!("no INPH station for {}", location.name))
        })?;

        let body = self.transport.get_json(&self.url(code, date), self.timeout).await?;
        let payload: InphPayload = serde_json::from_value(body)
            .map_err(|e| PescaError::InvalidData(format!("INPH payload: {}", e)))?;

        convert_tides(&payload.mares, date, self.offset, Self::CONFIDENCE, INPH_SOURCE)
    }
}

/// Last-resort tide model: four evenly spaced events scaled by location and moon.
pub struct LocalTideModel {
    lunar: Arc<dyn LunarPhaseProvider>,
    offset: FixedOffset,
}

impl LocalTideModel {
    pub const REGISTERED_CONFIDENCE: f64 = 0.7;
    pub const DEFAULT_CONFIDENCE: f64 = 0.5;
    const EVENT_HOURS: [u32; 4] = [3, 9, 15, 21];
    const LOW_FRACTION: f64 = 0.3;

    pub fn new(lunar: Arc<dyn LunarPhaseProvider>, offset: FixedOffset) -> Self {
        Self { lunar, offset }
    }

    pub fn report(&self, name: &str, location: Option<&Location>, date: NaiveDate) -> TideReport {
        let (mean, confidence) = match location {
            Some(loc) => (loc.mean_tide_height_m, Self::REGISTERED_CONFIDENCE),
            None => (Location::DEFAULT_MEAN_TIDE_HEIGHT_M, Self::DEFAULT_CONFIDENCE),
        };

        let phase = self.lunar.phase(date).phase;
        let multiplier = if phase.is_spring_tide() {
            1.3
        } else if phase.is_neap_tide() {
            0.7
        } else {
            1.0
        };
        let high = round2(mean * multiplier);
        let low = round2(high * Self::LOW_FRACTION);

        let events = Self::EVENT_HOURS
            .iter()
            .enumerate()
            .filter_map(|(i, &hour)| {
                let naive = date.and_hms_opt(hour, 0, 0)?;
                let timestamp = self.offset.from_local_datetime(&naive).single()?;
                let (kind, height_m) = if i % 2 == 0 {
                    (TideKind::High, high)
                } else {
                    (TideKind::Low, low)
                };
                Some(TideEvent {
                    timestamp,
                    kind,
                    height_m,
                    confidence,
                    source: LOCAL_SOURCE.to_string(),
                })
            })
            .collect();

        TideReport {
            location: name.to_string(),
            date,
            events,
            source: LOCAL_SOURCE.to_string(),
            note: Some("Dados calculados. Para dados oficiais: marinha.mil.br".into()),
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Tide events for a location and day, trying each tier in order.
pub struct TideEstimator {
    sources: Vec<Box<dyn TideSource>>,
    local: LocalTideModel,
    registry: LocationRegistry,
    cache: Arc<TimedCache>,
}

impl TideEstimator {
    pub fn new(
        sources: Vec<Box<dyn TideSource>>,
        local: LocalTideModel,
        registry: LocationRegistry,
        cache: Arc<TimedCache>,
    ) -> Self {
        Self {
            sources,
            local,
            registry,
            cache,
        }
    }

    pub fn cache_key(location: &str, date: NaiveDate) -> String {
        format!("{}_{}", location, date.format("%Y-%m-%d"))
    }

    pub async fn estimate(&self, location: &str, date: NaiveDate) -> TideReport {
        let key = Self::cache_key(location, date);
        if let Some(report) = self.cache.get::<TideReport>(CacheCategory::Tide, &key) {
            tracing::debug!("Tide cache hit for {}", key);
            return report;
        }

        let report = match self.registry.find(location) {
            Some(loc) => match first_success(&self.sources, loc, date).await {
                Some(report) => report,
                None => self.local.report(location, Some(loc), date),
            },
            None => {
                tracing::info!("{} is not a registered tide location, using defaults", location);
                self.local.report(location, None, date)
            }
        };

        self.cache.put(CacheCategory::Tide, key, report.clone());
        report
    }

    /// Heuristic only, for callers whose remote budget ran out.
    pub fn heuristic(&self, location: &str, date: NaiveDate) -> TideReport {
        self.local.report(location, self.registry.find(location), date)
    }
}

/// Tries each source once, in order. Failures and malformed days fall through.
async fn first_success(
    sources: &[Box<dyn TideSource>],
    location: &Location,
    date: NaiveDate,
) -> Option<TideReport> {
    for source in sources {
        match source.fetch(location, date).await {
            Ok(mut events) => {
                events.sort_by_key(|e| e.timestamp);
                let report = TideReport {
                    location: location.name.clone(),
                    date,
                    events,
                    source: source.name().to_string(),
                    note: None,
                };
                if report.is_complete() {
                    tracing::info!("Tides for {} from {}", location.name, source.name());
                    return Some(report);
                }
                tracing::warn!(
                    "{} returned {} unusable events for {}, expected 4 ordered with high and low",
                    source.name(),
                    report.events.len(),
                    location.name
                );
            }
            Err(e) => {
                tracing::warn!("{} unavailable for {}: {}", source.name(), location.name, e);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::ManualClock;
    use crate::cache::CacheTtls;
    use crate::datasources::lunar::test_support::FixedLunarPhase;
    use crate::datasources::transport::test_support::{StubReply, StubTransport};
    use crate::models::LunarPhase;
    use serde_json::json;

    fn brt() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    fn june_15() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    struct Harness {
        estimator: TideEstimator,
        transport: Arc<StubTransport>,
        clock: Arc<ManualClock>,
    }

    fn harness(transport: StubTransport, phase: LunarPhase) -> Harness {
        let transport = Arc::new(transport);
        let clock = Arc::new(ManualClock::starting_2024());
        let cache = Arc::new(TimedCache::new(CacheTtls::default(), clock.clone()));
        let config = TidesConfig::default();
        let timeout = Duration::from_secs(8);
        let sources: Vec<Box<dyn TideSource>> = vec![
            Box::new(MarinhaSource::new(transport.clone(), &config, timeout, brt())),
            Box::new(InphSource::new(transport.clone(), &config, timeout, brt())),
        ];
        let local = LocalTideModel::new(Arc::new(FixedLunarPhase(phase)), brt());
        Harness {
            estimator: TideEstimator::new(sources, local, LocationRegistry::default(), cache),
            transport,
            clock,
        }
    }

    fn marinha_day() -> serde_json::Value {
        json!([
            { "data": "2024-06-14", "mares": [] },
            {
                "data": "2024-06-15",
                "mares": [
                    { "hora": "02:47", "tipo": "alta", "altura": "1.4" },
                    { "hora": "09:02", "tipo": "baixa", "altura": 0.3 },
                    { "hora": "15:11", "tipo": "alta", "altura": "1,3" },
                    { "hora": "21:20", "tipo": "baixa", "altura": 0.4 }
                ]
            }
        ])
    }

    #[tokio::test]
    async fn vitoria_falls_back_to_local_model_when_remotes_fail() {
        let h = harness(StubTransport::offline(), LunarPhase::WaxingGibbous);
        let report = h.estimator.estimate("Vitória-ES", june_15()).await;

        assert_eq!(report.events.len(), 4);
        assert!(report.is_complete());
        assert_eq!(report.source, LOCAL_SOURCE);
        assert!(report.events.iter().all(|e| e.confidence <= 0.7));
        assert!(report.events.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        // Both remote tiers were tried once
        assert_eq!(h.transport.calls(), 2);
    }

    #[tokio::test]
    async fn marinha_wins_when_available() {
        let transport =
            StubTransport::new().route("marinha.mil.br", StubReply::Json(marinha_day()));
        let h = harness(transport, LunarPhase::Full);
        let report = h.estimator.estimate("Vitória-ES", june_15()).await;

        assert_eq!(report.source, MARINHA_SOURCE);
        assert_eq!(report.events[0].kind, TideKind::High);
        assert_eq!(report.events[2].height_m, 1.3);
        assert!(report.events.iter().all(|e| e.confidence == 0.95));
        assert_eq!(h.transport.calls_matching("ES-001.json"), 1);
        assert_eq!(h.transport.calls_matching("portosdobrasil"), 0);
    }

    #[tokio::test]
    async fn incomplete_marinha_day_falls_through_to_inph() {
        let short = json!([{
            "date": "2024-06-15",
            "tides": [
                { "time": "02:47", "type": "high", "height": 1.4 },
                { "time": "09:02", "type": "low", "height": 0.3 },
                { "time": "15:11", "type": "high", "height": 1.3 }
            ]
        }]);
        let inph = json!({
            "mares": [
                { "hora": "2024-06-15T21:20:00-03:00", "tipo": "Baixa", "altura": 0.4 },
                { "hora": "2024-06-15T02:50:00-03:00", "tipo": "Alta", "altura": 1.4 },
                { "hora": "2024-06-15T09:00:00-03:00", "tipo": "Baixa", "altura": 0.3 },
                { "hora": "2024-06-15T15:10:00-03:00", "tipo": "Alta", "altura": 1.3 }
            ]
        });
        let transport = StubTransport::new()
            .route("marinha.mil.br", StubReply::Json(short))
            .route("portosdobrasil", StubReply::Json(inph));
        let h = harness(transport, LunarPhase::Full);
        let report = h.estimator.estimate("Vitória-ES", june_15()).await;

        assert_eq!(report.source, INPH_SOURCE);
        // Sorted even though the payload was not
        assert_eq!(report.events[0].kind, TideKind::High);
        assert_eq!(report.events[3].kind, TideKind::Low);
        assert!(report.events.iter().all(|e| e.confidence == 0.9));
    }

    #[tokio::test]
    async fn duplicate_times_fall_through_to_next_tier() {
        let stacked = json!([{
            "data": "2024-06-15",
            "mares": [
                { "hora": "09:00", "tipo": "alta", "altura": 1.4 },
                { "hora": "09:00", "tipo": "baixa", "altura": 0.3 },
                { "hora": "09:00", "tipo": "alta", "altura": 1.3 },
                { "hora": "09:00", "tipo": "baixa", "altura": 0.4 }
            ]
        }]);
        let transport = StubTransport::new().route("marinha.mil.br", StubReply::Json(stacked));
        let h = harness(transport, LunarPhase::Full);
        let report = h.estimator.estimate("Vitória-ES", june_15()).await;

        assert_ne!(report.source, MARINHA_SOURCE);
        assert_eq!(report.source, LOCAL_SOURCE);
        assert!(report.events.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(h.transport.calls_matching("portosdobrasil"), 1);
    }

    #[tokio::test]
    async fn events_off_the_requested_day_are_rejected() {
        let inph = json!({
            "mares": [
                { "hora": "2024-06-15T02:50:00-03:00", "tipo": "Alta", "altura": 1.4 },
                { "hora": "2024-06-15T09:00:00-03:00", "tipo": "Baixa", "altura": 0.3 },
                { "hora": "2024-06-15T15:10:00-03:00", "tipo": "Alta", "altura": 1.3 },
                { "hora": "2024-06-16T03:20:00-03:00", "tipo": "Baixa", "altura": 0.4 }
            ]
        });
        let transport = StubTransport::new().route("portosdobrasil", StubReply::Json(inph));
        let h = harness(transport, LunarPhase::Full);
        let report = h.estimator.estimate("Vitória-ES", june_15()).await;
        assert_eq!(report.source, LOCAL_SOURCE);
    }

    #[tokio::test]
    async fn garbage_payload_is_a_soft_failure() {
        let transport = StubTransport::new()
            .route("marinha.mil.br", StubReply::Json(json!({ "erro": "manutenção" })))
            .route("portosdobrasil", StubReply::Json(json!("<html>")));
        let h = harness(transport, LunarPhase::Full);
        let report = h.estimator.estimate("Serra-ES", june_15()).await;
        assert_eq!(report.source, LOCAL_SOURCE);
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let h = harness(StubTransport::offline(), LunarPhase::Full);
        let first = h.estimator.estimate("Vitória-ES", june_15()).await;
        let calls = h.transport.calls();

        let second = h.estimator.estimate("Vitória-ES", june_15()).await;
        assert_eq!(h.transport.calls(), calls);
        assert_eq!(first.events, second.events);
    }

    #[tokio::test]
    async fn cache_expires_after_a_day() {
        let h = harness(StubTransport::offline(), LunarPhase::Full);
        h.estimator.estimate("Vitória-ES", june_15()).await;
        let calls = h.transport.calls();

        h.clock.advance(chrono::Duration::hours(24));
        h.estimator.estimate("Vitória-ES", june_15()).await;
        assert_eq!(h.transport.calls(), calls * 2);
    }

    #[tokio::test]
    async fn unregistered_location_uses_defaults_without_remote_calls() {
        let h = harness(StubTransport::offline(), LunarPhase::WaxingGibbous);
        let report = h.estimator.estimate("Itaúnas-ES", june_15()).await;

        assert_eq!(h.transport.calls(), 0);
        assert!(report.is_complete());
        assert!(report.events.iter().all(|e| e.confidence == 0.5));
        assert_eq!(report.events[0].height_m, Location::DEFAULT_MEAN_TIDE_HEIGHT_M);
    }

    #[tokio::test]
    async fn location_without_codes_skips_remote_tiers() {
        let h = harness(StubTransport::offline(), LunarPhase::Full);
        let report = h.estimator.estimate("Anchieta-ES", june_15()).await;
        assert_eq!(h.transport.calls(), 0);
        assert_eq!(report.source, LOCAL_SOURCE);
        assert!(report.events.iter().all(|e| e.confidence == 0.7));
    }

    #[test]
    fn local_model_applies_spring_and_neap_ranges() {
        let registry = LocationRegistry::default();
        let vitoria = registry.find("Vitória-ES");

        let spring = LocalTideModel::new(Arc::new(FixedLunarPhase(LunarPhase::New)), brt())
            .report("Vitória-ES", vitoria, june_15());
        assert_eq!(spring.events[0].height_m, 1.56);
        assert_eq!(spring.events[1].height_m, 0.47);

        let neap = LocalTideModel::new(Arc::new(FixedLunarPhase(LunarPhase::LastQuarter)), brt())
            .report("Vitória-ES", vitoria, june_15());
        assert_eq!(neap.events[0].height_m, 0.84);

        let hours: Vec<u32> = neap
            .events
            .iter()
            .map(|e| chrono::Timelike::hour(&e.timestamp))
            .collect();
        assert_eq!(hours, vec![3, 9, 15, 21]);
    }

    #[test]
    fn event_time_formats() {
        let d = june_15();
        let t = parse_event_time("09:02", d, brt()).unwrap();
        assert_eq!(t.to_rfc3339(), "2024-06-15T09:02:00-03:00");

        let t = parse_event_time("2024-06-15T12:02:00Z", d, brt()).unwrap();
        assert_eq!(t.to_rfc3339(), "2024-06-15T09:02:00-03:00");

        let t = parse_event_time("2024-06-15 09:02", d, brt()).unwrap();
        assert_eq!(chrono::Timelike::minute(&t), 2);

        assert!(parse_event_time("nove horas", d, brt()).is_none());
    }

    #[test]
    fn marinha_url_template() {
        let source = MarinhaSource::new(
            Arc::new(StubTransport::offline()),
            &TidesConfig::default(),
            Duration::from_secs(1),
            brt(),
        );
        assert_eq!(
            source.url("ES-002", june_15()),
            "https://www.marinha.mil.br/chm/sites/chm.portal/files/tabuas/2024/06/ES-002.json"
        );
    }
}
