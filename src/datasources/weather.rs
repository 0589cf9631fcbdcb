use super::transport::HttpTransport;
use crate::cache::{CacheCategory, TimedCache};
use crate::config::WeatherConfig;
use crate::error::{PescaError, Result};
use crate::models::{CompassDirection, Coordinates, WeatherSnapshot};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const SOURCE_LABEL: &str = "OpenWeatherMap";

// OpenWeatherMap current-weather response structures
#[derive(Debug, Deserialize)]
struct OwmCurrentResponse {
    main: OwmMain,
    wind: OwmWind,
    #[serde(default)]
    weather: Vec<OwmWeather>,
    #[serde(default)]
    rain: Option<serde_json::Value>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    pressure: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    speed: f64,
    #[serde(default)]
    deg: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmWeather {
    description: String,
}

/// Current conditions for a point, with a fixed fallback when the API can't answer.
pub struct WeatherProvider {
    transport: Arc<dyn HttpTransport>,
    config: WeatherConfig,
    timeout: Duration,
    cache: Arc<TimedCache>,
}

impl WeatherProvider {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        config: WeatherConfig,
        timeout: Duration,
        cache: Arc<TimedCache>,
    ) -> Self {
        Self {
            transport,
            config,
            timeout,
            cache,
        }
    }

    fn url(&self, point: &Coordinates) -> String {
        format!(
            "{}/weather?lat={}&lon={}&units=metric&lang=pt&appid={}",
            self.config.base_url.trim_end_matches('/'),
            point.latitude,
            point.longitude,
            self.config.api_key
        )
    }

    /// Never fails. Successful lookups are cached, fallbacks are not.
    pub async fn fetch(&self, point: &Coordinates) -> WeatherSnapshot {
        let key = point.cache_key();
        if let Some(snapshot) = self.cache.get::<WeatherSnapshot>(CacheCategory::Weather, &key) {
            tracing::debug!("Weather cache hit for {}", key);
            return snapshot;
        }

        match self.fetch_remote(point).await {
            Ok(snapshot) => {
                self.cache.put(CacheCategory::Weather, key, snapshot.clone());
                snapshot
            }
            Err(e) => {
                tracing::warn!("Weather unavailable for {}, using fallback: {}", point, e);
                WeatherSnapshot::fallback(self.cache.now())
            }
        }
    }

    async fn fetch_remote(&self, point: &Coordinates) -> Result<WeatherSnapshot> {
        if !self.config.enabled {
            return Err(PescaError::DataSourceUnavailable(
                "OpenWeatherMap disabled in config".into(),
            ));
        }
        if !self.config.has_api_key() {
            return Err(PescaError::DataSourceUnavailable(
                "OpenWeatherMap API key not configured".into(),
            ));
        }

        let body = tokio::time::timeout(
            self.timeout,
            self.transport.get_json(&self.url(point), self.timeout),
        )
        .await
        .map_err(|_| PescaError::Timeout(format!("OpenWeatherMap after {:?}", self.timeout)))??;

        let response: OwmCurrentResponse = serde_json::from_value(body).map_err(|e| {
            PescaError::InvalidData(format!("Failed to parse OpenWeatherMap response: {}", e))
        })?;

        Ok(self.convert_response(response))
    }

    fn convert_response(&self, response: OwmCurrentResponse) -> WeatherSnapshot {
        let condition_text = response
            .weather
            .first()
            .map(|w| w.description.clone())
            .unwrap_or_default();

        WeatherSnapshot {
            temperature_c: response.main.temp,
            pressure_hpa: response.main.pressure,
            wind_speed_ms: response.wind.speed,
            wind_direction: CompassDirection::from_degrees(response.wind.deg.unwrap_or(0.0)),
            humidity_pct: response.main.humidity,
            condition_text,
            raining: response.rain.is_some(),
            city: response.name.filter(|n| !n.is_empty()),
            source_label: SOURCE_LABEL.into(),
            fetched_at: self.cache.now(),
        }
    }

    /// Test connection to OpenWeatherMap API
    pub async fn test_connection(&self, point: &Coordinates) -> Result<bool> {
        match self.fetch_remote(point).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_soft() => {
                tracing::debug!("OpenWeatherMap check failed: {}", e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::ManualClock;
    use crate::cache::CacheTtls;
    use crate::datasources::transport::test_support::{StubReply, StubTransport};
    use serde_json::json;

    fn vitoria() -> Coordinates {
        Coordinates {
            latitude: -20.3155,
            longitude: -40.3128,
        }
    }

    fn owm_body() -> serde_json::Value {
        json!({
            "weather": [{ "id": 803, "main": "Clouds", "description": "nublado" }],
            "main": { "temp": 24.3, "pressure": 1017, "humidity": 78 },
            "wind": { "speed": 4.1, "deg": 92 },
            "name": "Vitória"
        })
    }

    fn config() -> WeatherConfig {
        WeatherConfig {
            api_key: "test_key".into(),
            ..WeatherConfig::default()
        }
    }

    fn provider(
        transport: StubTransport,
        config: WeatherConfig,
        timeout: Duration,
    ) -> (WeatherProvider, Arc<StubTransport>, Arc<ManualClock>) {
        let transport = Arc::new(transport);
        let clock = Arc::new(ManualClock::starting_2024());
        let cache = Arc::new(TimedCache::new(CacheTtls::default(), clock.clone()));
        (
            WeatherProvider::new(transport.clone(), config, timeout, cache),
            transport,
            clock,
        )
    }

    #[tokio::test]
    async fn parses_current_weather() {
        let stub = StubTransport::new().route("/weather", StubReply::Json(owm_body()));
        let (p, _, _) = provider(stub, config(), Duration::from_secs(10));
        let snap = p.fetch(&vitoria()).await;

        assert_eq!(snap.pressure_hpa, 1017.0);
        assert_eq!(snap.wind_direction, CompassDirection::E);
        assert_eq!(snap.city.as_deref(), Some("Vitória"));
        assert!(!snap.raining);
        assert!(snap.conditions().overcast);
        assert!(!snap.is_fallback());
    }

    #[tokio::test]
    async fn request_uses_metric_portuguese() {
        let stub = StubTransport::new().route("/weather", StubReply::Json(owm_body()));
        let (p, transport, _) = provider(stub, config(), Duration::from_secs(10));
        p.fetch(&vitoria()).await;
        assert_eq!(transport.calls_matching("units=metric&lang=pt"), 1);
    }

    #[tokio::test]
    async fn rain_block_sets_flag() {
        let mut body = owm_body();
        body["rain"] = json!({ "1h": 0.6 });
        let stub = StubTransport::new().route("/weather", StubReply::Json(body));
        let (p, _, _) = provider(stub, config(), Duration::from_secs(10));
        assert!(p.fetch(&vitoria()).await.raining);
    }

    #[tokio::test]
    async fn cache_hit_makes_no_call() {
        let stub = StubTransport::new().route("/weather", StubReply::Json(owm_body()));
        let (p, transport, clock) = provider(stub, config(), Duration::from_secs(10));

        let first = p.fetch(&vitoria()).await;
        clock.advance(chrono::Duration::minutes(30));
        let second = p.fetch(&vitoria()).await;
        assert_eq!(transport.calls(), 1);
        assert_eq!(first, second);

        clock.advance(chrono::Duration::minutes(30));
        p.fetch(&vitoria()).await;
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn timeout_returns_fallback() {
        let stub = StubTransport::new().route(
            "/weather",
            StubReply::Delayed(Duration::from_secs(5), owm_body()),
        );
        let (p, _, _) = provider(stub, config(), Duration::from_millis(50));
        let snap = p.fetch(&vitoria()).await;

        assert!(snap.is_fallback());
        assert_eq!(snap.temperature_c, 28.0);
        assert_eq!(snap.pressure_hpa, 1018.0);
        assert_eq!(snap.wind_speed_ms, 15.0);
        assert_eq!(snap.wind_direction, CompassDirection::NE);
    }

    #[tokio::test]
    async fn fallback_is_not_cached() {
        let (p, transport, _) = provider(StubTransport::offline(), config(), Duration::from_secs(1));
        assert!(p.fetch(&vitoria()).await.is_fallback());
        assert!(p.fetch(&vitoria()).await.is_fallback());
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn missing_key_skips_the_network() {
        let no_key = WeatherConfig {
            api_key: String::new(),
            ..WeatherConfig::default()
        };
        let stub = StubTransport::new().route("/weather", StubReply::Json(owm_body()));
        let (p, transport, _) = provider(stub, no_key, Duration::from_secs(1));
        assert!(p.fetch(&vitoria()).await.is_fallback());
        assert_eq!(transport.calls(), 0);
        assert!(!p.test_connection(&vitoria()).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_body_returns_fallback() {
        let stub = StubTransport::new().route("/weather", StubReply::Json(json!({ "cod": 401 })));
        let (p, _, _) = provider(stub, config(), Duration::from_secs(1));
        assert!(p.fetch(&vitoria()).await.is_fallback());
    }
}
