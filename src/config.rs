use crate::cache::CacheTtls;
use crate::error::{PescaError, Result};
use crate::models::{Location, LocationRegistry};
use chrono::FixedOffset;
use dialoguer::{Input, Password};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub tides: TidesConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub locale: LocaleConfig,
    /// Tide reference points; the built-in Espírito Santo list when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<Location>>,
    /// Beach database YAML; the bundled dataset when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beaches_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    pub tide_hours: i64,
    pub weather_minutes: i64,
    pub defeso_days: i64,
    pub probability_minutes: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tide_hours: 24,
            weather_minutes: 60,
            defeso_days: 7,
            probability_minutes: 60,
        }
    }
}

impl CacheConfig {
    pub fn ttls(&self) -> CacheTtls {
        CacheTtls {
            tide: chrono::Duration::hours(self.tide_hours),
            weather: chrono::Duration::minutes(self.weather_minutes),
            defeso: chrono::Duration::days(self.defeso_days),
            probability: chrono::Duration::minutes(self.probability_minutes),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    pub tide_timeout_secs: u64,
    pub weather_timeout_secs: u64,
    /// Prefix such as "https://corsproxy.io/?" for domains listed below
    #[serde(default)]
    pub cors_proxy: Option<String>,
    #[serde(default)]
    pub proxied_domains: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            tide_timeout_secs: 8,
            weather_timeout_secs: 10,
            cors_proxy: None,
            proxied_domains: Vec::new(),
        }
    }
}

impl HttpConfig {
    pub fn tide_timeout(&self) -> Duration {
        Duration::from_secs(self.tide_timeout_secs)
    }

    pub fn weather_timeout(&self) -> Duration {
        Duration::from_secs(self.weather_timeout_secs)
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct WeatherConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_weather_url")]
    pub base_url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_weather_url() -> String {
    "https://api.openweathermap.org/data/2.5".into()
}

fn default_enabled() -> bool {
    true
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("OPENWEATHER_API_KEY").unwrap_or_default(),
            base_url: default_weather_url(),
            enabled: true,
        }
    }
}

impl WeatherConfig {
    /// False for an empty key or an unresolved `${VAR}` placeholder.
    pub fn has_api_key(&self) -> bool {
        let key = self.api_key.trim();
        !key.is_empty() && !key.starts_with("${")
    }
}

impl std::fmt::Debug for WeatherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TidesConfig {
    /// `{year}`, `{month}` and `{code}` are substituted
    pub marinha_url: String,
    /// `{code}` and `{date}` are substituted
    pub inph_url: String,
    #[serde(default = "default_enabled")]
    pub remote_enabled: bool,
}

impl Default for TidesConfig {
    fn default() -> Self {
        Self {
            marinha_url:
                "https://www.marinha.mil.br/chm/sites/chm.portal/files/tabuas/{year}/{month}/{code}.json"
                    .into(),
            inph_url: "https://www.portosdobrasil.gov.br/inph/api/mares/{code}?data={date}".into(),
            remote_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ScoringWeights {
    pub tide: f64,
    pub weather: f64,
    pub site: f64,
    pub restrictions: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            tide: 0.50,
            weather: 0.35,
            site: 0.10,
            restrictions: 0.05,
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.tide + self.weather + self.site + self.restrictions
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct TideBand {
    pub min_m: f64,
    pub max_m: f64,
}

impl Default for TideBand {
    fn default() -> Self {
        Self {
            min_m: 0.8,
            max_m: 1.5,
        }
    }
}

impl TideBand {
    pub fn contains(&self, height_m: f64) -> bool {
        height_m >= self.min_m && height_m <= self.max_m
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct CrowdConfig {
    pub high_threshold: i32,
    pub moderate_threshold: i32,
    pub high_penalty: f64,
    pub moderate_penalty: f64,
}

impl Default for CrowdConfig {
    fn default() -> Self {
        Self {
            high_threshold: 6,
            moderate_threshold: 3,
            high_penalty: 2.0,
            moderate_penalty: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: ScoringWeights,
    #[serde(default)]
    pub ideal_tide_band: TideBand,
    #[serde(default)]
    pub crowd: CrowdConfig,
    /// Beaches scored per region when ranking
    #[serde(default = "default_ranking_pool")]
    pub ranking_pool: usize,
}

fn default_ranking_pool() -> usize {
    15
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            ideal_tide_band: TideBand::default(),
            crowd: CrowdConfig::default(),
            ranking_pool: default_ranking_pool(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForecastConfig {
    pub days: u32,
    /// Fixed RNG seed for reproducible projections
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            days: 3,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocaleConfig {
    pub utc_offset_hours: i32,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        // Brasília time
        Self {
            utc_offset_hours: -3,
        }
    }
}

impl LocaleConfig {
    pub fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).ok_or_else(|| {
            PescaError::Config(format!("invalid UTC offset {}", self.utc_offset_hours))
        })
    }
}

impl Config {
    /// Loads the config file, or built-in defaults when none exists.
    ///
    /// An explicit path that does not exist is an error.
    pub fn load(config_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_override {
            Some(p) => {
                if !p.exists() {
                    return Err(PescaError::Config(format!(
                        "Config file not found at {:?}. Run `pescascore init` to set up.",
                        p
                    )));
                }
                p
            }
            None => match Self::find_config_path() {
                Some(p) => p,
                None => {
                    tracing::debug!("No config file found, using built-in defaults");
                    let config = Config::default();
                    config.validate()?;
                    return Ok(config);
                }
            },
        };

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| PescaError::Config(format!("Failed to read config: {}", e)))?;

        let config = Self::from_yaml(&config_str)?;
        tracing::debug!("Loaded config from {}", config_path.display());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // Substitute environment variables
        let content = Self::substitute_env_vars(content);

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| PescaError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Search for config.yaml in standard locations.
    fn find_config_path() -> Option<PathBuf> {
        let local_config = PathBuf::from("config/config.yaml");
        if local_config.exists() {
            return Some(local_config);
        }

        dirs::config_dir()
            .map(|dir| dir.join("pescascore").join("config.yaml"))
            .filter(|p| p.exists())
    }

    /// Default path for writing new config files (~/.config/pescascore/config.yaml).
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| PescaError::Config("Cannot determine config directory".into()))?
            .join("pescascore");
        Ok(config_dir.join("config.yaml"))
    }

    pub fn validate(&self) -> Result<()> {
        let w = &self.scoring.weights;
        for (name, value) in [
            ("tide", w.tide),
            ("weather", w.weather),
            ("site", w.site),
            ("restrictions", w.restrictions),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PescaError::Config(format!(
                    "weight '{}' must be between 0 and 1, got {}",
                    name, value
                )));
            }
        }
        if (w.sum() - 1.0).abs() > 1e-6 {
            return Err(PescaError::Config(format!(
                "scoring weights must sum to 1.0, got {:.4}",
                w.sum()
            )));
        }

        let band = &self.scoring.ideal_tide_band;
        if band.min_m < 0.0 || band.min_m >= band.max_m {
            return Err(PescaError::Config(format!(
                "ideal tide band must satisfy 0 <= min < max, got {}..{}",
                band.min_m, band.max_m
            )));
        }

        let crowd = &self.scoring.crowd;
        if crowd.moderate_threshold >= crowd.high_threshold {
            return Err(PescaError::Config(
                "crowd moderate_threshold must be below high_threshold".into(),
            ));
        }

        if self.http.tide_timeout_secs == 0 || self.http.weather_timeout_secs == 0 {
            return Err(PescaError::Config("timeouts must be positive".into()));
        }

        let c = &self.cache;
        if c.tide_hours <= 0
            || c.weather_minutes <= 0
            || c.defeso_days <= 0
            || c.probability_minutes <= 0
        {
            return Err(PescaError::Config("cache TTLs must be positive".into()));
        }

        if !(1..=7).contains(&self.forecast.days) {
            return Err(PescaError::Config(format!(
                "forecast days must be between 1 and 7, got {}",
                self.forecast.days
            )));
        }

        self.locale.offset()?;

        if let Some(locations) = &self.locations {
            if locations.is_empty() {
                return Err(PescaError::Config(
                    "locations list must not be empty".into(),
                ));
            }
        }

        Ok(())
    }

    pub fn registry(&self) -> LocationRegistry {
        match &self.locations {
            Some(locations) => LocationRegistry::new(locations.clone()),
            None => LocationRegistry::default(),
        }
    }

    /// Run interactive setup prompts and write config to disk.
    /// Returns the loaded Config and the path it was written to.
    pub fn setup_interactive() -> Result<(Self, PathBuf)> {
        println!();
        println!("Let's set up PescaScore!");
        println!();

        // --- OpenWeatherMap ---
        println!("OpenWeatherMap (leave blank to use ${{OPENWEATHER_API_KEY}})");
        let api_key: String = Password::new()
            .with_prompt("  API key")
            .allow_empty_password(true)
            .interact()
            .map_err(|e| PescaError::Config(format!("Input error: {}", e)))?;

        let api_key = if api_key.is_empty() {
            "${OPENWEATHER_API_KEY}".to_string()
        } else {
            api_key
        };

        println!();

        // --- Network ---
        println!("Network");
        let cors_proxy: String = Input::new()
            .with_prompt("  CORS proxy prefix (blank for direct)")
            .default(String::new())
            .allow_empty(true)
            .interact_text()
            .map_err(|e| PescaError::Config(format!("Input error: {}", e)))?;

        println!();

        // --- Locale & forecast ---
        println!("Locale");
        let utc_offset_hours: i32 = Input::new()
            .with_prompt("  UTC offset (hours)")
            .default(-3)
            .interact_text()
            .map_err(|e| PescaError::Config(format!("Input error: {}", e)))?;

        let forecast_days: u32 = Input::new()
            .with_prompt("  Forecast days")
            .default(3)
            .interact_text()
            .map_err(|e| PescaError::Config(format!("Input error: {}", e)))?;

        println!();

        let (cors_proxy, proxied_domains) = if cors_proxy.is_empty() {
            (None, Vec::new())
        } else {
            (
                Some(cors_proxy),
                vec!["marinha.mil.br".to_string(), "portosdobrasil.gov.br".to_string()],
            )
        };

        let config = Config {
            http: HttpConfig {
                cors_proxy,
                proxied_domains,
                ..HttpConfig::default()
            },
            weather: WeatherConfig {
                api_key,
                ..WeatherConfig::default()
            },
            forecast: ForecastConfig {
                days: forecast_days,
                seed: None,
            },
            locale: LocaleConfig { utc_offset_hours },
            ..Config::default()
        };
        config.validate()?;

        // Write to default config path
        let config_path = Self::default_config_path()?;
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(&config)
            .map_err(|e| PescaError::Config(format!("Failed to serialize config: {}", e)))?;

        let content = format!(
            "# PescaScore Configuration\n# Generated by `pescascore init`\n# Environment variable substitution (${{VAR}}) is supported.\n\n{}",
            yaml
        );
        std::fs::write(&config_path, content)?;

        println!("Configuration saved to {}", config_path.display());
        println!();

        Ok((config, config_path))
    }

    fn substitute_env_vars(content: &str) -> String {
        let mut result = content.to_string();

        let Ok(re) = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") else {
            return result;
        };

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];
            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(placeholder, &value);
            }
        }

        result
    }
}
