mod cache;
mod cli;
mod config;
mod datasources;
mod error;
mod logic;
mod models;
mod report;

use cache::TimedCache;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use datasources::{HttpTransport, ReqwestTransport, SynodicLunarCalculator, WeatherProvider};
use error::{PescaError, Result};
use logic::{Ranker, ScoreRequest, ScoringService, SiteRequest};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize logging
    let default_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Init = cli.command {
        Config::setup_interactive()?;
        return Ok(());
    }

    // Load configuration
    let mut config = match Config::load(cli.config.clone()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            eprintln!("Run `pescascore init` or copy config/config.yaml.example to config/config.yaml");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli, &mut config).await {
        eprintln!("Erro: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli, config: &mut Config) -> Result<()> {
    let offset = config.locale.offset()?;

    let beaches_path = cli.beaches.or_else(|| config.beaches_file.clone());
    let beaches = datasources::beaches::load(beaches_path.as_deref())?;

    let cache = Arc::new(TimedCache::with_system_clock(config.cache.ttls()));
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::from_config(&config.http));

    match cli.command {
        Commands::Score { site, at } => {
            let at = resolve_time(at.as_deref(), offset)?;
            let service = ScoringService::from_config(config, beaches, transport, cache)?;
            let request = ScoreRequest::new(SiteRequest::parse(&site)?, at);
            let result = service.score(&request).await?;
            print!("{}", report::probability(&result));
        }
        Commands::Forecast { site, days } => {
            if let Some(days) = days {
                config.forecast.days = days;
                config.validate()?;
            }
            let service = ScoringService::from_config(config, beaches, transport, cache)?;
            let request = ScoreRequest::new(SiteRequest::parse(&site)?, now(offset));
            let forecast = service.forecast(&request).await?;
            print!("{}", report::forecast(&forecast));
        }
        Commands::Rank { region, top, at } => {
            let at = resolve_time(at.as_deref(), offset)?;
            let service = ScoringService::from_config(config, beaches, transport, cache)?;
            let ranked = Ranker::new(&service, config.scoring.ranking_pool)
                .rank(&region, at, top)
                .await?;
            print!("{}", report::ranking(&region, &ranked));
        }
        Commands::Search { query } => {
            let found = beaches.search(&query);
            print!("{}", report::search(&query, &found));
        }
        Commands::Moon { days } => {
            let calculator = SynodicLunarCalculator::new();
            let today = now(offset).date_naive();
            let phases = calculator.forecast(today, days);
            print!("{}", report::moon(&phases, calculator.next_full_moon(today)));
        }
        Commands::Check => {
            check(config, &beaches, transport, cache).await?;
        }
        Commands::Init => {}
    }

    Ok(())
}

async fn check(
    config: &Config,
    beaches: &models::BeachDatabase,
    transport: Arc<dyn HttpTransport>,
    cache: Arc<TimedCache>,
) -> Result<()> {
    println!("Config OK");
    println!(
        "  Pesos: maré {:.2}, tempo {:.2}, local {:.2}, restrições {:.2}",
        config.scoring.weights.tide,
        config.scoring.weights.weather,
        config.scoring.weights.site,
        config.scoring.weights.restrictions
    );

    let registry = config.registry();
    println!("  {} locais de maré", registry.locations().len());
    println!("  {} praias cadastradas", beaches.all_beaches().len());

    let Some(probe) = registry.locations().first() else {
        return Ok(());
    };

    let weather = WeatherProvider::new(
        transport,
        config.weather.clone(),
        config.http.weather_timeout(),
        cache,
    );
    match weather.test_connection(&probe.coordinates).await {
        Ok(true) => println!("  OpenWeatherMap: OK"),
        Ok(false) if !config.weather.has_api_key() => {
            println!("  OpenWeatherMap: sem chave (usando dados estimados)")
        }
        Ok(false) => println!("  OpenWeatherMap: OFFLINE (usando dados estimados)"),
        Err(e) => println!("  OpenWeatherMap: erro: {}", e),
    }

    Ok(())
}

fn now(offset: FixedOffset) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&offset)
}

/// Parses "YYYY-MM-DD HH:MM" as local time, or returns now.
fn resolve_time(at: Option<&str>, offset: FixedOffset) -> Result<DateTime<FixedOffset>> {
    let Some(at) = at else {
        return Ok(now(offset));
    };

    let naive = NaiveDateTime::parse_from_str(at.trim(), "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(at.trim(), "%Y-%m-%dT%H:%M"))
        .map_err(|_| {
            PescaError::InvalidRequest(format!(
                "Data inválida \"{}\", use AAAA-MM-DD HH:MM",
                at
            ))
        })?;

    offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| PescaError::InvalidRequest(format!("Horário ambíguo: {}", at)))
}
