use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use skycache_core::{AppError, Config, ConfigError, OperatingMode};
use skycache_weather::{SdkRegistry, SdkSettings};

/// Print current weather for one or more cities as JSON.
#[derive(Parser)]
#[command(name = "skycache", version, about = "Cached OpenWeatherMap lookups")]
struct Cli {
    /// OpenWeatherMap API key (defaults to the config file or SKYCACHE_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Override the operating mode from the config file
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Config file to read instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Cities to look up
    #[arg(required = true)]
    cities: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    OnDemand,
    Proactive,
}

impl From<ModeArg> for OperatingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::OnDemand => OperatingMode::OnDemand,
            ModeArg::Proactive => OperatingMode::Proactive,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config, AppError> {
    match Config::load_validated(path) {
        Ok((config, _)) => Ok(config),
        Err(e) => Err(match e.downcast::<ConfigError>() {
            Ok(config_error) => config_error.into(),
            Err(other) => other.into(),
        }),
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = load_config(cli.config.as_deref())?;

    let api_key = cli
        .api_key
        .or_else(|| config.api_key())
        .ok_or(ConfigError::MissingApiKey)?;
    let mode = cli.mode.map_or(config.refresh.mode, OperatingMode::from);

    let registry = SdkRegistry::new(SdkSettings::from(&config));
    let sdk = registry.create(&api_key, mode)?;
    tracing::info!(?mode, cities = cli.cities.len(), "skycache started");

    for city in &cli.cities {
        match sdk.current_weather(city).await {
            Ok(snapshot) => {
                if let Some(observed) = snapshot.observed_at() {
                    tracing::debug!("{} observed at {}", snapshot.city_name, observed);
                }
                match snapshot.to_json() {
                    Ok(json) => println!("{}", json),
                    Err(e) => eprintln!("{}: failed to serialize weather: {}", city, e),
                }
            }
            Err(e) => {
                if e.is_provider_failure() {
                    tracing::warn!("Weather provider failed for {}: {}", city, e);
                } else {
                    tracing::debug!("Lookup for {} failed: {}", city, e);
                }
                eprintln!("{}: {}", city, e.user_message());
            }
        }
    }

    registry.delete(&api_key).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = skycache_core::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("{}", e.user_message());
            ExitCode::from(1)
        }
    }
}
