use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use cividle_core::{
    config::Config,
    content::{load_content, Content, ContentSource},
    driver::{self, RealtimeOptions},
    engine::{Engine, EngineBuilder},
    scenario::ScenarioLoader,
    snapshot, telemetry,
    world::GameState,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Deterministic CivIdle economy simulator")]
struct Cli {
    /// Runtime configuration (YAML); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ruleset to load instead of the bundled one
    #[arg(long, global = true)]
    content: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a fixed number of ticks back to back
    Run {
        #[command(flatten)]
        city: CityArgs,
        /// Override tick count (uses scenario default when omitted)
        #[arg(long)]
        ticks: Option<u64>,
        /// Override snapshot interval in ticks
        #[arg(long)]
        snapshot_interval: Option<u64>,
        /// Directory for snapshots
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,
    },
    /// Replay a period of absence
    CatchUp {
        #[command(flatten)]
        city: CityArgs,
        /// Seconds the city was left alone
        #[arg(long)]
        seconds: u64,
    },
    /// Tick against the wall clock until Ctrl-C
    Realtime {
        #[command(flatten)]
        city: CityArgs,
        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
        #[arg(long)]
        tick_millis: Option<u64>,
    },
    /// Print the resolved resource tiers and prices
    Prices,
}

#[derive(Debug, Args)]
struct CityArgs {
    /// Scenario YAML describing the starting city
    #[arg(long, default_value = "scenarios/rome_start.yaml")]
    scenario: PathBuf,
    /// Resume from a save file instead of the scenario
    #[arg(long)]
    load: Option<PathBuf>,
    /// Write the final state here
    #[arg(long)]
    save: Option<PathBuf>,
}

struct City {
    state: GameState,
    default_ticks: u64,
    restored: bool,
}

fn load_city(content: &Content, args: &CityArgs) -> Result<City> {
    if let Some(path) = &args.load {
        let save = snapshot::load(path)
            .with_context(|| format!("Failed to load save {}", path.display()))?;
        info!(path = %path.display(), tick = save.metadata.tick, "save loaded");
        return Ok(City {
            state: save.state,
            default_ticks: 120,
            restored: true,
        });
    }
    let scenario = ScenarioLoader::new(".").load(&args.scenario)?;
    let state = scenario.build_state(content)?;
    Ok(City {
        state,
        default_ticks: scenario.ticks(None),
        restored: false,
    })
}

fn build_engine(content: Arc<Content>, config: &Config, city: &City) -> Result<Engine> {
    let mut engine = EngineBuilder::new(content, config.engine_settings())
        .with_standard_pipeline()
        .build();
    if city.restored {
        engine.prime(&city.state)?;
    }
    Ok(engine)
}

fn finish(args: &CityArgs, state: &GameState) -> Result<()> {
    if let Some(path) = &args.save {
        snapshot::save(state, path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        println!("Saved tick {} to {}", state.tick, path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::from_yaml(path)?,
        None => Config::default(),
    };
    if cli.content.is_some() {
        config.content = cli.content.clone();
    }
    telemetry::init(&config.logging.level);

    let content = match &config.content {
        Some(path) => load_content(ContentSource::Path(path.clone()))
            .with_context(|| format!("Failed to load content {}", path.display()))?,
        None => load_content(ContentSource::Embedded)?,
    };
    let content = Arc::new(content);

    match cli.command {
        Command::Run {
            city: args,
            ticks,
            snapshot_interval,
            snapshot_dir,
        } => {
            if let Some(interval) = snapshot_interval {
                config.snapshot.interval_ticks = interval;
            }
            if let Some(dir) = snapshot_dir {
                config.snapshot.dir = dir;
            }
            let mut city = load_city(&content, &args)?;
            let mut engine = build_engine(content.clone(), &config, &city)?;
            let ticks = ticks.unwrap_or(city.default_ticks);
            let mut last = None;
            engine.run_with_hook(&mut city.state, ticks, |summary| last = Some(summary.clone()))?;
            if let Some(summary) = last {
                println!(
                    "City '{}' ran {} ticks: {} workers busy of {}, happiness {:.0}, value {:.0}, science {:.0}",
                    city.state.city,
                    ticks,
                    summary.workers_busy,
                    summary.workers_available,
                    summary.happiness,
                    summary.total_value,
                    summary.science
                );
            }
            finish(&args, &city.state)
        }
        Command::CatchUp {
            city: args,
            seconds,
        } => {
            let mut city = load_city(&content, &args)?;
            let mut engine = build_engine(content.clone(), &config, &city)?;
            let report = engine.catch_up(&mut city.state, seconds, |done, total| {
                println!("catch-up {done}/{total}");
            })?;
            println!(
                "Replayed {} of {} offline seconds, banked {:.0} warp",
                report.ticks_run, report.offline_seconds, report.warp_banked
            );
            finish(&args, &city.state)
        }
        Command::Realtime {
            city: args,
            ticks,
            tick_millis,
        } => {
            if let Some(millis) = tick_millis {
                config.realtime.tick_millis = millis;
            }
            let mut city = load_city(&content, &args)?;
            let mut engine = build_engine(content.clone(), &config, &city)?;
            let options = RealtimeOptions::from_config(&config.realtime, ticks);
            let (tx, mut rx) = watch::channel(None);
            let printer = tokio::spawn(async move {
                while rx.changed().await.is_ok() {
                    if let Some(summary) = rx.borrow_and_update().as_ref() {
                        if let Ok(line) = serde_json::to_string(summary) {
                            println!("{line}");
                        }
                    }
                }
            });
            let report = driver::run_realtime(
                &mut engine,
                &mut city.state,
                &options,
                || true,
                &tx,
                async {
                    let _ = tokio::signal::ctrl_c().await;
                },
            )
            .await?;
            drop(tx);
            let _ = printer.await;
            println!(
                "Real-time run finished after {} ticks ({} warped)",
                report.ticks_run, report.warped
            );
            finish(&args, &city.state)
        }
        Command::Prices => {
            println!("{:<12} {:>4} {:>10}", "resource", "tier", "price");
            for (res, tier) in &content.pricing.resource_tier {
                println!(
                    "{:<12} {:>4} {:>10.2}",
                    res.as_str(),
                    tier,
                    content.resource_price(res.as_str())
                );
            }
            Ok(())
        }
    }
}
