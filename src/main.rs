use anyhow::{Context, Result, bail};
use chargerkit::capability::Capability;
use chargerkit::config::Config;
use chargerkit::{CapabilitySet, Charger, logging, registry};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Inspect and control configured EV chargers
#[derive(Parser, Debug)]
#[command(name = "chargerkit")]
#[command(version = env!("APP_VERSION"))]
#[command(about = "Inspect and control EV chargers through their vendor protocols")]
struct Args {
    /// Configuration file; default search paths are used when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered driver types and configured chargers
    Drivers,
    /// Show status and supported capabilities
    Status { name: String },
    /// Allow or stop charging
    Enable {
        name: String,
        #[arg(value_parser = ["on", "off"])]
        state: String,
    },
    /// Set the maximum charge current in A
    Current { name: String, amps: i64 },
    /// Switch between one and three phases
    Phases { name: String, phases: u8 },
    /// Print the lifetime energy counter
    Energy { name: String },
    /// Print device identification
    Diagnose { name: String },
}

impl Command {
    fn charger_name(&self) -> Option<&str> {
        match self {
            Command::Drivers => None,
            Command::Status { name }
            | Command::Enable { name, .. }
            | Command::Current { name, .. }
            | Command::Phases { name, .. }
            | Command::Energy { name }
            | Command::Diagnose { name } => Some(name.as_str()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    info!("Chargerkit {} starting", env!("APP_VERSION"));

    let result = run(&args, &config).await;
    if let Err(e) = &result {
        error!("Command failed: {:#}", e);
    }
    logging::shutdown();
    result
}

async fn run(args: &Args, config: &Config) -> Result<()> {
    let Some(name) = args.command.charger_name() else {
        println!("Driver types: {}", registry().types().join(", "));
        for charger in &config.chargers {
            println!("{} ({})", charger.name, charger.driver);
        }
        return Ok(());
    };

    let charger = create(config, name).await?;

    match &args.command {
        Command::Drivers => {}
        Command::Status { .. } => {
            println!("Status:       {}", charger.status().await?);
            println!("Enabled:      {}", charger.enabled().await?);
            let caps = charger
                .capabilities()
                .iter()
                .map(Capability::to_string)
                .collect::<Vec<_>>();
            println!("Capabilities: {}", caps.join(", "));
            if let Some(meter) = charger.as_meter() {
                println!("Power:        {:.0} W", meter.current_power().await?);
            }
            if let Some(rater) = charger.as_charge_rater() {
                println!("Session:      {:.2} kWh", rater.charged_energy().await?);
            }
            if let Some(meter) = charger.as_meter_current() {
                let (l1, l2, l3) = meter.currents().await?;
                println!("Currents:     {:.1} / {:.1} / {:.1} A", l1, l2, l3);
            }
            if let Some(timer) = charger.as_charge_timer() {
                println!("Duration:     {:?}", timer.charging_time().await?);
            }
        }
        Command::Enable { state, .. } => charger.enable(state == "on").await?,
        Command::Current { amps, .. } => charger.max_current(*amps).await?,
        Command::Phases { phases, .. } => {
            let Some(switcher) = charger.as_charge_phases() else {
                bail!("charger '{}' does not support {}", name, Capability::ChargePhases);
            };
            switcher.phases_1p3p(*phases).await?;
        }
        Command::Energy { .. } => {
            let Some(meter) = charger.as_meter_energy() else {
                bail!("charger '{}' does not support {}", name, Capability::MeterEnergy);
            };
            println!("{:.2} kWh", meter.total_energy().await?);
        }
        Command::Diagnose { .. } => {
            let Some(diag) = charger.as_diagnosis() else {
                bail!("charger '{}' does not support {}", name, Capability::Diagnosis);
            };
            for (label, value) in diag.diagnose().await? {
                println!("{:<10} {}", label, value);
            }
        }
    }
    Ok(())
}

async fn create(config: &Config, name: &str) -> Result<Arc<dyn Charger>> {
    let entry = config.charger(name)?;
    let logger = logging::get_logger_with_context(
        logging::LogContext::new("cli")
            .with_charger(name)
            .with_field("driver", entry.driver.clone()),
    );
    let charger = registry()
        .create(&entry.driver, entry.other.clone())
        .await
        .with_context(|| format!("Cannot create charger '{}'", name))?;
    logger.debug(&format!("Capabilities: {:?}", charger.capabilities()));
    Ok(charger)
}
