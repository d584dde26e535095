//! ledwatch CLI - poll LED-wall controllers
//!
//! Requests the serial grant from the broker, walks every serial port with
//! the selected plan, prints the topology and exits with a code describing
//! the outcome.

use clap::{Parser, Subcommand, ValueEnum};
use ledwatch_core::cli::{print_exit_codes, CliResult, ExitCodes};
use ledwatch_core::config::{self, MonitorConfig};
use ledwatch_core::core::arbitration::BrokerClient;
use ledwatch_core::core::logger;
use ledwatch_core::core::simulator::VirtualController;
use ledwatch_core::core::topology::Topology;
use ledwatch_core::core::transport::{list_ports, SerialLink, SerialTransport};
use ledwatch_core::core::walker::{PlanPreset, TopologyWalker};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_appender::non_blocking::WorkerGuard;

/// CLI output format
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable summary
    Text,
    /// JSON for scripting
    Json,
}

/// Walk plans
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Plan {
    /// Every sender and receiver register
    Full,
    /// Live module status
    Modules,
    /// DVI signal
    Dvi,
    /// Display brightness
    Brightness,
    /// Cabinet on/off
    Cabinet,
    /// Receiver temperature and voltage
    Voltage,
    /// Kill mode
    DisplayOn,
    /// Connection probe only
    Connectivity,
}

impl From<Plan> for PlanPreset {
    fn from(plan: Plan) -> Self {
        match plan {
            Plan::Full => PlanPreset::Full,
            Plan::Modules => PlanPreset::Modules,
            Plan::Dvi => PlanPreset::Dvi,
            Plan::Brightness => PlanPreset::Brightness,
            Plan::Cabinet => PlanPreset::Cabinet,
            Plan::Voltage => PlanPreset::Voltage,
            Plan::DisplayOn => PlanPreset::DisplayOn,
            Plan::Connectivity => PlanPreset::Connectivity,
        }
    }
}

/// ledwatch CLI
#[derive(Parser, Debug)]
#[command(
    name = "ledwatch",
    version,
    about = "Health poller for LED-wall sender and receiver cards",
    long_about = None
)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json, global = true)]
    format: OutputFormat,

    /// Config file (JSON, or TOML by extension)
    #[arg(short, long, env = "LEDWATCH_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Walk the serial ports and print the topology
    Poll {
        /// What to read
        #[arg(short, long, value_enum, default_value_t = Plan::Full)]
        plan: Plan,

        /// Task name sent to the broker
        #[arg(short, long)]
        task: Option<String>,

        /// Broker address, overrides the config file
        #[arg(long, env = "LEDWATCH_BROKER")]
        broker: Option<String>,

        /// Skip the broker and open the ports directly
        #[arg(long)]
        no_broker: bool,

        /// Poll a virtual controller with this many receivers instead of real ports
        #[arg(long, value_name = "RECEIVERS")]
        simulate: Option<usize>,
    },

    /// List available serial ports
    Ports,

    /// Print the exit code table
    ExitCodes,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::ExitCodes => {
            print_exit_codes();
            CliResult::success()
        }
        Commands::Ports => ports(&cli),
        Commands::Poll {
            plan,
            task,
            broker,
            no_broker,
            simulate,
        } => {
            // the file log flushes when the guard drops
            let (settings, _guard) = match load_config(&cli) {
                Ok(loaded) => loaded,
                Err(result) => return finish(&result),
            };
            let options = PollOptions {
                preset: (*plan).into(),
                task: task.clone(),
                broker: broker.clone().unwrap_or_else(|| settings.broker.address.clone()),
                use_broker: !*no_broker && simulate.is_none(),
                simulate: *simulate,
            };
            poll(&cli, &settings, options).await
        }
    };
    finish(&result)
}

fn finish(result: &CliResult) -> ExitCode {
    if let Some(msg) = result.message() {
        if result.is_success() {
            eprintln!("{}", msg);
        } else {
            eprintln!("Error: {}", msg);
        }
    }
    result.to_exit_code()
}

fn load_config(cli: &Cli) -> Result<(MonitorConfig, Option<WorkerGuard>), CliResult> {
    let path = cli.config.clone().or_else(config::default_config_path);
    let settings = match &path {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };

    let mut log_options = settings.log_options();
    if cli.verbose {
        log_options.level = "debug".to_string();
    }
    match logger::init(&log_options) {
        Ok(guard) => Ok((settings, guard)),
        Err(e) => Err(CliResult::error(ExitCodes::CONFIG_ERROR, e.to_string())),
    }
}

struct PollOptions {
    preset: PlanPreset,
    task: Option<String>,
    broker: String,
    use_broker: bool,
    simulate: Option<usize>,
}

async fn poll(cli: &Cli, settings: &MonitorConfig, options: PollOptions) -> CliResult {
    let task = options
        .task
        .unwrap_or_else(|| format!("check {}", options.preset));

    let grant = if options.use_broker {
        match BrokerClient::new(&options.broker).acquire(&task).await {
            Ok(grant) => Some(grant),
            Err(e) => return e.into(),
        }
    } else {
        tracing::warn!("Polling without a broker grant");
        None
    };

    let outcome = match options.simulate {
        Some(receivers) => {
            let link = VirtualController::single("/dev/ttyVIRT0", receivers)
                .with_layout(settings.modules, settings.data_groups);
            walk(link, settings, options.preset).await
        }
        None => match settings.serial_settings() {
            Ok(serial) => walk(SerialTransport::new(serial), settings, options.preset).await,
            Err(e) => Err(e.into()),
        },
    };

    if let Some(grant) = grant {
        if let Err(e) = grant.release().await {
            tracing::warn!("Releasing the broker grant failed: {}", e);
        }
    }

    let topology = match outcome {
        Ok(topology) => topology,
        Err(result) => return result,
    };
    if let Err(e) = print_topology(cli, &topology) {
        return CliResult::error(ExitCodes::ERROR, e.to_string());
    }

    match topology.check(&settings.expectations()) {
        Ok(()) => CliResult::success(),
        Err(e) => e.into(),
    }
}

async fn walk<L: SerialLink>(
    link: L,
    settings: &MonitorConfig,
    preset: PlanPreset,
) -> Result<Topology, CliResult> {
    let mut walker = TopologyWalker::new(link, settings.poll_settings()?);
    Ok(walker.poll(&preset.plan()).await?)
}

fn print_topology(cli: &Cli, topology: &Topology) -> anyhow::Result<()> {
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(topology)?),
        OutputFormat::Text => {
            println!("Polled at {}", topology.polled_at.format("%Y-%m-%d %H:%M:%S"));
            for sender in &topology.senders {
                println!(
                    "{} [{}] model {} firmware {}",
                    sender.port, sender.outcome, sender.model, sender.firmware
                );
                for receiver in &sender.receivers {
                    println!(
                        "  receiver {:>3}: model {} firmware {}",
                        u16::from(receiver.index) + 1,
                        receiver.model,
                        receiver.firmware
                    );
                }
            }
            println!(
                "{} device(s), {} receiver(s), display on: {}, modules ok: {}, {} miss(es)",
                topology.devices_found(),
                topology.receiver_count(),
                topology.display_on(),
                topology.modules_ok(),
                topology.misses.len()
            );
        }
    }
    Ok(())
}

fn ports(cli: &Cli) -> CliResult {
    let ports = match list_ports() {
        Ok(ports) => ports,
        Err(e) => return e.into(),
    };
    match cli.format {
        OutputFormat::Json => match serde_json::to_string_pretty(&ports) {
            Ok(json) => println!("{}", json),
            Err(e) => return CliResult::error(ExitCodes::ERROR, e.to_string()),
        },
        OutputFormat::Text => {
            if ports.is_empty() {
                println!("No serial ports found.");
            }
            for port in &ports {
                println!("{}  {}  {}", port.path, port.description, port.hardware_id);
            }
        }
    }
    CliResult::success()
}
