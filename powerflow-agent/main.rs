use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use powerflow::common::{identify, msr};
use powerflow::{registry, Config, Powerflow, PowerflowError, StructuredValue};

#[derive(Parser, Debug)]
#[command(name = "powerflow")]
#[command(about = "Power, energy, thermal and clock telemetry and power capping for Intel CPUs")]
struct Args {
    #[arg(long, global = true, help = "Print structured JSON instead of text")]
    json: bool,

    #[arg(
        short,
        long,
        global = true,
        help = "Verbose text output with named fields per reading"
    )]
    long: bool,

    #[arg(
        short,
        long,
        global = true,
        help = "Enable verbose logging (capability entry and every MSR read/write)"
    )]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Average package and DRAM power since the previous sample
    Power,
    /// Accumulated package and DRAM energy
    Energy,
    /// RAPL power limits, power info and units
    PowerLimits,
    /// Package and per-core temperatures
    Thermals,
    /// APERF/MPERF/TSC and derived frequencies
    Clocks,
    /// Fixed counters, PMCs and PCU event selects
    Counters,
    /// Register addresses of the detected architecture
    Features,
    /// Available non-turbo and turbo frequencies
    Frequencies,
    /// Turbo control
    Turbo {
        #[command(subcommand)]
        action: TurboAction,
    },
    /// Program a package power limit on every socket
    CapPackage { watts: u32 },
    /// Distribute a node power limit evenly across sockets
    CapNode { watts: u32 },
    /// Print one power row per interval
    Poll(PollArgs),
    /// Power rows with fixed counter and clock sums
    Monitor(PollArgs),
    /// Node power domain description (always JSON)
    DomainInfo,
    /// GPU power ratio per socket
    GpuRatio,
    /// Identify the processor and list supported architectures
    Arch,
    /// Extract bits [high:low] from a raw register value
    Decode {
        #[arg(value_parser = parse_u64)]
        raw: u64,
        low: u32,
        high: u32,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum TurboAction {
    Enable,
    Disable,
    Status,
}

#[derive(clap::Args, Debug, Clone, Copy)]
struct PollArgs {
    #[arg(short, long, default_value_t = 10, help = "Number of rows")]
    count: u32,

    #[arg(short, long, default_value_t = 1000, help = "Milliseconds between rows")]
    interval_ms: u64,
}

/// Accept decimal or 0x-prefixed hexadecimal
fn parse_u64(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid register value {s:?}: {e}"))
}

fn print_arch(out: &mut dyn Write) -> anyhow::Result<()> {
    let id = identify()?;
    let entry = registry::lookup(&id);
    writeln!(out, "{id}: {}", entry.map_or("unsupported", |e| e.name))?;
    writeln!(out, "Supported architectures:")?;
    for e in registry::supported() {
        writeln!(
            out,
            "  {} {:02X}_{:02X} {}",
            e.vendor.name(),
            e.family,
            e.model,
            e.name
        )?;
    }
    Ok(())
}

fn poll(
    rows: PollArgs,
    out: &mut dyn Write,
    mut row: impl FnMut(&mut dyn Write) -> powerflow::Result<()>,
) -> anyhow::Result<()> {
    for i in 0..rows.count {
        row(out)?;
        out.flush()?;
        if i + 1 < rows.count {
            std::thread::sleep(Duration::from_millis(rows.interval_ms));
        }
    }
    Ok(())
}

/// Fill `value` for commands with a structured form; false when text applies
fn structured(
    flow: &Powerflow,
    command: &Command,
    value: &mut StructuredValue,
) -> powerflow::Result<bool> {
    match command {
        Command::Power => flow.power_json(value)?,
        Command::Energy => flow.energy_json(value)?,
        Command::PowerLimits => flow.power_limits_json(value)?,
        Command::Thermals => flow.thermals_json(value)?,
        Command::Clocks => flow.clocks_json(value)?,
        Command::Counters => flow.counters_json(value)?,
        Command::Features => flow.features_json(value)?,
        Command::Frequencies => flow.frequencies_json(value)?,
        Command::Turbo {
            action: TurboAction::Status,
        } => flow.turbo_status_json(value)?,
        _ => return Ok(false),
    }
    Ok(true)
}

fn text(
    flow: &Powerflow,
    command: &Command,
    long: bool,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match command {
        Command::Power => flow.print_power(out, long)?,
        Command::Energy => flow.print_energy(out, long)?,
        Command::PowerLimits => flow.print_power_limits(out, long)?,
        Command::Thermals => flow.print_thermals(out, long)?,
        Command::Clocks => flow.print_clocks(out, long)?,
        Command::Counters => flow.print_counters(out, long)?,
        Command::Features => flow.print_features(out)?,
        Command::Frequencies => flow.print_frequencies(out)?,
        Command::Turbo { action } => match action {
            TurboAction::Enable => flow.enable_turbo()?,
            TurboAction::Disable => flow.disable_turbo()?,
            TurboAction::Status => flow.print_turbo_status(out)?,
        },
        Command::CapPackage { watts } => flow.cap_power_limits(*watts)?,
        Command::CapNode { watts } => flow.cap_best_effort_node_power_limit(*watts)?,
        Command::Poll(rows) => poll(*rows, out, |out| flow.poll_power(out))?,
        Command::Monitor(rows) => poll(*rows, out, |out| flow.monitoring(out))?,
        Command::GpuRatio => flow.print_gpu_power_ratio(out)?,
        Command::DomainInfo | Command::Arch | Command::Decode { .. } => {}
    }
    Ok(())
}

fn run(args: &Args, config: Config) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &args.command {
        Command::Arch => return print_arch(&mut out),
        Command::Decode { raw, low, high } => {
            let value =
                powerflow_raw::extract_field(*raw, *low, *high).map_err(PowerflowError::from)?;
            writeln!(out, "0x{value:x} ({value})")?;
            return Ok(());
        }
        _ => {}
    }

    msr::check_permissions()?;
    let flow = Powerflow::init(config).context("Failed to initialize powerflow")?;
    tracing::debug!("Bound capability table for {}", flow.arch());

    let mut value = StructuredValue::object();
    let is_structured = match args.command {
        Command::DomainInfo => {
            flow.node_power_domain_info_json(&mut value)?;
            true
        }
        _ if args.json => structured(&flow, &args.command, &mut value)?,
        _ => false,
    };

    if is_structured {
        let json = serde_json::to_string_pretty(&value)
            .map_err(|e| PowerflowError::OutputSerialization(e.to_string()))?;
        writeln!(out, "{json}")?;
        return Ok(());
    }

    text(&flow, &args.command, args.long, &mut out)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = Config::from_env();
    let verbose = args.verbose || config.verbose;
    let config = config.with_verbose(verbose);

    // Setup logging based on verbose flag; logs go to stderr so stdout stays parseable
    let log_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run(&args, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e
                .downcast_ref::<PowerflowError>()
                .map_or(1, PowerflowError::code);
            eprintln!("Error: {e:#}");
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
