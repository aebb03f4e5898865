//! stackpilot - boot and cluster control plane for a single-node appliance.
//!
//! This is the main entry point for the stackpilot CLI. It provides:
//!
//! - Supervised boot with a dead-man's switch (`stackpilot boot`)
//! - Stuck-boot recovery for timer units (`stackpilot boot-timeout`)
//! - The watchdog reconciler (`stackpilot watchdog`)
//! - Network mode management (`stackpilot mode`)
//! - Read-only diagnosis (`stackpilot diagnose`)
//!
//! See `stackpilot --help` for full usage information.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use stackpilot::boot::BootMode;
use stackpilot::commands;
use stackpilot::config::AppContext;
use stackpilot::exec::SystemRunner;
use stackpilot::logging::{self, LogConfig};
use stackpilot::netmode::NetworkMode;

const AFTER_HELP: &str = "\
COMMON WORKFLOWS:
  # Service units (normal operation)
  stackpilot boot                   # ExecStart of the boot unit
  stackpilot boot-timeout           # OnCalendar stuck-boot supervisor
  stackpilot watchdog               # OnCalendar reconcile pass

  # Console
  stackpilot diagnose               # What state is the appliance in?
  stackpilot mode show
  stackpilot mode set ONLINE_WIFI --wifi-ssid home --wifi-password pw
  stackpilot recover                # Re-run cluster bootstrap by hand";

#[derive(Parser)]
#[command(name = "stackpilot")]
#[command(version)]
#[command(about = "Boot and cluster control plane for a single-node appliance")]
#[command(after_help = AFTER_HELP)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: /etc/stackpilot/stackpilot.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose/debug output for any command
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON log lines (for log shippers)
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the supervised boot sequence
    ///
    /// Spawns the boot worker in its own process group and watches its
    /// heartbeat. A stalled worker is terminated; a hung host is rebooted.
    ///
    /// Examples:
    ///   stackpilot boot                  # Auto-detect first/normal boot
    ///   stackpilot boot --mode first     # Force the first-boot sequence
    Boot {
        /// Boot sequence to run: first or normal (default: auto-detect)
        #[arg(long, value_parser = parse_boot_mode)]
        mode: Option<BootMode>,
    },
    /// Run the boot stage sequence (internal, spawned by `boot`)
    #[command(hide = true)]
    BootWorker {
        /// Boot sequence to run: first or normal
        #[arg(long, value_parser = parse_boot_mode)]
        mode: BootMode,
    },
    /// One pass of the stuck-boot supervisor
    ///
    /// Kills a boot worker that has been in `starting` too long and runs a
    /// normal-boot recovery in its place. Driven by a timer unit.
    BootTimeout,
    /// Run the watchdog reconciler
    ///
    /// Checks every managed subsystem and repairs what drifted. One pass by
    /// default; `--interval` loops for hosts without a timer unit.
    ///
    /// Examples:
    ///   stackpilot watchdog              # One reconcile pass
    ///   stackpilot watchdog --interval 60
    Watchdog {
        /// Loop with this many seconds between passes
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Re-run cluster bootstrap and stack deployment by hand
    Recover,
    /// Show a read-only report of the appliance state
    ///
    /// Never mutates anything; safe to run at any time.
    Diagnose {
        /// Output as JSON for scripting and automation
        #[arg(long)]
        json: bool,
    },
    /// Show or change the network connectivity mode
    Mode {
        #[command(subcommand)]
        action: ModeAction,
    },
    /// Write the boot-time network document only (internal, pre-boot unit)
    #[command(hide = true)]
    EarlyNet,
}

#[derive(Subcommand)]
enum ModeAction {
    /// Show the stored network configuration
    Show,
    /// Set the mode and re-apply the network configuration
    ///
    /// Examples:
    ///   stackpilot mode set OFFLINE
    ///   stackpilot mode set ONLINE_WIFI --wifi-ssid home --wifi-password pw
    ///   stackpilot mode set SERVER_ETH --static-ip 192.168.1.50 \
    ///       --netmask 255.255.255.0 --gateway 192.168.1.1 --dns 1.1.1.1
    Set {
        /// OFFLINE, ONLINE_ETH, ONLINE_WIFI, SERVER_ETH or SERVER_WIFI
        #[arg(value_parser = parse_network_mode)]
        mode: NetworkMode,
        /// Upstream wifi network name (wifi modes)
        #[arg(long)]
        wifi_ssid: Option<String>,
        /// Upstream wifi passphrase (wifi modes)
        #[arg(long)]
        wifi_password: Option<String>,
        /// Static address for the upstream interface (enables static addressing)
        #[arg(long)]
        static_ip: Option<String>,
        /// Netmask in dotted notation, e.g. 255.255.255.0
        #[arg(long)]
        netmask: Option<String>,
        /// Default gateway for static addressing
        #[arg(long)]
        gateway: Option<String>,
        /// Primary DNS server for static addressing
        #[arg(long)]
        dns: Option<String>,
        /// Secondary DNS server for static addressing
        #[arg(long)]
        dns_secondary: Option<String>,
        /// Revert the upstream interface to DHCP
        #[arg(long, conflicts_with = "static_ip")]
        dhcp: bool,
    },
}

fn parse_boot_mode(s: &str) -> Result<BootMode, String> {
    match s {
        "first" => Ok(BootMode::First),
        "normal" => Ok(BootMode::Normal),
        other => Err(format!("invalid boot mode '{other}' (expected first or normal)")),
    }
}

fn parse_network_mode(s: &str) -> Result<NetworkMode, String> {
    const KNOWN: [&str; 5] = [
        "OFFLINE",
        "ONLINE_ETH",
        "ONLINE_WIFI",
        "SERVER_ETH",
        "SERVER_WIFI",
    ];
    let upper = s.trim().to_ascii_uppercase();
    if KNOWN.contains(&upper.as_str()) {
        Ok(NetworkMode::parse(&upper))
    } else {
        Err(format!("invalid mode '{s}' (expected one of {})", KNOWN.join(", ")))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log = if cli.log_json {
        LogConfig {
            format: stackpilot::logging::LogFormat::Json,
            ..LogConfig::default()
        }
    } else {
        LogConfig::default()
    };
    if cli.verbose {
        log = log.level(tracing::Level::DEBUG);
    }
    logging::init_logging(&log);

    let ctx = match &cli.config {
        Some(path) => AppContext::load_from(path)?,
        None => AppContext::load()?,
    };
    let runner = SystemRunner;

    match cli.command {
        Commands::Boot { mode } => {
            let code = commands::boot::supervised(&ctx, &runner, mode)?;
            std::process::exit(code);
        },
        Commands::BootWorker { mode } => {
            let code = commands::boot::worker(&ctx, &runner, mode)?;
            std::process::exit(code);
        },
        Commands::BootTimeout => commands::boot::timeout_pass(&ctx, &runner),
        Commands::Watchdog { interval } => commands::watchdog::execute(&ctx, &runner, interval),
        Commands::Recover => commands::recover::execute(&ctx, &runner),
        Commands::Diagnose { json } => commands::diagnose::execute(&ctx, &runner, json),
        Commands::Mode { action } => match action {
            ModeAction::Show => commands::mode::show(&ctx),
            ModeAction::Set {
                mode,
                wifi_ssid,
                wifi_password,
                static_ip,
                netmask,
                gateway,
                dns,
                dns_secondary,
                dhcp,
            } => {
                let use_static_ip = if dhcp {
                    Some(false)
                } else if static_ip.is_some() {
                    Some(true)
                } else {
                    None
                };
                let opts = commands::mode::SetOptions {
                    wifi_ssid,
                    wifi_password,
                    static_ip,
                    netmask,
                    gateway,
                    dns,
                    dns_secondary,
                    use_static_ip,
                };
                commands::mode::set(&ctx, &runner, mode, &opts)
            },
        },
        Commands::EarlyNet => commands::mode::early_net(&ctx),
    }
}
