// SPDX-License-Identifier: GPL-3.0-only
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use gigabyte_osd::config::Config;
use gigabyte_osd::devices::{self, DeviceSpec};
use gigabyte_osd::osd::OsdChannel;
use gigabyte_osd::permissions::{self, RequirementStatus};
use gigabyte_osd::property::{self, Policy, Property};
use gigabyte_osd::protocols::billboard::BillboardDevice;

#[macro_use]
extern crate tracing;

/// Read and change OSD settings of Gigabyte KVM monitors over USB
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to $XDG_CONFIG_HOME/gigabyte-osd/config.kdl)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the current value of a setting
    Get {
        #[arg(value_parser = parse_property)]
        property: &'static Property,
    },
    /// Write a setting (range values are clamped)
    Set {
        #[arg(value_parser = parse_property)]
        property: &'static Property,
        #[arg(allow_negative_numbers = true)]
        value: i32,
    },
    /// Ramp a setting to a target value in visible steps
    Transition {
        #[arg(value_parser = parse_property)]
        property: &'static Property,
        #[arg(allow_negative_numbers = true)]
        target: i32,
        /// Increment per write (defaults to the configured transition-step)
        #[arg(short, long)]
        step: Option<u8>,
    },
    /// Flip a two-state setting
    Toggle {
        #[arg(value_parser = parse_property, default_value = "kvm-status")]
        property: &'static Property,
    },
    /// Print every setting
    Status,
    /// List known settings without touching the device
    List,
    /// Diagnose USB permission problems
    Check,
}

fn parse_property(name: &str) -> Result<&'static Property, String> {
    Property::by_name(name).ok_or_else(|| {
        let known: Vec<_> = property::ALL.iter().map(|p| p.name).collect();
        format!("unknown setting '{}', expected one of: {}", name, known.join(", "))
    })
}

fn setup_logs(config_filter: Option<&str>) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_filter.unwrap_or("warn")))
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,{}=warn", env!("CARGO_CRATE_NAME"))));

    #[cfg(feature = "journald")]
    if let Ok(journal_layer) = tracing_journald::layer() {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .with(journal_layer)
            .init();
        return;
    }

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

/// Load the config with a temporary subscriber so parse warnings are shown
fn load_config(path: Option<&std::path::Path>) -> gigabyte_osd::error::Result<Config> {
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
        .finish();
    tracing::subscriber::with_default(subscriber, || Config::load(path))
}

fn describe(property: &Property) -> String {
    match property.policy {
        Policy::Range { min, max } => format!("{}-{}", min, max),
        Policy::Enumeration(allowed) => allowed
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn open(spec: &DeviceSpec, config: &Config) -> anyhow::Result<OsdChannel<BillboardDevice>> {
    OsdChannel::open(spec, config).with_context(|| format!("failed to open {}", spec.name))
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref());
    setup_logs(config.as_ref().ok().and_then(|c| c.log_filter.as_deref()));
    let config = config.context("failed to load configuration")?;

    let spec = devices::resolve(config.vendor_id, config.product_id);

    match cli.cmd {
        Command::List => {
            for p in property::ALL {
                println!(
                    "{:<22} {:#04x} {:#04x}  {}",
                    p.name,
                    p.major,
                    p.minor,
                    describe(p)
                );
            }
        }
        Command::Check => {
            let result = permissions::check_usb_permissions(&spec);
            for r in &result.requirements {
                let mark = match r.status {
                    RequirementStatus::Met => "ok",
                    RequirementStatus::NotMet => "FAIL",
                    RequirementStatus::Partial => "warn",
                    RequirementStatus::NotApplicable => "n/a",
                };
                println!("[{:>4}] {}: {}", mark, r.name, r.description);
            }
            println!("{}", result.summary());
            if result.has_issues() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Get { property } => {
            println!("{}", open(&spec, &config)?.get(property)?);
        }
        Command::Set { property, value } => {
            open(&spec, &config)?.set(property, value)?;
            info!("{} set to {}", property, property.validate(value)?);
        }
        Command::Transition {
            property,
            target,
            step,
        } => {
            let step = step.unwrap_or(config.transition_step);
            open(&spec, &config)?.transition(property, target, step)?;
        }
        Command::Toggle { property } => {
            println!("{}", open(&spec, &config)?.toggle(property)?);
        }
        Command::Status => {
            for (p, value) in open(&spec, &config)?.snapshot()? {
                println!("{:<22} {}", p.name, value);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
