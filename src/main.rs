use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use mecanum_zenoh_runtime::config::{DEFAULT_BUDGET_MS, DEFAULT_HOLD_MS, DEFAULT_MOTOR_MAX};
use mecanum_zenoh_runtime::drive::{LONG_SQUARE_HOLD_MS, Plan, PowerLimit};
use mecanum_zenoh_runtime::error::ConfigError;
use mecanum_zenoh_runtime::runtime::{self, Mode, RunConfig};

#[derive(Debug, Parser)]
#[command(version, about = "Drive-control runtime for a mecanum base")]
struct Cli {
    /// Wheel power ceiling as a fraction of full scale, in (0, 1]
    #[arg(long, default_value_t = DEFAULT_MOTOR_MAX)]
    motor_max: f64,

    /// Start immediately instead of waiting for a start signal
    #[arg(long)]
    autostart: bool,

    /// Do not publish telemetry frames
    #[arg(long)]
    no_telemetry: bool,

    #[command(subcommand)]
    mode: ModeArg,
}

#[derive(Debug, Subcommand)]
enum ModeArg {
    /// Drive from teleop joystick intent
    Manual,
    /// Run a timed motion plan
    Autonomous {
        /// Built-in plan to run
        #[arg(long, value_enum, default_value_t = BuiltinPlan::Square)]
        plan: BuiltinPlan,

        /// JSON plan file, replaces --plan
        #[arg(long, conflicts_with = "plan")]
        plan_file: Option<PathBuf>,

        /// Hold per step [default: 1000, or 2000 for long-square]
        #[arg(long, conflicts_with = "plan_file")]
        hold_ms: Option<u64>,

        /// Override the plan's time budget
        #[arg(long)]
        budget_ms: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BuiltinPlan {
    Square,
    LongSquare,
    DoubleSquare,
}

impl Cli {
    fn into_config(self) -> Result<RunConfig, ConfigError> {
        let limit = PowerLimit::new(self.motor_max)?;

        let mode = match self.mode {
            ModeArg::Manual => Mode::Manual,
            ModeArg::Autonomous {
                plan,
                plan_file,
                hold_ms,
                budget_ms,
            } => {
                let plan = match plan_file {
                    Some(path) => Plan::load(&path)?,
                    None => match plan {
                        BuiltinPlan::Square => {
                            Plan::square(hold_ms.unwrap_or(DEFAULT_HOLD_MS), DEFAULT_BUDGET_MS)
                        }
                        BuiltinPlan::LongSquare => {
                            Plan::long_square(hold_ms.unwrap_or(LONG_SQUARE_HOLD_MS))
                        }
                        BuiltinPlan::DoubleSquare => {
                            Plan::double_square(hold_ms.unwrap_or(DEFAULT_HOLD_MS))
                        }
                    },
                };
                Mode::Autonomous(match budget_ms {
                    Some(budget) => plan.with_budget(budget),
                    None => plan,
                })
            }
        };

        Ok(RunConfig {
            mode,
            limit,
            autostart: self.autostart,
            telemetry: !self.no_telemetry,
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug, defaults to info)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime::run(config).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
