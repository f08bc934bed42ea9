//! The command line interface.
use crate::input::load_scenario;
use crate::log;
use crate::output::{create_output_directory, get_output_dir};
use crate::settings::Settings;
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod example;
pub mod settings;
use example::ExampleSubcommands;
use settings::SettingsSubcommands;

/// Build and solve optimisation models of electricity systems.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Options for the run command
#[derive(Args, Default)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Whether to write a summary of each subproblem's model components
    #[arg(long)]
    pub debug_model: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run a scenario.
    Run {
        /// Path to the scenario directory.
        scenario_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Check that every subproblem of a scenario can be built, without solving.
    Validate {
        /// Path to the scenario directory.
        scenario_dir: PathBuf,
    },
    /// Manage the bundled example scenarios.
    Example {
        /// The available subcommands for managing example scenarios.
        #[command(subcommand)]
        subcommand: ExampleSubcommands,
    },
    /// Manage the program settings file.
    Settings {
        /// The available subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { scenario_dir, opts } => handle_run_command(&scenario_dir, &opts, None),
            Self::Validate { scenario_dir } => handle_validate_command(&scenario_dir, None),
            Self::Example { subcommand } => subcommand.execute(),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse the command-line arguments and execute the requested command
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("{}", Cli::command().render_long_help());
        return Ok(());
    };

    command.execute()
}

/// Handle the `run` command.
///
/// # Arguments
///
/// * `scenario_path` - The scenario directory
/// * `opts` - Options given on the command line
/// * `settings` - Program settings. If `None`, they are loaded from the settings file.
pub fn handle_run_command(
    scenario_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = match settings {
        Some(settings) => settings,
        None => Settings::load().context("Failed to load settings.")?,
    };
    let debug_model = opts.debug_model || settings.debug_model;
    let allow_overwrite = opts.overwrite || settings.overwrite;

    let output_path = match &opts.output_dir {
        Some(path) => path.clone(),
        None => get_output_dir(scenario_path)?,
    };
    let overwrite = create_output_directory(&output_path, allow_overwrite).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_path.display()
        )
    })?;

    log::init(Some(settings.log_level.as_str()), Some(output_path.as_path()))
        .context("Failed to initialise logging.")?;

    let scenario = load_scenario(scenario_path).context("Failed to load scenario.")?;
    info!("Loaded scenario from {}", scenario_path.display());
    info!("Output folder: {}", output_path.display());
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    crate::simulation::run(&scenario, &output_path, debug_model)?;
    info!("Scenario run complete!");

    Ok(())
}

/// Handle the `validate` command. No log files are written.
pub fn handle_validate_command(scenario_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = match settings {
        Some(settings) => settings,
        None => Settings::load().context("Failed to load settings.")?,
    };
    log::init(Some(settings.log_level.as_str()), None).context("Failed to initialise logging.")?;

    let scenario = load_scenario(scenario_path).context("Failed to validate scenario.")?;
    crate::simulation::validate(&scenario).context("Failed to validate scenario.")?;
    info!("Scenario validation successful!");

    Ok(())
}
