//! The module responsible for writing output data to disk.
use crate::build::{BuildContext, BuiltModel};
use crate::capacity::{
    CAPACITY_COST, CAPACITY_MW, CapacityType, ENERGY_CAPACITY_MWH, ProjectOperationalPeriods,
};
use crate::formulation::{AssembledModel, ComponentIndex, ComponentKind, ComponentName};
use crate::operations::{POWER_PROVISION_MW, VARIABLE_OM_COST};
use crate::project::ProjectID;
use crate::solver::Solution;
use crate::system::load_balance::{OVERGENERATION_MW, STATIC_LOAD_MW, UNSERVED_ENERGY_MW};
use crate::system::project_power::POWER_PRODUCTION_IN_ZONE_MW;
use crate::zone::ZoneID;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;
pub use metadata::write_metadata;

/// The root folder in which scenario-specific output folders will be created
pub const OUTPUT_DIRECTORY_ROOT: &str = "gridplan_results";

/// The output file name for the operational periods of projects
const OPERATIONAL_PERIODS_FILE_NAME: &str = "project_operational_periods.csv";

/// The output file name for capacity
const CAPACITY_FILE_NAME: &str = "capacity.csv";

/// The output file name for new builds
const NEW_BUILD_FILE_NAME: &str = "new_build.csv";

/// The output file name for project dispatch
const DISPATCH_FILE_NAME: &str = "dispatch.csv";

/// The output file name for the load balance
const LOAD_BALANCE_FILE_NAME: &str = "load_balance.csv";

/// The output file name for objective values
const OBJECTIVE_FILE_NAME: &str = "objective.csv";

/// The output file name for the sizes of model component families
const MODEL_SUMMARY_FILE_NAME: &str = "debug_model_summary.csv";

/// Get the output directory for the scenario at the specified path
pub fn get_output_dir(scenario_dir: &Path) -> Result<PathBuf> {
    // Canonicalise in case the user has specified "."
    let scenario_dir = scenario_dir
        .canonicalize()
        .context("Could not resolve path to scenario")?;

    let scenario_name = scenario_dir
        .file_name()
        .context("Scenario cannot be in root folder")?
        .to_str()
        .context("Invalid chars in scenario dir name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, scenario_name].iter().collect())
}

/// Create a new output directory.
///
/// If the directory exists and is not empty, it is only reused if `allow_overwrite` is true.
///
/// # Returns
///
/// Whether an existing, non-empty directory will be overwritten
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    if output_dir.is_dir() {
        if fs::read_dir(output_dir)?.next().is_none() {
            return Ok(false);
        }
        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Please delete it or rerun with \
            --overwrite."
        );
        fs::remove_dir_all(output_dir)?;
        fs::create_dir_all(output_dir)?;
        return Ok(true);
    }

    fs::create_dir_all(output_dir)?;

    Ok(false)
}

/// Represents a row in the project operational periods CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct OperationalPeriodRow {
    project: ProjectID,
    period: u32,
    capacity_type: String,
}

/// Write the operational periods of every project to file
pub fn write_project_operational_periods(
    output_path: &Path,
    operational_periods: &ProjectOperationalPeriods,
) -> Result<()> {
    let file_path = output_path.join(OPERATIONAL_PERIODS_FILE_NAME);
    let mut writer = csv::Writer::from_path(file_path)?;
    for (project_id, period, capacity_type) in operational_periods.iter() {
        writer.serialize(OperationalPeriodRow {
            project: project_id.clone(),
            period,
            capacity_type: capacity_type.to_string(),
        })?;
    }
    writer.flush()?;

    Ok(())
}

/// Represents a row in the capacity CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CapacityRow {
    subproblem: u32,
    project: ProjectID,
    period: u32,
    capacity_mw: f64,
    energy_capacity_mwh: Option<f64>,
    capacity_cost: f64,
}

/// Represents a row in the new build CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct NewBuildRow {
    subproblem: u32,
    project: ProjectID,
    vintage: u32,
    new_build_mw: f64,
    new_build_mwh: f64,
}

/// Represents a row in the dispatch CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct DispatchRow {
    subproblem: u32,
    project: ProjectID,
    timepoint: u32,
    period: u32,
    power_mw: f64,
    variable_om_cost: f64,
}

/// Represents a row in the load balance CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct LoadBalanceRow {
    subproblem: u32,
    zone: ZoneID,
    timepoint: u32,
    load_mw: f64,
    production_mw: f64,
    unserved_energy_mw: f64,
    overgeneration_mw: f64,
}

/// Represents a row in the objective CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ObjectiveRow {
    subproblem: u32,
    objective_value: f64,
}

/// Represents a row in the model summary CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ModelSummaryRow {
    subproblem: u32,
    component: ComponentName,
    kind: String,
    count: usize,
}

/// Reads values from a solved model
struct SolvedModel<'a> {
    model: &'a AssembledModel,
    solution: &'a Solution,
}

impl SolvedModel<'_> {
    fn value(&self, name: &str, index: &ComponentIndex) -> Result<f64> {
        self.solution
            .value(self.model, name, index)
            .with_context(|| format!("No value for {name}{index}"))
    }
}

/// For writing extra debug information about the model
struct DebugDataWriter {
    model_summary_writer: csv::Writer<File>,
}

impl DebugDataWriter {
    /// Open CSV files to write debug info to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    fn create(output_path: &Path) -> Result<Self> {
        Ok(Self {
            model_summary_writer: csv::Writer::from_path(
                output_path.join(MODEL_SUMMARY_FILE_NAME),
            )?,
        })
    }

    /// Write the number of members of each component family
    fn write_model_summary(
        &mut self,
        subproblem: u32,
        summary: &[(ComponentName, ComponentKind, usize)],
    ) -> Result<()> {
        for (component, kind, count) in summary {
            self.model_summary_writer.serialize(ModelSummaryRow {
                subproblem,
                component: component.clone(),
                kind: kind.to_string(),
                count: *count,
            })?;
        }

        Ok(())
    }

    /// Flush the underlying streams
    fn flush(&mut self) -> Result<()> {
        self.model_summary_writer.flush()?;

        Ok(())
    }
}

/// An object for writing the results of subproblems to file
pub struct DataWriter {
    capacity_writer: csv::Writer<File>,
    new_build_writer: csv::Writer<File>,
    dispatch_writer: csv::Writer<File>,
    load_balance_writer: csv::Writer<File>,
    objective_writer: csv::Writer<File>,
    debug_writer: Option<DebugDataWriter>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `save_debug_info` - Whether to include extra CSV files for debugging the model
    pub fn create(output_path: &Path, save_debug_info: bool) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(file_path)
        };

        let debug_writer = if save_debug_info {
            Some(DebugDataWriter::create(output_path)?)
        } else {
            None
        };

        Ok(Self {
            capacity_writer: new_writer(CAPACITY_FILE_NAME)?,
            new_build_writer: new_writer(NEW_BUILD_FILE_NAME)?,
            dispatch_writer: new_writer(DISPATCH_FILE_NAME)?,
            load_balance_writer: new_writer(LOAD_BALANCE_FILE_NAME)?,
            objective_writer: new_writer(OBJECTIVE_FILE_NAME)?,
            debug_writer,
        })
    }

    /// Write all results for a solved subproblem
    ///
    /// # Arguments
    ///
    /// * `ctx` - The context the subproblem's model was built with
    /// * `capacity_types` - The capacity types used by the scenario's projects
    /// * `built` - The model
    /// * `solution` - The solution to the model
    pub fn write_results(
        &mut self,
        ctx: &BuildContext,
        capacity_types: &[Box<dyn CapacityType>],
        built: &BuiltModel,
        solution: &Solution,
    ) -> Result<()> {
        let solved = SolvedModel {
            model: &built.model,
            solution,
        };
        let subproblem = ctx.subproblem.id;
        self.write_capacity(ctx, &solved)?;
        for capacity_type in capacity_types {
            for new_build in capacity_type.new_builds(ctx, &built.model, solution.columns()) {
                self.new_build_writer.serialize(NewBuildRow {
                    subproblem,
                    project: new_build.project,
                    vintage: new_build.vintage,
                    new_build_mw: new_build.new_build_mw,
                    new_build_mwh: new_build.new_build_mwh,
                })?;
            }
        }
        self.write_dispatch(ctx, &solved)?;
        self.write_load_balance(ctx, &solved)?;
        self.objective_writer.serialize(ObjectiveRow {
            subproblem,
            objective_value: solution.objective_value(),
        })?;
        if let Some(ref mut wtr) = self.debug_writer {
            wtr.write_model_summary(subproblem, &built.summary)?;
        }

        Ok(())
    }

    /// Write the capacity of every project operational in the subproblem
    fn write_capacity(&mut self, ctx: &BuildContext, solved: &SolvedModel) -> Result<()> {
        for (project_id, period, _) in ctx.operational_periods.iter() {
            if !ctx.periods().contains(&period) {
                continue;
            }

            let index = ComponentIndex::ProjectPeriod(project_id.clone(), period);
            self.capacity_writer.serialize(CapacityRow {
                subproblem: ctx.subproblem.id,
                project: project_id.clone(),
                period,
                capacity_mw: solved.value(CAPACITY_MW, &index)?,
                energy_capacity_mwh: solved.value(ENERGY_CAPACITY_MWH, &index).ok(),
                capacity_cost: solved.value(CAPACITY_COST, &index)?,
            })?;
        }

        Ok(())
    }

    /// Write the power output of every project in every operational timepoint
    fn write_dispatch(&mut self, ctx: &BuildContext, solved: &SolvedModel) -> Result<()> {
        for project_id in ctx.scenario.projects.keys() {
            for timepoint in ctx.operational_timepoints(project_id) {
                let index = ComponentIndex::ProjectTimepoint(project_id.clone(), timepoint.id);
                self.dispatch_writer.serialize(DispatchRow {
                    subproblem: ctx.subproblem.id,
                    project: project_id.clone(),
                    timepoint: timepoint.id,
                    period: timepoint.period,
                    power_mw: solved.value(POWER_PROVISION_MW, &index)?,
                    variable_om_cost: solved.value(VARIABLE_OM_COST, &index)?,
                })?;
            }
        }

        Ok(())
    }

    /// Write the terms of the load balance in every zone and timepoint
    fn write_load_balance(&mut self, ctx: &BuildContext, solved: &SolvedModel) -> Result<()> {
        for zone_id in ctx.scenario.load_zones.keys() {
            for timepoint in ctx.timepoints() {
                let index = ComponentIndex::ZoneTimepoint(zone_id.clone(), timepoint.id);
                self.load_balance_writer.serialize(LoadBalanceRow {
                    subproblem: ctx.subproblem.id,
                    zone: zone_id.clone(),
                    timepoint: timepoint.id,
                    load_mw: solved.value(STATIC_LOAD_MW, &index)?,
                    production_mw: solved.value(POWER_PRODUCTION_IN_ZONE_MW, &index)?,
                    unserved_energy_mw: solved.value(UNSERVED_ENERGY_MW, &index)?,
                    overgeneration_mw: solved.value(OVERGENERATION_MW, &index)?,
                })?;
            }
        }

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.capacity_writer.flush()?;
        self.new_build_writer.flush()?;
        self.dispatch_writer.flush()?;
        self.load_balance_writer.flush()?;
        self.objective_writer.flush()?;
        if let Some(ref mut wtr) = self.debug_writer {
            wtr.flush()?;
        }

        Ok(())
    }
}
