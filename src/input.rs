//! Common routines for handling input data.
use crate::scenario::parameters::ScenarioParameters;
use crate::scenario::{Scenario, Subproblem};
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use serde::de::{Deserialize, DeserializeOwned, Deserializer};
use std::fs;
use std::path::Path;

pub mod capacity;
pub mod linkage;
pub mod operations;
pub mod period;
pub mod project;
pub mod system;
pub mod temporal;
pub mod zone;
use linkage::read_linked_subproblems_map;
use period::read_periods;
use project::{read_operational_chars, read_projects};
use temporal::read_temporal_info;
use zone::read_load_zones;

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<T: DeserializeOwned>(file_path: &Path) -> Result<impl Iterator<Item = T>> {
    let vec = read_csv_internal(file_path)?;
    ensure!(
        !vec.is_empty(),
        "CSV file {} cannot be empty",
        file_path.display()
    );

    Ok(vec.into_iter())
}

/// Read a series of type `T`s from a CSV file.
///
/// Unlike [`read_csv`], a missing or empty file is not an error; an empty iterator is returned.
pub fn read_csv_optional<T: DeserializeOwned>(file_path: &Path) -> Result<impl Iterator<Item = T>> {
    if !file_path.exists() {
        return Ok(Vec::new().into_iter());
    }

    Ok(read_csv_internal(file_path)?.into_iter())
}

fn read_csv_internal<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?
        .into_deserialize()
        .process_results(|iter| iter.collect_vec())
        .with_context(|| input_err_msg(file_path))?;

    Ok(vec)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Check whether an iterator contains values that are sorted and unique
pub fn is_sorted_and_unique<T, I>(iter: I) -> bool
where
    T: PartialOrd + Clone,
    I: IntoIterator<Item = T>,
{
    iter.into_iter().tuple_windows().all(|(a, b)| a < b)
}

/// Read an f64, checking that it is between 0 and 1
pub fn deserialise_proportion<'de, D>(deserialiser: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value: f64 = Deserialize::deserialize(deserialiser)?;
    if !(0.0..=1.0).contains(&value) {
        Err(serde::de::Error::custom("Value must be between 0 and 1"))?;
    }

    Ok(value)
}

/// Read an f64, checking that it is between 0 and 1 (exclusive of 0)
pub fn deserialise_proportion_nonzero<'de, D>(deserialiser: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = deserialise_proportion(deserialiser)?;
    if value == 0.0 {
        Err(serde::de::Error::custom("Value cannot be zero"))?;
    }

    Ok(value)
}

/// Read the scenario-level inputs from the specified directory.
///
/// Subproblem inputs are read separately with [`load_subproblem`], as they are only needed when
/// the subproblem is built.
///
/// # Arguments
///
/// * `scenario_dir` - Folder containing scenario input files
pub fn load_scenario<P: AsRef<Path>>(scenario_dir: P) -> Result<Scenario> {
    let scenario_dir = scenario_dir.as_ref();
    let parameters = ScenarioParameters::from_path(scenario_dir)?;
    let periods = read_periods(scenario_dir)?;
    let load_zones = read_load_zones(scenario_dir)?;
    let projects = read_projects(scenario_dir, &load_zones)?;
    let operational_chars = read_operational_chars(scenario_dir, &projects)?;
    let linked_subproblems = read_linked_subproblems_map(scenario_dir, &parameters)?;

    Ok(Scenario {
        path: scenario_dir.to_path_buf(),
        parameters,
        periods,
        load_zones,
        projects,
        operational_chars,
        linked_subproblems,
    })
}

/// Read the inputs for one subproblem of a scenario
pub fn load_subproblem(scenario: &Scenario, subproblem: u32) -> Result<Subproblem> {
    let path = scenario.subproblem_dir(subproblem);
    ensure!(
        path.is_dir(),
        "Input directory for subproblem {subproblem} not found: {}",
        path.display()
    );
    let temporal = read_temporal_info(&path, &scenario.periods)?;

    Ok(Subproblem {
        id: subproblem,
        path,
        temporal,
    })
}

/// Check that a value is a finite number which is not negative
pub fn check_non_negative(value: f64, name: &str) -> Result<()> {
    ensure!(
        value.is_finite() && value >= 0.0,
        "{name} must be a finite number greater than or equal to zero (got {value})"
    );

    Ok(())
}

/// Check that a value is a finite number greater than zero
pub fn check_positive(value: f64, name: &str) -> Result<()> {
    ensure!(
        value.is_finite() && value > 0.0,
        "{name} must be a finite number greater than zero (got {value})"
    );

    Ok(())
}
