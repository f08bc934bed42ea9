//! Code for reading projects and their operational characteristics from CSV files.
use super::*;
use crate::project::{OperationalChars, OperationalCharsMap, Project, ProjectID, ProjectMap};
use crate::temporal::BalancingType;
use crate::zone::LoadZoneMap;
use serde::Deserialize;
use std::path::Path;

const PROJECTS_FILE_NAME: &str = "projects.csv";
const OPERATIONAL_CHARS_FILE_NAME: &str = "operational_chars.csv";

#[derive(PartialEq, Debug, Deserialize)]
struct ProjectRaw {
    project: String,
    capacity_type: String,
    operational_type: String,
    load_zone: String,
    #[serde(default)]
    variable_om_cost_per_mwh: f64,
}

/// Read projects from the scenario directory.
///
/// # Arguments
///
/// * `scenario_dir` - Folder containing scenario input files
/// * `load_zones` - All load zones
pub fn read_projects(scenario_dir: &Path, load_zones: &LoadZoneMap) -> Result<ProjectMap> {
    let file_path = scenario_dir.join(PROJECTS_FILE_NAME);
    let projects_csv = read_csv(&file_path)?;
    read_projects_from_iter(projects_csv, load_zones).with_context(|| input_err_msg(&file_path))
}

fn read_projects_from_iter<I>(iter: I, load_zones: &LoadZoneMap) -> Result<ProjectMap>
where
    I: Iterator<Item = ProjectRaw>,
{
    let mut projects = ProjectMap::new();
    for raw in iter {
        let id: ProjectID = raw.project.into();
        let (load_zone, _) = load_zones
            .get_key_value(raw.load_zone.as_str())
            .with_context(|| format!("Project {id} is in unknown load zone {}", raw.load_zone))?;
        check_non_negative(raw.variable_om_cost_per_mwh, "variable_om_cost_per_mwh")
            .with_context(|| format!("Invalid project {id}"))?;

        let project = Project {
            id: id.clone(),
            capacity_type: raw.capacity_type,
            operational_type: raw.operational_type,
            load_zone: load_zone.clone(),
            variable_om_cost_per_mwh: raw.variable_om_cost_per_mwh,
        };
        ensure!(
            projects.insert(id.clone(), project).is_none(),
            "Duplicate project {id}"
        );
    }

    Ok(projects)
}

#[derive(PartialEq, Debug, Deserialize)]
struct OperationalCharsRaw {
    project: String,
    balancing_type: Option<String>,
    charging_efficiency: Option<f64>,
    discharging_efficiency: Option<f64>,
    min_stable_level_fraction: Option<f64>,
    startup_cost_per_mw: Option<f64>,
}

/// Read operational characteristics of projects.
///
/// The file is optional. Projects without an entry get the default characteristics.
pub fn read_operational_chars(
    scenario_dir: &Path,
    projects: &ProjectMap,
) -> Result<OperationalCharsMap> {
    let file_path = scenario_dir.join(OPERATIONAL_CHARS_FILE_NAME);
    let chars_csv = read_csv_optional(&file_path)?;
    read_operational_chars_from_iter(chars_csv, projects)
        .with_context(|| input_err_msg(&file_path))
}

fn read_operational_chars_from_iter<I>(iter: I, projects: &ProjectMap) -> Result<OperationalCharsMap>
where
    I: Iterator<Item = OperationalCharsRaw>,
{
    let mut map = OperationalCharsMap::new();
    for raw in iter {
        let (id, _) = projects
            .get_key_value(raw.project.as_str())
            .with_context(|| format!("Unknown project {}", raw.project))?;

        let defaults = OperationalChars::default();
        let chars = OperationalChars {
            balancing_type: raw.balancing_type.map(BalancingType::from),
            charging_efficiency: raw
                .charging_efficiency
                .unwrap_or(defaults.charging_efficiency),
            discharging_efficiency: raw
                .discharging_efficiency
                .unwrap_or(defaults.discharging_efficiency),
            min_stable_level_fraction: raw
                .min_stable_level_fraction
                .unwrap_or(defaults.min_stable_level_fraction),
            startup_cost_per_mw: raw
                .startup_cost_per_mw
                .unwrap_or(defaults.startup_cost_per_mw),
        };
        check_operational_chars(&chars)
            .with_context(|| format!("Invalid operational characteristics for project {id}"))?;

        ensure!(
            map.insert(id.clone(), chars).is_none(),
            "Duplicate operational characteristics for project {id}"
        );
    }

    Ok(map)
}

fn check_operational_chars(chars: &OperationalChars) -> Result<()> {
    for (value, name) in [
        (chars.charging_efficiency, "charging_efficiency"),
        (chars.discharging_efficiency, "discharging_efficiency"),
    ] {
        ensure!(
            value > 0.0 && value <= 1.0,
            "{name} must be greater than zero and no more than one (got {value})"
        );
    }
    ensure!(
        (0.0..=1.0).contains(&chars.min_stable_level_fraction),
        "min_stable_level_fraction must be between zero and one (got {})",
        chars.min_stable_level_fraction
    );
    check_non_negative(chars.startup_cost_per_mw, "startup_cost_per_mw")
}
