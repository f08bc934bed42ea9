//! Code for reading the inputs of operational types from CSV files.
use super::*;
use crate::project::{ProjectID, ProjectMap};
use crate::temporal::TemporalInfo;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

/// Capacity factors, keyed by project and timepoint
pub type CapacityFactorMap = IndexMap<(ProjectID, u32), f64>;

#[derive(PartialEq, Debug, Deserialize)]
struct VariableProfileRaw {
    project: String,
    timepoint: u32,
    cap_factor: f64,
}

/// Read the capacity factors of variable generators for a subproblem.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
/// * `projects` - All projects
/// * `tag` - The operational type whose projects the profiles are for
/// * `temporal` - The subproblem's timepoints
pub fn read_variable_profiles(
    file_path: &Path,
    projects: &ProjectMap,
    tag: &str,
    temporal: &TemporalInfo,
) -> Result<CapacityFactorMap> {
    let profiles_csv = read_csv(file_path)?;
    read_variable_profiles_from_iter(profiles_csv, projects, tag, temporal)
        .with_context(|| input_err_msg(file_path))
}

fn read_variable_profiles_from_iter<I>(
    iter: I,
    projects: &ProjectMap,
    tag: &str,
    temporal: &TemporalInfo,
) -> Result<CapacityFactorMap>
where
    I: Iterator<Item = VariableProfileRaw>,
{
    let mut map = CapacityFactorMap::new();
    for raw in iter {
        let project = projects
            .get(raw.project.as_str())
            .with_context(|| format!("Unknown project {}", raw.project))?;
        ensure!(
            project.operational_type == tag,
            "Project {} has operational type {}, not {tag}",
            project.id,
            project.operational_type
        );
        ensure!(
            temporal.timepoint(raw.timepoint).is_some(),
            "Unknown timepoint {}",
            raw.timepoint
        );
        check_non_negative(raw.cap_factor, "cap_factor")?;

        ensure!(
            map.insert((project.id.clone(), raw.timepoint), raw.cap_factor)
                .is_none(),
            "Duplicate capacity factor for project {} in timepoint {}",
            project.id,
            raw.timepoint
        );
    }

    Ok(map)
}
