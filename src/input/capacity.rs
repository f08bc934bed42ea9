//! Code for reading the inputs of capacity types from CSV files.
use super::*;
use crate::capacity::new_build::{BuildLimits, BuildLimitsMap, VintageParams, VintageParamsMap};
use crate::capacity::specified::{SpecifiedCapacityMap, SpecifiedCapacityParams};
use crate::period::PeriodInfo;
use crate::project::{Project, ProjectID, ProjectMap};
use log::warn;
use serde::Deserialize;
use std::path::Path;

/// Get a project by ID, checking that it exists
fn get_project<'a>(projects: &'a ProjectMap, id: &str) -> Result<&'a Project> {
    projects
        .get(id)
        .with_context(|| format!("Unknown project {id}"))
}

#[derive(PartialEq, Debug, Deserialize)]
struct SpecifiedCapacityRaw {
    project: String,
    period: u32,
    specified_capacity_mw: f64,
    specified_capacity_mwh: Option<f64>,
    #[serde(default)]
    fixed_cost_per_mw_yr: f64,
    fixed_cost_per_mwh_yr: Option<f64>,
}

/// Read the specified capacity of projects with the given capacity type.
///
/// The file is shared between capacity types, so rows for projects of other types are ignored.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
/// * `projects` - All projects
/// * `tag` - The capacity type
/// * `periods` - All periods
/// * `storage` - Whether energy capacity must also be given
pub fn read_specified_capacity(
    file_path: &Path,
    projects: &ProjectMap,
    tag: &str,
    periods: &PeriodInfo,
    storage: bool,
) -> Result<SpecifiedCapacityMap> {
    let capacity_csv = read_csv(file_path)?;
    read_specified_capacity_from_iter(capacity_csv, projects, tag, periods, storage)
        .with_context(|| input_err_msg(file_path))
}

fn read_specified_capacity_from_iter<I>(
    iter: I,
    projects: &ProjectMap,
    tag: &str,
    periods: &PeriodInfo,
    storage: bool,
) -> Result<SpecifiedCapacityMap>
where
    I: Iterator<Item = SpecifiedCapacityRaw>,
{
    let mut map = SpecifiedCapacityMap::new();
    for raw in iter {
        let project = get_project(projects, &raw.project)?;
        if project.capacity_type != tag {
            continue;
        }
        ensure!(
            periods.contains(raw.period),
            "Unknown period {} for project {}",
            raw.period,
            project.id
        );
        check_non_negative(raw.specified_capacity_mw, "specified_capacity_mw")?;
        check_non_negative(raw.fixed_cost_per_mw_yr, "fixed_cost_per_mw_yr")?;

        let capacity_mwh = if storage {
            let capacity_mwh = raw.specified_capacity_mwh.with_context(|| {
                format!(
                    "Storage project {} requires specified_capacity_mwh in period {}",
                    project.id, raw.period
                )
            })?;
            check_non_negative(capacity_mwh, "specified_capacity_mwh")?;
            capacity_mwh
        } else {
            0.0
        };
        let fixed_cost_per_mwh_yr = raw.fixed_cost_per_mwh_yr.unwrap_or(0.0);
        check_non_negative(fixed_cost_per_mwh_yr, "fixed_cost_per_mwh_yr")?;

        let params = SpecifiedCapacityParams {
            capacity_mw: raw.specified_capacity_mw,
            capacity_mwh,
            fixed_cost_per_mw_yr: raw.fixed_cost_per_mw_yr,
            fixed_cost_per_mwh_yr,
        };
        ensure!(
            map.insert((project.id.clone(), raw.period), params)
                .is_none(),
            "Duplicate entry for project {} in period {}",
            project.id,
            raw.period
        );
    }

    Ok(map)
}

#[derive(PartialEq, Debug, Deserialize)]
struct VintageParamsRaw {
    project: String,
    vintage: u32,
    lifetime_yrs: f64,
    annualized_real_cost_per_mw_yr: f64,
    annualized_real_cost_per_mwh_yr: Option<f64>,
    min_duration_hrs: Option<f64>,
}

/// Read the lifetimes and costs of each vintage of projects with the given capacity type.
///
/// Every row must be for a project of this type.
pub fn read_vintage_params(
    file_path: &Path,
    projects: &ProjectMap,
    tag: &str,
    periods: &PeriodInfo,
    storage: bool,
) -> Result<VintageParamsMap> {
    let vintages_csv = read_csv(file_path)?;
    read_vintage_params_from_iter(vintages_csv, projects, tag, periods, storage)
        .with_context(|| input_err_msg(file_path))
}

fn read_vintage_params_from_iter<I>(
    iter: I,
    projects: &ProjectMap,
    tag: &str,
    periods: &PeriodInfo,
    storage: bool,
) -> Result<VintageParamsMap>
where
    I: Iterator<Item = VintageParamsRaw>,
{
    let mut map = VintageParamsMap::new();
    for raw in iter {
        let project = get_project(projects, &raw.project)?;
        ensure!(
            project.capacity_type == tag,
            "Project {} has capacity type {}, not {tag}",
            project.id,
            project.capacity_type
        );
        ensure!(
            periods.contains(raw.vintage),
            "Unknown vintage {} for project {}",
            raw.vintage,
            project.id
        );
        check_non_negative(raw.lifetime_yrs, "lifetime_yrs")
            .with_context(|| format!("Invalid vintage {} of project {}", raw.vintage, project.id))?;
        if raw.lifetime_yrs == 0.0 {
            warn!(
                "Vintage {} of project {} has a lifetime of zero so will never be operational",
                raw.vintage, project.id
            );
        }
        check_non_negative(
            raw.annualized_real_cost_per_mw_yr,
            "annualized_real_cost_per_mw_yr",
        )?;

        let (annualized_real_cost_per_mwh_yr, min_duration_hrs) = if storage {
            (
                raw.annualized_real_cost_per_mwh_yr.unwrap_or(0.0),
                raw.min_duration_hrs.unwrap_or(0.0),
            )
        } else {
            (0.0, 0.0)
        };
        check_non_negative(
            annualized_real_cost_per_mwh_yr,
            "annualized_real_cost_per_mwh_yr",
        )?;
        check_non_negative(min_duration_hrs, "min_duration_hrs")?;

        let params = VintageParams {
            lifetime_yrs: raw.lifetime_yrs,
            annualized_real_cost_per_mw_yr: raw.annualized_real_cost_per_mw_yr,
            annualized_real_cost_per_mwh_yr,
            min_duration_hrs,
        };
        ensure!(
            map.insert((project.id.clone(), raw.vintage), params)
                .is_none(),
            "Duplicate vintage {} for project {}",
            raw.vintage,
            project.id
        );
    }

    Ok(map)
}

#[derive(PartialEq, Debug, Deserialize)]
struct BuildLimitsRaw {
    project: String,
    period: u32,
    min_cumulative_new_build_mw: Option<f64>,
    max_cumulative_new_build_mw: Option<f64>,
}

/// Read limits on cumulative new build for projects with the given capacity type.
///
/// The file is optional and shared between capacity types.
pub fn read_build_limits(
    file_path: &Path,
    projects: &ProjectMap,
    tag: &str,
    periods: &PeriodInfo,
) -> Result<BuildLimitsMap> {
    let limits_csv = read_csv_optional(file_path)?;
    read_build_limits_from_iter(limits_csv, projects, tag, periods)
        .with_context(|| input_err_msg(file_path))
}

fn read_build_limits_from_iter<I>(
    iter: I,
    projects: &ProjectMap,
    tag: &str,
    periods: &PeriodInfo,
) -> Result<BuildLimitsMap>
where
    I: Iterator<Item = BuildLimitsRaw>,
{
    let mut map = BuildLimitsMap::new();
    for raw in iter {
        let project = get_project(projects, &raw.project)?;
        if project.capacity_type != tag {
            continue;
        }
        ensure!(
            periods.contains(raw.period),
            "Unknown period {} for project {}",
            raw.period,
            project.id
        );
        if let (Some(min), Some(max)) = (
            raw.min_cumulative_new_build_mw,
            raw.max_cumulative_new_build_mw,
        ) {
            ensure!(
                min <= max,
                "Minimum cumulative new build for project {} in period {} is greater than the \
                maximum",
                project.id,
                raw.period
            );
        }

        let limits = BuildLimits {
            min_cumulative_new_build_mw: raw.min_cumulative_new_build_mw,
            max_cumulative_new_build_mw: raw.max_cumulative_new_build_mw,
        };
        ensure!(
            map.insert((project.id.clone(), raw.period), limits)
                .is_none(),
            "Duplicate entry for project {} in period {}",
            project.id,
            raw.period
        );
    }

    Ok(map)
}
