//! Code for reading load and policy requirements from CSV files.
use super::*;
use crate::period::PeriodInfo;
use crate::project::{ProjectID, ProjectMap};
use crate::temporal::TemporalInfo;
use crate::zone::{LoadZoneMap, ZoneID};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

/// Values keyed by zone and a time index (a period or timepoint)
pub type ZoneTimeMap = IndexMap<(ZoneID, u32), f64>;

/// Project membership of zones, with an associated value (e.g. emissions intensity)
pub type ProjectZoneMap = IndexMap<ProjectID, (ZoneID, f64)>;

#[derive(PartialEq, Debug, Deserialize)]
struct LoadRaw {
    load_zone: String,
    timepoint: u32,
    load_mw: f64,
}

/// Read the static load in every load zone and timepoint of a subproblem.
///
/// Every combination of load zone and timepoint must be given.
pub fn read_load(
    file_path: &Path,
    load_zones: &LoadZoneMap,
    temporal: &TemporalInfo,
) -> Result<ZoneTimeMap> {
    let load_csv = read_csv(file_path)?;
    read_load_from_iter(load_csv, load_zones, temporal).with_context(|| input_err_msg(file_path))
}

fn read_load_from_iter<I>(iter: I, load_zones: &LoadZoneMap, temporal: &TemporalInfo) -> Result<ZoneTimeMap>
where
    I: Iterator<Item = LoadRaw>,
{
    let load = collect_zone_values(
        iter.map(|raw| (raw.load_zone, raw.timepoint, raw.load_mw)),
        |zone| load_zones.get_key_value(zone).map(|(id, _)| id.clone()),
        |timepoint| {
            ensure!(
                temporal.timepoint(timepoint).is_some(),
                "Unknown timepoint {timepoint}"
            );
            Ok(())
        },
    )?;

    for zone_id in load_zones.keys() {
        for timepoint in temporal.iter_timepoints() {
            ensure!(
                load.contains_key(&(zone_id.clone(), timepoint.id)),
                "Missing load for zone {zone_id} in timepoint {}",
                timepoint.id
            );
        }
    }

    Ok(load)
}

/// Collect non-negative values keyed by zone and time index, checking for duplicates
fn collect_zone_values<I, Z, T>(iter: I, get_zone: Z, check_time: T) -> Result<ZoneTimeMap>
where
    I: Iterator<Item = (String, u32, f64)>,
    Z: Fn(&str) -> Option<ZoneID>,
    T: Fn(u32) -> Result<()>,
{
    let mut map = ZoneTimeMap::new();
    for (zone, time, value) in iter {
        let zone_id = get_zone(&zone).with_context(|| format!("Unknown zone {zone}"))?;
        check_time(time)?;
        check_non_negative(value, "value")
            .with_context(|| format!("Invalid value for zone {zone_id} at {time}"))?;
        ensure!(
            map.insert((zone_id.clone(), time), value).is_none(),
            "Duplicate entry for zone {zone_id} at {time}"
        );
    }

    Ok(map)
}

/// Collect the zone of each project, with an associated value
fn collect_project_zones<I, Z>(iter: I, projects: &ProjectMap, get_zone: Z) -> Result<ProjectZoneMap>
where
    I: Iterator<Item = (String, String, f64)>,
    Z: Fn(&str) -> Option<ZoneID>,
{
    let mut map = ProjectZoneMap::new();
    for (project, zone, value) in iter {
        let (project_id, _) = projects
            .get_key_value(project.as_str())
            .with_context(|| format!("Unknown project {project}"))?;
        let zone_id = get_zone(&zone).with_context(|| format!("Unknown zone {zone}"))?;
        check_non_negative(value, "value")
            .with_context(|| format!("Invalid value for project {project_id}"))?;
        ensure!(
            map.insert(project_id.clone(), (zone_id, value)).is_none(),
            "Project {project_id} is assigned to more than one zone"
        );
    }

    Ok(map)
}

/// Look up a zone in a map of zones
fn zone_getter<T>(zones: &IndexMap<ZoneID, T>) -> impl Fn(&str) -> Option<ZoneID> + '_ {
    |zone| zones.get_key_value(zone).map(|(id, _)| id.clone())
}

/// Check that a period exists
fn period_checker(periods: &PeriodInfo) -> impl Fn(u32) -> Result<()> + '_ {
    |period| {
        ensure!(periods.contains(period), "Unknown period {period}");
        Ok(())
    }
}

#[derive(PartialEq, Debug, Deserialize)]
struct ReserveProjectRaw {
    project: String,
    balancing_area: String,
}

/// Read the balancing area in which each contributing project provides a reserve
pub fn read_reserve_projects<T>(
    file_path: &Path,
    projects: &ProjectMap,
    balancing_areas: &IndexMap<ZoneID, T>,
) -> Result<IndexMap<ProjectID, ZoneID>> {
    let projects_csv = read_csv::<ReserveProjectRaw>(file_path)?;
    let map = collect_project_zones(
        projects_csv.map(|raw| (raw.project, raw.balancing_area, 0.0)),
        projects,
        zone_getter(balancing_areas),
    )
    .with_context(|| input_err_msg(file_path))?;

    Ok(map
        .into_iter()
        .map(|(project_id, (zone_id, _))| (project_id, zone_id))
        .collect())
}

#[derive(PartialEq, Debug, Deserialize)]
struct ReserveRequirementRaw {
    balancing_area: String,
    timepoint: u32,
    requirement_mw: f64,
}

/// Read the reserve requirement for balancing areas in each timepoint of a subproblem.
///
/// Timepoints without an entry have no requirement.
pub fn read_reserve_requirements<T>(
    file_path: &Path,
    balancing_areas: &IndexMap<ZoneID, T>,
    temporal: &TemporalInfo,
) -> Result<ZoneTimeMap> {
    let requirements_csv = read_csv_optional::<ReserveRequirementRaw>(file_path)?;
    collect_zone_values(
        requirements_csv.map(|raw| (raw.balancing_area, raw.timepoint, raw.requirement_mw)),
        zone_getter(balancing_areas),
        |timepoint| {
            ensure!(
                temporal.timepoint(timepoint).is_some(),
                "Unknown timepoint {timepoint}"
            );
            Ok(())
        },
    )
    .with_context(|| input_err_msg(file_path))
}

#[derive(PartialEq, Debug, Deserialize)]
struct CarbonCapProjectRaw {
    project: String,
    carbon_cap_zone: String,
    intensity_tco2_per_mwh: f64,
}

/// Read the carbon cap zone and emissions intensity of each emitting project
pub fn read_carbon_cap_projects<T>(
    file_path: &Path,
    projects: &ProjectMap,
    zones: &IndexMap<ZoneID, T>,
) -> Result<ProjectZoneMap> {
    let projects_csv = read_csv::<CarbonCapProjectRaw>(file_path)?;
    collect_project_zones(
        projects_csv.map(|raw| (raw.project, raw.carbon_cap_zone, raw.intensity_tco2_per_mwh)),
        projects,
        zone_getter(zones),
    )
    .with_context(|| input_err_msg(file_path))
}

#[derive(PartialEq, Debug, Deserialize)]
struct CarbonCapTargetRaw {
    carbon_cap_zone: String,
    period: u32,
    carbon_cap_tco2: f64,
}

/// Read the emissions cap for carbon cap zones in each period
pub fn read_carbon_cap_targets<T>(
    file_path: &Path,
    zones: &IndexMap<ZoneID, T>,
    periods: &PeriodInfo,
) -> Result<ZoneTimeMap> {
    let targets_csv = read_csv::<CarbonCapTargetRaw>(file_path)?;
    collect_zone_values(
        targets_csv.map(|raw| (raw.carbon_cap_zone, raw.period, raw.carbon_cap_tco2)),
        zone_getter(zones),
        period_checker(periods),
    )
    .with_context(|| input_err_msg(file_path))
}

#[derive(PartialEq, Debug, Deserialize)]
struct LocalCapacityProjectRaw {
    project: String,
    local_capacity_zone: String,
    #[serde(deserialize_with = "deserialise_proportion")]
    local_capacity_fraction: f64,
}

/// Read the local capacity zone of each contributing project and the fraction of its capacity
/// which counts towards the requirement
pub fn read_local_capacity_projects<T>(
    file_path: &Path,
    projects: &ProjectMap,
    zones: &IndexMap<ZoneID, T>,
) -> Result<ProjectZoneMap> {
    let projects_csv = read_csv::<LocalCapacityProjectRaw>(file_path)?;
    collect_project_zones(
        projects_csv.map(|raw| (raw.project, raw.local_capacity_zone, raw.local_capacity_fraction)),
        projects,
        zone_getter(zones),
    )
    .with_context(|| input_err_msg(file_path))
}

#[derive(PartialEq, Debug, Deserialize)]
struct LocalCapacityRequirementRaw {
    local_capacity_zone: String,
    period: u32,
    local_capacity_requirement_mw: f64,
}

/// Read the local capacity requirement for local capacity zones in each period
pub fn read_local_capacity_requirements<T>(
    file_path: &Path,
    zones: &IndexMap<ZoneID, T>,
    periods: &PeriodInfo,
) -> Result<ZoneTimeMap> {
    let requirements_csv = read_csv::<LocalCapacityRequirementRaw>(file_path)?;
    collect_zone_values(
        requirements_csv.map(|raw| {
            (
                raw.local_capacity_zone,
                raw.period,
                raw.local_capacity_requirement_mw,
            )
        }),
        zone_getter(zones),
        period_checker(periods),
    )
    .with_context(|| input_err_msg(file_path))
}
