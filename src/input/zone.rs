//! Code for reading load zones and policy zones from CSV files.
use super::*;
use crate::id::IDCollection;
use crate::zone::{LoadZone, LoadZoneMap, PolicyZone, PolicyZoneMap, ZoneID};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::path::Path;

const LOAD_ZONES_FILE_NAME: &str = "load_zones.csv";

#[derive(PartialEq, Debug, Deserialize)]
struct LoadZoneRaw {
    load_zone: String,
    allow_unserved_energy: bool,
    #[serde(default)]
    unserved_energy_penalty_per_mwh: f64,
    allow_overgeneration: bool,
    #[serde(default)]
    overgeneration_penalty_per_mwh: f64,
}

/// Read load zones from the scenario directory
pub fn read_load_zones(scenario_dir: &Path) -> Result<LoadZoneMap> {
    let file_path = scenario_dir.join(LOAD_ZONES_FILE_NAME);
    let zones_csv = read_csv(&file_path)?;
    read_load_zones_from_iter(zones_csv).with_context(|| input_err_msg(&file_path))
}

fn read_load_zones_from_iter<I>(iter: I) -> Result<LoadZoneMap>
where
    I: Iterator<Item = LoadZoneRaw>,
{
    let mut zones = LoadZoneMap::new();
    for raw in iter {
        check_non_negative(
            raw.unserved_energy_penalty_per_mwh,
            "unserved_energy_penalty_per_mwh",
        )?;
        check_non_negative(
            raw.overgeneration_penalty_per_mwh,
            "overgeneration_penalty_per_mwh",
        )?;

        let id: ZoneID = raw.load_zone.into();
        let zone = LoadZone {
            id: id.clone(),
            allow_unserved_energy: raw.allow_unserved_energy,
            unserved_energy_penalty_per_mwh: raw.unserved_energy_penalty_per_mwh,
            allow_overgeneration: raw.allow_overgeneration,
            overgeneration_penalty_per_mwh: raw.overgeneration_penalty_per_mwh,
        };
        ensure!(
            zones.insert(id.clone(), zone).is_none(),
            "Duplicate load zone {id}"
        );
    }

    Ok(zones)
}

#[derive(PartialEq, Debug, Deserialize)]
struct PolicyZoneRaw {
    zone: String,
    allow_violation: bool,
    #[serde(default)]
    violation_penalty: f64,
}

/// Read zones for a policy or reserve requirement (carbon cap zones, balancing areas, etc.).
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_policy_zones(file_path: &Path) -> Result<PolicyZoneMap> {
    let zones_csv = read_csv(file_path)?;
    read_policy_zones_from_iter(zones_csv).with_context(|| input_err_msg(file_path))
}

fn read_policy_zones_from_iter<I>(iter: I) -> Result<PolicyZoneMap>
where
    I: Iterator<Item = PolicyZoneRaw>,
{
    let mut zones = PolicyZoneMap::new();
    for raw in iter {
        check_non_negative(raw.violation_penalty, "violation_penalty")?;
        let id: ZoneID = raw.zone.into();
        let zone = PolicyZone {
            id: id.clone(),
            allow_violation: raw.allow_violation,
            violation_penalty: raw.violation_penalty,
        };
        ensure!(
            zones.insert(id.clone(), zone).is_none(),
            "Duplicate zone {id}"
        );
    }

    Ok(zones)
}

/// Get the IDs of the zones in a map, for looking up references in other files
pub fn zone_ids<T>(zones: &IndexMap<ZoneID, T>) -> IndexSet<ZoneID> {
    zones.keys().cloned().collect()
}

/// Look up a zone by name, with a more helpful error message than [`IDCollection::get_id_by_str`]
pub fn get_zone_id(zone_ids: &IndexSet<ZoneID>, zone: &str) -> Result<ZoneID> {
    zone_ids
        .get_id_by_str(zone)
        .with_context(|| format!("Unknown zone {zone}"))
}
