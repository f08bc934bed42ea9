//! Projects are the generators and storage devices whose capacity and operations are optimised.
use crate::id::define_id_type;
use crate::temporal::BalancingType;
use crate::zone::ZoneID;
use indexmap::IndexMap;

define_id_type! {ProjectID}

/// A map of [`Project`]s, keyed by project ID
pub type ProjectMap = IndexMap<ProjectID, Project>;

/// A generator or storage device
#[derive(PartialEq, Debug, Clone)]
pub struct Project {
    /// A unique identifier for the project (e.g. "Battery1")
    pub id: ProjectID,
    /// Tag of the capacity type which determines how the project's capacity is modelled
    pub capacity_type: String,
    /// Tag of the operational type which determines how the project is dispatched
    pub operational_type: String,
    /// The load zone in which the project provides power
    pub load_zone: ZoneID,
    /// Variable operation and maintenance cost per MWh of power provided
    pub variable_om_cost_per_mwh: f64,
}

/// Iterate over the IDs of projects with the given operational type
pub fn projects_with_operational_type<'a>(
    projects: &'a ProjectMap,
    tag: &'a str,
) -> impl Iterator<Item = &'a ProjectID> {
    projects
        .values()
        .filter(move |project| project.operational_type == tag)
        .map(|project| &project.id)
}

/// Iterate over the IDs of projects with the given capacity type
pub fn projects_with_capacity_type<'a>(
    projects: &'a ProjectMap,
    tag: &'a str,
) -> impl Iterator<Item = &'a ProjectID> {
    projects
        .values()
        .filter(move |project| project.capacity_type == tag)
        .map(|project| &project.id)
}

/// Operational characteristics of projects, keyed by project ID
pub type OperationalCharsMap = IndexMap<ProjectID, OperationalChars>;

/// Operational characteristics of a project.
///
/// Which of these are used depends on the project's operational type.
#[derive(PartialEq, Debug, Clone)]
pub struct OperationalChars {
    /// The balancing type of the horizons over which the project's state is tracked
    pub balancing_type: Option<BalancingType>,
    /// Fraction of charged energy which is stored
    pub charging_efficiency: f64,
    /// Fraction of discharged energy which is delivered
    pub discharging_efficiency: f64,
    /// Minimum output as a fraction of committed capacity
    pub min_stable_level_fraction: f64,
    /// Cost of starting up a MW of capacity
    pub startup_cost_per_mw: f64,
}

impl Default for OperationalChars {
    fn default() -> Self {
        Self {
            balancing_type: None,
            charging_efficiency: 1.0,
            discharging_efficiency: 1.0,
            min_stable_level_fraction: 0.0,
            startup_cost_per_mw: 0.0,
        }
    }
}
