//! The scenario: everything which is shared between the subproblems of a model run.
use crate::linkage::LinkedSubproblemsMap;
use crate::period::PeriodInfo;
use crate::project::{OperationalChars, OperationalCharsMap, ProjectID, ProjectMap};
use crate::temporal::TemporalInfo;
use crate::zone::LoadZoneMap;
use std::path::PathBuf;

pub mod parameters;
use parameters::{Feature, ScenarioParameters};

/// Scenario-level inputs
#[derive(Debug)]
pub struct Scenario {
    /// Directory containing the scenario's input files
    pub path: PathBuf,
    /// Scenario parameters from `scenario.toml`
    pub parameters: ScenarioParameters,
    /// Planning periods
    pub periods: PeriodInfo,
    /// Load zones
    pub load_zones: LoadZoneMap,
    /// Projects
    pub projects: ProjectMap,
    /// Operational characteristics of projects
    pub operational_chars: OperationalCharsMap,
    /// Which timepoints of each subproblem carry their state over to the next
    pub linked_subproblems: LinkedSubproblemsMap,
}

impl Scenario {
    /// Path to the directory containing the inputs for a subproblem
    pub fn subproblem_dir(&self, subproblem: u32) -> PathBuf {
        self.path.join(subproblem.to_string())
    }

    /// Operational characteristics of a project (the defaults if none were given)
    pub fn operational_chars(&self, project_id: &ProjectID) -> OperationalChars {
        self.operational_chars
            .get(project_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether an optional feature is enabled
    pub fn has_feature(&self, feature: Feature) -> bool {
        self.parameters.has_feature(feature)
    }
}

/// A subproblem: one independently solved time segment of the scenario
#[derive(Debug)]
pub struct Subproblem {
    /// The subproblem's ID
    pub id: u32,
    /// Directory containing the subproblem's input files
    pub path: PathBuf,
    /// Timepoints and horizons
    pub temporal: TemporalInfo,
}

impl Subproblem {
    /// Path to an input file for this subproblem
    pub fn file_path(&self, file_name: &str) -> PathBuf {
        self.path.join(file_name)
    }
}
