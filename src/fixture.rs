//! Fixtures for tests
use crate::capacity::{OperationalPeriodsBuilder, ProjectOperationalPeriods};
use crate::linkage::LinkedSubproblemsMap;
use crate::period::{Period, PeriodInfo};
use crate::project::{OperationalCharsMap, Project, ProjectMap};
use crate::scenario::parameters::ScenarioParameters;
use crate::scenario::{Scenario, Subproblem};
use crate::temporal::{BoundaryType, Horizon, LinkedTimepoint, TemporalInfo, Timepoint};
use crate::zone::{LoadZone, LoadZoneMap, PolicyZone};
use rstest::fixture;
use std::path::PathBuf;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// Five-year periods from 2020 to 2040, each with a discount factor of 1
#[fixture]
pub fn periods() -> PeriodInfo {
    PeriodInfo::new((2020..=2040).step_by(5).map(|id| Period {
        id,
        start_year: id,
        end_year: id + 5,
        discount_factor: 1.0,
        number_years_represented: 5.0,
    }))
    .unwrap()
}

/// Four one-hour timepoints in 2020
#[fixture]
pub fn timepoints() -> Vec<Timepoint> {
    (1..=4)
        .map(|id| Timepoint {
            id,
            period: 2020,
            hours: 1.0,
            weight: 1.0,
        })
        .collect()
}

/// Create a horizon
pub fn horizon(
    balancing_type: &str,
    id: u32,
    boundary: BoundaryType,
    timepoints: &[u32],
) -> Horizon {
    Horizon {
        id,
        balancing_type: balancing_type.into(),
        boundary,
        timepoints: timepoints.to_vec(),
    }
}

/// Create a policy zone
pub fn policy_zone(id: &str, allow_violation: bool, violation_penalty: f64) -> PolicyZone {
    PolicyZone {
        id: id.into(),
        allow_violation,
        violation_penalty,
    }
}

#[fixture]
pub fn load_zones() -> LoadZoneMap {
    let zone = LoadZone {
        id: "Zone1".into(),
        allow_unserved_energy: true,
        unserved_energy_penalty_per_mwh: 1000.0,
        allow_overgeneration: true,
        overgeneration_penalty_per_mwh: 500.0,
    };
    [(zone.id.clone(), zone)].into_iter().collect()
}

/// One project of each operational type, all in `Zone1`
#[fixture]
pub fn projects() -> ProjectMap {
    [
        ("Battery1", "stor_new_lin", "stor"),
        ("Wind", "gen_spec", "gen_var"),
        ("Coal", "gen_spec", "gen_commit_cap"),
        ("Nuclear", "gen_spec", "gen_must_run"),
    ]
    .into_iter()
    .map(|(id, capacity_type, operational_type)| {
        let project = Project {
            id: id.into(),
            capacity_type: capacity_type.into(),
            operational_type: operational_type.into(),
            load_zone: "Zone1".into(),
            variable_om_cost_per_mwh: 0.0,
        };
        (project.id.clone(), project)
    })
    .collect()
}

#[fixture]
pub fn scenario(periods: PeriodInfo, load_zones: LoadZoneMap, projects: ProjectMap) -> Scenario {
    Scenario {
        path: PathBuf::new(),
        parameters: ScenarioParameters {
            subproblems: vec![1],
            features: Vec::new(),
        },
        periods,
        load_zones,
        projects,
        operational_chars: OperationalCharsMap::new(),
        linked_subproblems: LinkedSubproblemsMap::default(),
    }
}

/// Subproblem 1, whose "day" horizons are a linked one (timepoints 1 and 2) and a circular one
/// (timepoints 3 and 4)
#[fixture]
pub fn subproblem(periods: PeriodInfo, timepoints: Vec<Timepoint>) -> Subproblem {
    let temporal = TemporalInfo::new(
        timepoints,
        vec![
            horizon("day", 1, BoundaryType::Linked, &[1, 2]),
            horizon("day", 2, BoundaryType::Circular, &[3, 4]),
        ],
        vec![LinkedTimepoint {
            index: 0,
            hours: 1.0,
            weight: 1.0,
        }],
        &periods,
    )
    .unwrap();

    Subproblem {
        id: 1,
        path: PathBuf::new(),
        temporal,
    }
}

/// Every fixture project is operational in 2020 only
#[fixture]
pub fn operational_periods(projects: ProjectMap) -> ProjectOperationalPeriods {
    let mut builder = OperationalPeriodsBuilder::default();
    builder
        .add(
            "fixture",
            projects.keys().map(|project_id| (project_id.clone(), 2020)),
        )
        .unwrap();
    builder.build()
}
