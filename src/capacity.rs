//! Capacity types, which determine how much capacity each project has in each period.
//!
//! Each capacity type independently works out the periods in which its projects are
//! operational. These contributions are combined into a single [`ProjectOperationalPeriods`]
//! relation, which every operational constraint is built from.
use crate::build::BuildContext;
use crate::formulation::{AssembledModel, Formulation};
use crate::period::PeriodInfo;
use crate::project::ProjectID;
use crate::scenario::Scenario;
use anyhow::{Context, Result, bail};
use indexmap::IndexSet;
use log::debug;
use serde::Serialize;
use std::fmt::Debug;

pub mod lifecycle;
pub mod new_build;
pub mod specified;
pub use lifecycle::{OperationalPeriodsBuilder, ProjectOperationalPeriods};
use new_build::NewBuildCapacity;
use specified::SpecifiedCapacity;

/// Name of the expressions for the power capacity of a project in a period
pub const CAPACITY_MW: &str = "Capacity_MW";
/// Name of the expressions for the energy capacity of a storage project in a period
pub const ENERGY_CAPACITY_MWH: &str = "Energy_Capacity_MWh";
/// Name of the expressions for the annual capacity cost of a project in a period
pub const CAPACITY_COST: &str = "Capacity_Cost";

/// Capacity built for a project in a vintage
#[derive(PartialEq, Debug, Serialize)]
pub struct NewBuild {
    /// The project
    pub project: ProjectID,
    /// The period in which the capacity was built
    pub vintage: u32,
    /// New power capacity
    pub new_build_mw: f64,
    /// New energy capacity (zero for generators)
    pub new_build_mwh: f64,
}

/// A way of modelling the capacity of projects
pub trait CapacityType: Debug {
    /// The tag by which projects refer to this capacity type
    fn tag(&self) -> &str;

    /// The (project, period) pairs in which this type's projects are operational
    fn operational_periods(&self, periods: &PeriodInfo) -> Result<Vec<(ProjectID, u32)>>;

    /// Add `Capacity_MW` and `Capacity_Cost` for every operational (project, period) pair of the
    /// subproblem, along with any variables and constraints the type needs
    fn add_model_components(
        &self,
        ctx: &BuildContext,
        formulation: &mut Formulation,
    ) -> Result<()>;

    /// Capacity built in each vintage, for types which make build decisions
    fn new_builds(
        &self,
        _ctx: &BuildContext,
        _model: &AssembledModel,
        _values: &[f64],
    ) -> Vec<NewBuild> {
        Vec::new()
    }
}

/// Load the capacity types used by the scenario's projects.
///
/// Each type reads its own input files, so types which no project uses are never loaded.
pub fn load_capacity_types(scenario: &Scenario) -> Result<Vec<Box<dyn CapacityType>>> {
    let tags: IndexSet<_> = scenario
        .projects
        .values()
        .map(|project| project.capacity_type.as_str())
        .collect();

    let mut capacity_types: Vec<Box<dyn CapacityType>> = Vec::new();
    for tag in tags {
        let capacity_type: Box<dyn CapacityType> = match tag {
            "gen_spec" => Box::new(SpecifiedCapacity::load(scenario, tag, false)?),
            "stor_spec" => Box::new(SpecifiedCapacity::load(scenario, tag, true)?),
            "gen_new_lin" => Box::new(NewBuildCapacity::load(scenario, tag, false)?),
            "stor_new_lin" => Box::new(NewBuildCapacity::load(scenario, tag, true)?),
            _ => {
                let project = scenario
                    .projects
                    .values()
                    .find(|project| project.capacity_type == tag)
                    .map(|project| project.id.to_string())
                    .unwrap_or_default();
                bail!("Unknown capacity type {tag} for project {project}")
            }
        };
        debug!("Loaded capacity type {tag}");
        capacity_types.push(capacity_type);
    }

    Ok(capacity_types)
}

/// Combine the operational periods of every capacity type
pub fn aggregate_operational_periods(
    periods: &PeriodInfo,
    capacity_types: &[Box<dyn CapacityType>],
) -> Result<ProjectOperationalPeriods> {
    let mut builder = OperationalPeriodsBuilder::default();
    for capacity_type in capacity_types {
        let pairs = capacity_type.operational_periods(periods).with_context(|| {
            format!(
                "Failed to get operational periods for capacity type {}",
                capacity_type.tag()
            )
        })?;
        builder.add(capacity_type.tag(), pairs)?;
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, scenario};
    use crate::project::Project;
    use rstest::rstest;

    /// A capacity type which claims fixed pairs
    #[derive(Debug)]
    struct FixedPairs(&'static str, Vec<(ProjectID, u32)>);

    impl CapacityType for FixedPairs {
        fn tag(&self) -> &str {
            self.0
        }

        fn operational_periods(&self, _periods: &PeriodInfo) -> Result<Vec<(ProjectID, u32)>> {
            Ok(self.1.clone())
        }

        fn add_model_components(
            &self,
            _ctx: &BuildContext,
            _formulation: &mut Formulation,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[rstest]
    fn test_aggregate_operational_periods(scenario: Scenario) {
        let capacity_types: Vec<Box<dyn CapacityType>> = vec![
            Box::new(FixedPairs("a", vec![("ProjectX".into(), 2030)])),
            Box::new(FixedPairs("b", vec![("ProjectY".into(), 2030)])),
        ];
        let operational = aggregate_operational_periods(&scenario.periods, &capacity_types).unwrap();
        assert_eq!(operational.projects_in_period(2030).len(), 2);

        let capacity_types: Vec<Box<dyn CapacityType>> = vec![
            Box::new(FixedPairs("a", vec![("ProjectX".into(), 2030)])),
            Box::new(FixedPairs("b", vec![("ProjectX".into(), 2030)])),
        ];
        assert_error!(
            aggregate_operational_periods(&scenario.periods, &capacity_types),
            "Project ProjectX is operational in period 2030 under both capacity types a and b"
        );
    }

    #[rstest]
    fn test_unknown_capacity_type(mut scenario: Scenario) {
        let project = Project {
            id: "Solar".into(),
            capacity_type: "gen_magic".into(),
            operational_type: "gen_var".into(),
            load_zone: "Zone1".into(),
            variable_om_cost_per_mwh: 0.0,
        };
        scenario.projects = [(project.id.clone(), project)].into_iter().collect();
        assert_error!(
            load_capacity_types(&scenario),
            "Unknown capacity type gen_magic for project Solar"
        );
    }
}
