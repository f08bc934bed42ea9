//! Generators which always produce at full capacity.
use super::{OperationalType, add_power_provision, capacity};
use crate::build::BuildContext;
use crate::formulation::Formulation;
use crate::project::ProjectID;
use crate::registry::Registry;
use anyhow::Result;

/// Must-run generators (`gen_must_run`), e.g. nuclear.
///
/// Power is fixed at the project's capacity, so these projects cannot provide reserves.
#[derive(Debug)]
pub struct GenMustRun {
    projects: Vec<ProjectID>,
}

impl GenMustRun {
    /// Create a new [`GenMustRun`] for the given projects
    pub fn new(projects: Vec<ProjectID>) -> Self {
        Self { projects }
    }
}

impl OperationalType for GenMustRun {
    fn tag(&self) -> &str {
        "gen_must_run"
    }

    fn add_model_components(
        &self,
        ctx: &BuildContext,
        _registry: &Registry,
        formulation: &mut Formulation,
    ) -> Result<()> {
        for project_id in &self.projects {
            for timepoint in ctx.operational_timepoints(project_id) {
                let power = capacity(project_id, timepoint);
                add_power_provision(ctx, formulation, project_id, timepoint, power.clone(), power)?;
            }
        }

        Ok(())
    }

    fn provides_reserves(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::{CAPACITY_MW, ProjectOperationalPeriods};
    use crate::fixture::{operational_periods, scenario, subproblem};
    use crate::formulation::{ComponentIndex, LinearExpr};
    use crate::operations::{POWER_PROVISION_MW, VARIABLE_OM_COST};
    use crate::registry::RegistryBuilder;
    use crate::scenario::{Scenario, Subproblem};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_must_run_power(
        mut scenario: Scenario,
        subproblem: Subproblem,
        operational_periods: ProjectOperationalPeriods,
    ) {
        scenario.projects["Nuclear"].variable_om_cost_per_mwh = 2.0;
        let ctx = BuildContext::new(&scenario, &subproblem, &operational_periods, None);
        let registry = RegistryBuilder::default().freeze();
        let mut formulation = Formulation::default();
        let operational_type = GenMustRun::new(vec!["Nuclear".into()]);
        operational_type
            .add_model_components(&ctx, &registry, &mut formulation)
            .unwrap();
        assert!(!operational_type.provides_reserves());

        formulation
            .add_expression(
                CAPACITY_MW,
                ComponentIndex::ProjectPeriod("Nuclear".into(), 2020),
                LinearExpr::from(500.0),
            )
            .unwrap();
        let model = formulation.assemble().unwrap();
        for timepoint in 1..=4 {
            let index = ComponentIndex::ProjectTimepoint("Nuclear".into(), timepoint);
            assert_approx_eq!(
                f64,
                model.value(POWER_PROVISION_MW, &index, &[]).unwrap(),
                500.0
            );
            assert_approx_eq!(
                f64,
                model.value(VARIABLE_OM_COST, &index, &[]).unwrap(),
                1000.0
            );
        }
    }
}
