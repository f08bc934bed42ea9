//! Aggregation of project power output by load zone.
use super::ModelModule;
use crate::build::BuildContext;
use crate::formulation::{ComponentIndex, Formulation, LinearExpr};
use crate::operations::POWER_PROVISION_MW;
use crate::registry::{Registry, RegistryBuilder, RegistryKey};
use anyhow::Result;

/// Name of the expressions for total power provided by projects in a load zone
pub const POWER_PRODUCTION_IN_ZONE_MW: &str = "Power_Production_In_Zone_MW";

/// Adds the power provided by all projects in a load zone to the load balance
#[derive(Debug)]
pub struct ProjectPower;

impl ModelModule for ProjectPower {
    fn name(&self) -> String {
        "project power".into()
    }

    fn register(&self, _ctx: &BuildContext, registry: &mut RegistryBuilder) -> Result<()> {
        registry.register(RegistryKey::LoadBalanceProduction, POWER_PRODUCTION_IN_ZONE_MW)
    }

    fn add_model_components(
        &self,
        ctx: &BuildContext,
        _registry: &Registry,
        formulation: &mut Formulation,
    ) -> Result<()> {
        for zone_id in ctx.scenario.load_zones.keys() {
            for timepoint in ctx.timepoints() {
                let power = ctx
                    .scenario
                    .projects
                    .values()
                    .filter(|project| {
                        project.load_zone == *zone_id
                            && ctx.is_operational(&project.id, timepoint.period)
                    })
                    .map(|project| {
                        LinearExpr::expression(
                            POWER_PROVISION_MW,
                            ComponentIndex::ProjectTimepoint(project.id.clone(), timepoint.id),
                        )
                    })
                    .sum();
                formulation.add_expression(
                    POWER_PRODUCTION_IN_ZONE_MW,
                    ComponentIndex::ZoneTimepoint(zone_id.clone(), timepoint.id),
                    power,
                )?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::ProjectOperationalPeriods;
    use crate::fixture::{operational_periods, scenario, subproblem};
    use crate::scenario::{Scenario, Subproblem};
    use crate::zone::ZoneID;
    use rstest::rstest;

    #[rstest]
    fn test_power_production_in_zone(
        scenario: Scenario,
        subproblem: Subproblem,
        operational_periods: ProjectOperationalPeriods,
    ) {
        let ctx = BuildContext::new(&scenario, &subproblem, &operational_periods, None);
        let mut builder = RegistryBuilder::default();
        ProjectPower.register(&ctx, &mut builder).unwrap();
        let registry = builder.freeze();
        assert_eq!(
            registry
                .components(RegistryKey::LoadBalanceProduction)
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            [POWER_PRODUCTION_IN_ZONE_MW]
        );

        let mut formulation = Formulation::default();
        ProjectPower
            .add_model_components(&ctx, &registry, &mut formulation)
            .unwrap();

        // Every project is in Zone1 and operational in every timepoint
        for timepoint in 1..=4 {
            let index = ComponentIndex::ZoneTimepoint(ZoneID::new("Zone1"), timepoint);
            let power = formulation
                .expression(POWER_PRODUCTION_IN_ZONE_MW, &index)
                .unwrap();
            assert_eq!(power.iter_terms().count(), 4);
        }
    }
}
