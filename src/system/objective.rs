//! The objective: the present value of every registered cost.
use crate::build::BuildContext;
use crate::formulation::{Formulation, LinearExpr, TimeIndex};
use crate::registry::{Registry, RegistryKey};
use anyhow::{Context, Result};

/// Set the objective to the sum of all registered costs, weighted to give their present value.
///
/// Costs indexed by period are annual costs, so are weighted by the period's discount factor and
/// the number of years it represents. Costs indexed by timepoint are hourly, so are additionally
/// weighted by the hours the timepoint represents in a year.
pub fn add_objective(ctx: &BuildContext, registry: &Registry, formulation: &mut Formulation) -> Result<()> {
    let mut objective = LinearExpr::default();
    for name in registry.components(RegistryKey::ObjectiveCosts) {
        let indices = formulation
            .indices(&name.0)
            .with_context(|| format!("Cost component {name} is not defined"))?;
        for index in indices {
            let weight = cost_weight(ctx, index.time())
                .with_context(|| format!("Cannot weight cost {name}{index}"))?;
            objective += LinearExpr::component(&name.0, index) * weight;
        }
    }

    formulation.set_objective(objective)
}

/// Get the weight which converts a cost at the given time into its present value
pub fn cost_weight(ctx: &BuildContext, time: TimeIndex) -> Result<f64> {
    let (period, hours) = match time {
        TimeIndex::None => return Ok(1.0),
        TimeIndex::Period(period) => (period, 1.0),
        TimeIndex::Timepoint(timepoint) => {
            let timepoint = ctx
                .subproblem
                .temporal
                .timepoint(timepoint)
                .with_context(|| format!("Unknown timepoint {timepoint}"))?;
            (timepoint.period, timepoint.hours * timepoint.weight)
        }
    };
    let period = ctx
        .scenario
        .periods
        .get(period)
        .with_context(|| format!("Unknown period {period}"))?;

    Ok(period.discount_factor * period.number_years_represented * hours)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::ProjectOperationalPeriods;
    use crate::fixture::{operational_periods, scenario, subproblem};
    use crate::formulation::{Bounds, ComponentIndex};
    use crate::registry::RegistryBuilder;
    use crate::scenario::{Scenario, Subproblem};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_objective_weights(
        scenario: Scenario,
        mut subproblem: Subproblem,
        operational_periods: ProjectOperationalPeriods,
    ) {
        let mut timepoints: Vec<_> = subproblem.temporal.iter_timepoints().cloned().collect();
        timepoints[0].hours = 2.0;
        timepoints[0].weight = 10.0;
        subproblem.temporal = crate::temporal::TemporalInfo::new(
            timepoints,
            subproblem.temporal.iter_horizons().cloned().collect(),
            subproblem.temporal.iter_linked_timepoints().cloned().collect(),
            &scenario.periods,
        )
        .unwrap();
        let ctx = BuildContext::new(&scenario, &subproblem, &operational_periods, None);

        // Periods in the fixture have a discount factor of 1 and represent 5 years
        assert_approx_eq!(f64, cost_weight(&ctx, TimeIndex::None).unwrap(), 1.0);
        assert_approx_eq!(f64, cost_weight(&ctx, TimeIndex::Period(2020)).unwrap(), 5.0);
        assert_approx_eq!(f64, cost_weight(&ctx, TimeIndex::Timepoint(1)).unwrap(), 100.0);
        assert!(cost_weight(&ctx, TimeIndex::Timepoint(99)).is_err());

        let mut builder = RegistryBuilder::default();
        builder
            .register(RegistryKey::ObjectiveCosts, "Annual_Cost")
            .unwrap();
        builder
            .register(RegistryKey::ObjectiveCosts, "Hourly_Cost")
            .unwrap();
        let registry = builder.freeze();

        let mut formulation = Formulation::default();
        formulation
            .add_variable("Annual_Cost", ComponentIndex::Period(2020), Bounds::NON_NEGATIVE)
            .unwrap();
        formulation
            .add_expression(
                "Hourly_Cost",
                ComponentIndex::ZoneTimepoint("Zone1".into(), 1),
                LinearExpr::variable("Annual_Cost", ComponentIndex::Period(2020)),
            )
            .unwrap();
        add_objective(&ctx, &registry, &mut formulation).unwrap();

        let model = formulation.assemble().unwrap();
        let column = model
            .column("Annual_Cost", &ComponentIndex::Period(2020))
            .unwrap();
        assert_approx_eq!(f64, model.objective().coefficient(column), 105.0);
    }
}
