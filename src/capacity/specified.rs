//! Capacity types with capacity specified exogenously for each period.
use super::{CAPACITY_COST, CAPACITY_MW, CapacityType, ENERGY_CAPACITY_MWH};
use crate::build::BuildContext;
use crate::formulation::{ComponentIndex, Formulation};
use crate::input::capacity::read_specified_capacity;
use crate::period::PeriodInfo;
use crate::project::ProjectID;
use crate::scenario::Scenario;
use anyhow::Result;
use indexmap::IndexMap;

const SPEC_CAPACITY_FILE_NAME: &str = "spec_capacity.csv";

/// Capacity and fixed costs of a project in a period
#[derive(PartialEq, Debug, Clone)]
pub struct SpecifiedCapacityParams {
    /// Power capacity
    pub capacity_mw: f64,
    /// Energy capacity (storage only)
    pub capacity_mwh: f64,
    /// Annual fixed cost per MW of power capacity
    pub fixed_cost_per_mw_yr: f64,
    /// Annual fixed cost per MWh of energy capacity
    pub fixed_cost_per_mwh_yr: f64,
}

/// Specified capacity, keyed by project and period
pub type SpecifiedCapacityMap = IndexMap<(ProjectID, u32), SpecifiedCapacityParams>;

/// Specified generator (`gen_spec`) or storage (`stor_spec`) capacity.
///
/// A project is operational in exactly the periods for which its capacity is given.
#[derive(Debug)]
pub struct SpecifiedCapacity {
    tag: String,
    storage: bool,
    capacity: SpecifiedCapacityMap,
}

impl SpecifiedCapacity {
    /// Load the specified capacity of the projects with the given capacity type
    pub fn load(scenario: &Scenario, tag: &str, storage: bool) -> Result<Self> {
        let capacity = read_specified_capacity(
            &scenario.path.join(SPEC_CAPACITY_FILE_NAME),
            &scenario.projects,
            tag,
            &scenario.periods,
            storage,
        )?;

        Ok(Self::new(tag, storage, capacity))
    }

    /// Create a new [`SpecifiedCapacity`]
    pub fn new(tag: &str, storage: bool, capacity: SpecifiedCapacityMap) -> Self {
        Self {
            tag: tag.to_string(),
            storage,
            capacity,
        }
    }
}

impl CapacityType for SpecifiedCapacity {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn operational_periods(&self, _periods: &PeriodInfo) -> Result<Vec<(ProjectID, u32)>> {
        Ok(self.capacity.keys().cloned().collect())
    }

    fn add_model_components(
        &self,
        ctx: &BuildContext,
        formulation: &mut Formulation,
    ) -> Result<()> {
        for ((project_id, period), params) in &self.capacity {
            if !ctx.periods().contains(period) {
                continue;
            }

            let index = ComponentIndex::ProjectPeriod(project_id.clone(), *period);
            formulation.add_expression(CAPACITY_MW, index.clone(), params.capacity_mw.into())?;
            let mut cost = params.capacity_mw * params.fixed_cost_per_mw_yr;
            if self.storage {
                formulation.add_expression(
                    ENERGY_CAPACITY_MWH,
                    index.clone(),
                    params.capacity_mwh.into(),
                )?;
                cost += params.capacity_mwh * params.fixed_cost_per_mwh_yr;
            }
            formulation.add_expression(CAPACITY_COST, index, cost.into())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::ProjectOperationalPeriods;
    use crate::fixture::{operational_periods, scenario, subproblem};
    use crate::scenario::Subproblem;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn params(capacity_mw: f64, capacity_mwh: f64) -> SpecifiedCapacityParams {
        SpecifiedCapacityParams {
            capacity_mw,
            capacity_mwh,
            fixed_cost_per_mw_yr: 10.0,
            fixed_cost_per_mwh_yr: 1.0,
        }
    }

    #[rstest]
    #[case(false, 1000.0)]
    #[case(true, 1400.0)]
    fn test_specified_capacity_components(
        scenario: Scenario,
        subproblem: Subproblem,
        operational_periods: ProjectOperationalPeriods,
        #[case] storage: bool,
        #[case] expected_cost: f64,
    ) {
        let ctx = BuildContext::new(&scenario, &subproblem, &operational_periods, None);
        let capacity_type = SpecifiedCapacity::new(
            "spec",
            storage,
            IndexMap::from([
                (("Coal".into(), 2020), params(100.0, 400.0)),
                (("Coal".into(), 2025), params(50.0, 0.0)),
            ]),
        );
        assert_eq!(
            capacity_type.operational_periods(&scenario.periods).unwrap(),
            [("Coal".into(), 2020), ("Coal".into(), 2025)]
        );

        let mut formulation = Formulation::default();
        capacity_type
            .add_model_components(&ctx, &mut formulation)
            .unwrap();

        let index = ComponentIndex::ProjectPeriod("Coal".into(), 2020);
        let capacity = formulation.expression(CAPACITY_MW, &index).unwrap();
        assert_approx_eq!(f64, capacity.constant(), 100.0);
        let cost = formulation.expression(CAPACITY_COST, &index).unwrap();
        assert_approx_eq!(f64, cost.constant(), expected_cost);
        assert_eq!(
            formulation.expression(ENERGY_CAPACITY_MWH, &index).is_some(),
            storage
        );

        // 2025 is outside the subproblem
        assert!(
            formulation
                .expression(CAPACITY_MW, &ComponentIndex::ProjectPeriod("Coal".into(), 2025))
                .is_none()
        );
    }
}
