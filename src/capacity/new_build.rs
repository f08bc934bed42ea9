//! Capacity types with linear new build decisions for each vintage.
use super::{CAPACITY_COST, CAPACITY_MW, CapacityType, ENERGY_CAPACITY_MWH, NewBuild};
use crate::build::BuildContext;
use crate::formulation::{
    AssembledModel, Bounds, ComponentIndex, Constraint, Formulation, LinearExpr,
};
use crate::input::capacity::{read_build_limits, read_vintage_params};
use crate::period::{
    PeriodInfo, VintageLifetimeMap, operational_periods_by_vintage, project_operational_periods,
    vintages_operational_in_period,
};
use crate::project::ProjectID;
use crate::scenario::Scenario;
use anyhow::Result;
use indexmap::IndexMap;

const NEW_BUILD_COSTS_FILE_NAME: &str = "new_build_costs.csv";
const STORAGE_NEW_BUILD_COSTS_FILE_NAME: &str = "storage_new_build_costs.csv";
const NEW_BUILD_LIMITS_FILE_NAME: &str = "new_build_limits.csv";

/// Lifetime and costs of capacity built in a vintage
#[derive(PartialEq, Debug, Clone)]
pub struct VintageParams {
    /// Lifetime in years
    pub lifetime_yrs: f64,
    /// Annualized cost per MW of power capacity
    pub annualized_real_cost_per_mw_yr: f64,
    /// Annualized cost per MWh of energy capacity (storage only)
    pub annualized_real_cost_per_mwh_yr: f64,
    /// Minimum ratio of energy to power capacity for new builds (storage only)
    pub min_duration_hrs: f64,
}

/// Vintage parameters, keyed by project and vintage
pub type VintageParamsMap = IndexMap<(ProjectID, u32), VintageParams>;

/// Limits on the cumulative new build of a project by a period
#[derive(PartialEq, Debug, Clone, Default)]
pub struct BuildLimits {
    /// Minimum capacity (MW) of all vintages operational in the period
    pub min_cumulative_new_build_mw: Option<f64>,
    /// Maximum capacity (MW) of all vintages operational in the period
    pub max_cumulative_new_build_mw: Option<f64>,
}

/// Build limits, keyed by project and period
pub type BuildLimitsMap = IndexMap<(ProjectID, u32), BuildLimits>;

/// Linear new build of generators (`gen_new_lin`) or storage (`stor_new_lin`).
///
/// Capacity built in a vintage is operational for the periods within its lifetime. Storage
/// projects build power and energy capacity separately.
#[derive(Debug)]
pub struct NewBuildCapacity {
    tag: String,
    storage: bool,
    vintages: VintageParamsMap,
    lifetimes: VintageLifetimeMap,
    limits: BuildLimitsMap,
}

impl NewBuildCapacity {
    /// Load vintage costs and build limits for the projects with the given capacity type
    pub fn load(scenario: &Scenario, tag: &str, storage: bool) -> Result<Self> {
        let file_name = if storage {
            STORAGE_NEW_BUILD_COSTS_FILE_NAME
        } else {
            NEW_BUILD_COSTS_FILE_NAME
        };
        let vintages = read_vintage_params(
            &scenario.path.join(file_name),
            &scenario.projects,
            tag,
            &scenario.periods,
            storage,
        )?;
        let limits = read_build_limits(
            &scenario.path.join(NEW_BUILD_LIMITS_FILE_NAME),
            &scenario.projects,
            tag,
            &scenario.periods,
        )?;

        Ok(Self::new(tag, storage, vintages, limits))
    }

    /// Create a new [`NewBuildCapacity`]
    pub fn new(tag: &str, storage: bool, vintages: VintageParamsMap, limits: BuildLimitsMap) -> Self {
        let lifetimes = vintages
            .iter()
            .map(|(key, params)| (key.clone(), params.lifetime_yrs))
            .collect();

        Self {
            tag: tag.to_string(),
            storage,
            vintages,
            lifetimes,
            limits,
        }
    }

    fn prefix(&self) -> &'static str {
        if self.storage {
            "StorNewLin"
        } else {
            "GenNewLin"
        }
    }

    fn build_mw_name(&self) -> String {
        format!("{}_Build_MW", self.prefix())
    }

    fn build_mwh_name(&self) -> String {
        format!("{}_Build_MWh", self.prefix())
    }

    /// Add build variables for every vintage operational in one of the subproblem's periods
    fn add_build_variables(&self, ctx: &BuildContext, formulation: &mut Formulation) -> Result<()> {
        for ((project_id, vintage), params) in &self.vintages {
            let window =
                operational_periods_by_vintage(&ctx.scenario.periods, *vintage, params.lifetime_yrs)?;
            if !window.iter().any(|period| ctx.periods().contains(period)) {
                continue;
            }

            let index = ComponentIndex::ProjectPeriod(project_id.clone(), *vintage);
            let build_mw =
                formulation.add_variable(&self.build_mw_name(), index.clone(), Bounds::NON_NEGATIVE)?;
            if self.storage {
                let build_mwh = formulation.add_variable(
                    &self.build_mwh_name(),
                    index.clone(),
                    Bounds::NON_NEGATIVE,
                )?;
                formulation.add_constraint(
                    "StorNewLin_Min_Duration_Constraint",
                    index,
                    Constraint::greater_or_equal(build_mwh, build_mw * params.min_duration_hrs),
                )?;
            }
        }

        Ok(())
    }

    /// Add limits on the cumulative capacity of each project in the subproblem's periods
    fn add_build_limits(
        &self,
        capacity: &IndexMap<(ProjectID, u32), LinearExpr>,
        ctx: &BuildContext,
        formulation: &mut Formulation,
    ) -> Result<()> {
        for ((project_id, period), limits) in &self.limits {
            if !ctx.periods().contains(period) {
                continue;
            }

            let index = ComponentIndex::ProjectPeriod(project_id.clone(), *period);
            let cumulative = capacity
                .get(&(project_id.clone(), *period))
                .cloned()
                .unwrap_or_default();
            if let Some(min) = limits.min_cumulative_new_build_mw.filter(|min| *min > 0.0) {
                formulation.add_constraint(
                    &format!("{}_Min_Cum_Build_Constraint", self.prefix()),
                    index.clone(),
                    Constraint::greater_or_equal(cumulative.clone(), min),
                )?;
            }
            if let Some(max) = limits.max_cumulative_new_build_mw {
                formulation.add_constraint(
                    &format!("{}_Max_Cum_Build_Constraint", self.prefix()),
                    index,
                    Constraint::less_or_equal(cumulative, max),
                )?;
            }
        }

        Ok(())
    }
}

impl CapacityType for NewBuildCapacity {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn operational_periods(&self, periods: &PeriodInfo) -> Result<Vec<(ProjectID, u32)>> {
        Ok(project_operational_periods(periods, &self.lifetimes)?
            .into_iter()
            .collect())
    }

    fn add_model_components(
        &self,
        ctx: &BuildContext,
        formulation: &mut Formulation,
    ) -> Result<()> {
        self.add_build_variables(ctx, formulation)?;

        let build_mw_name = self.build_mw_name();
        let build_mwh_name = self.build_mwh_name();
        let mut capacity = IndexMap::new();
        for &period in ctx.periods() {
            let alive = vintages_operational_in_period(&ctx.scenario.periods, &self.lifetimes, period)?;
            let mut by_project: IndexMap<&ProjectID, Vec<u32>> = IndexMap::new();
            for (project_id, vintage) in &alive {
                by_project.entry(project_id).or_default().push(*vintage);
            }

            for (project_id, vintages) in by_project {
                let mut power = LinearExpr::default();
                let mut energy = LinearExpr::default();
                let mut cost = LinearExpr::default();
                for vintage in vintages {
                    let params = &self.vintages[&(project_id.clone(), vintage)];
                    let build_index = ComponentIndex::ProjectPeriod(project_id.clone(), vintage);
                    let build_mw = LinearExpr::variable(&build_mw_name, build_index.clone());
                    power += build_mw.clone();
                    cost += build_mw * params.annualized_real_cost_per_mw_yr;
                    if self.storage {
                        let build_mwh = LinearExpr::variable(&build_mwh_name, build_index);
                        energy += build_mwh.clone();
                        cost += build_mwh * params.annualized_real_cost_per_mwh_yr;
                    }
                }

                let index = ComponentIndex::ProjectPeriod(project_id.clone(), period);
                formulation.add_expression(CAPACITY_MW, index.clone(), power.clone())?;
                if self.storage {
                    formulation.add_expression(ENERGY_CAPACITY_MWH, index.clone(), energy)?;
                }
                formulation.add_expression(CAPACITY_COST, index, cost)?;
                capacity.insert((project_id.clone(), period), power);
            }
        }

        self.add_build_limits(&capacity, ctx, formulation)
    }

    fn new_builds(
        &self,
        _ctx: &BuildContext,
        model: &AssembledModel,
        values: &[f64],
    ) -> Vec<NewBuild> {
        let build_mw_name = self.build_mw_name();
        let build_mwh_name = self.build_mwh_name();
        self.vintages
            .keys()
            .filter_map(|(project_id, vintage)| {
                let index = ComponentIndex::ProjectPeriod(project_id.clone(), *vintage);
                let new_build_mw = model.value(&build_mw_name, &index, values)?;
                let new_build_mwh = model
                    .value(&build_mwh_name, &index, values)
                    .unwrap_or(0.0);

                Some(NewBuild {
                    project: project_id.clone(),
                    vintage: *vintage,
                    new_build_mw,
                    new_build_mwh,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::ProjectOperationalPeriods;
    use crate::fixture::{operational_periods, scenario, subproblem};
    use crate::formulation::ConstraintSense;
    use crate::scenario::Subproblem;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn vintage(lifetime_yrs: f64) -> VintageParams {
        VintageParams {
            lifetime_yrs,
            annualized_real_cost_per_mw_yr: 100.0,
            annualized_real_cost_per_mwh_yr: 10.0,
            min_duration_hrs: 4.0,
        }
    }

    fn battery() -> NewBuildCapacity {
        NewBuildCapacity::new(
            "stor_new_lin",
            true,
            IndexMap::from([
                (("Battery1".into(), 2020), vintage(10.0)),
                (("Battery1".into(), 2030), vintage(10.0)),
            ]),
            IndexMap::from([(
                ("Battery1".into(), 2020),
                BuildLimits {
                    min_cumulative_new_build_mw: Some(0.0),
                    max_cumulative_new_build_mw: Some(50.0),
                },
            )]),
        )
    }

    #[rstest]
    fn test_operational_periods(scenario: Scenario) {
        assert_eq!(
            battery().operational_periods(&scenario.periods).unwrap(),
            [
                ("Battery1".into(), 2020),
                ("Battery1".into(), 2025),
                ("Battery1".into(), 2030),
                ("Battery1".into(), 2035)
            ]
        );
    }

    #[rstest]
    fn test_new_build_components(
        scenario: Scenario,
        subproblem: Subproblem,
        operational_periods: ProjectOperationalPeriods,
    ) {
        let ctx = BuildContext::new(&scenario, &subproblem, &operational_periods, None);
        let mut formulation = Formulation::default();
        battery()
            .add_model_components(&ctx, &mut formulation)
            .unwrap();

        // Only the 2020 vintage is operational in the subproblem
        let index = ComponentIndex::ProjectPeriod("Battery1".into(), 2020);
        assert_eq!(formulation.indices("StorNewLin_Build_MW").unwrap(), [index.clone()]);
        assert!(formulation.indices("StorNewLin_Build_MWh").is_some());

        let limit = formulation
            .constraint("StorNewLin_Max_Cum_Build_Constraint", &index)
            .unwrap();
        assert_eq!(limit.sense, ConstraintSense::LessOrEqual);
        assert_approx_eq!(f64, limit.rhs.constant(), 50.0);

        // A zero minimum is not enforced
        assert!(
            formulation
                .constraint("StorNewLin_Min_Cum_Build_Constraint", &index)
                .is_none()
        );

        let model = formulation.assemble().unwrap();
        let build_mw = model.column("StorNewLin_Build_MW", &index).unwrap();
        let build_mwh = model.column("StorNewLin_Build_MWh", &index).unwrap();
        let cost = model.expression(CAPACITY_COST, &index).unwrap();
        assert_approx_eq!(f64, cost.coefficient(build_mw), 100.0);
        assert_approx_eq!(f64, cost.coefficient(build_mwh), 10.0);

        let (coefficients, lower, _) = model
            .constraint("StorNewLin_Min_Duration_Constraint", &index)
            .unwrap()
            .row();
        assert_eq!(coefficients.len(), 2);
        assert_approx_eq!(f64, lower.unwrap(), 0.0);

        let mut values = vec![0.0; model.num_columns()];
        values[build_mw] = 20.0;
        values[build_mwh] = 80.0;
        assert_eq!(
            battery().new_builds(&ctx, &model, &values),
            [NewBuild {
                project: "Battery1".into(),
                vintage: 2020,
                new_build_mw: 20.0,
                new_build_mwh: 80.0,
            }]
        );
    }
}
