//! Variable generators whose output is limited by a time-varying capacity factor.
use super::{OperationalType, add_power_provision, capacity, has_reserves, project_timepoint};
use crate::build::BuildContext;
use crate::formulation::{Bounds, Constraint, Formulation};
use crate::input::operations::{CapacityFactorMap, read_variable_profiles};
use crate::project::ProjectID;
use crate::registry::{ProjectRegistryKey, Registry};
use crate::scenario::{Scenario, Subproblem};
use anyhow::{Context, Result};

const VARIABLE_PROFILES_FILE_NAME: &str = "variable_profiles.csv";

const GEN_VAR_PROVIDE_POWER_MW: &str = "GenVar_Provide_Power_MW";

/// Curtailable variable generators (`gen_var`), e.g. wind and solar
#[derive(Debug)]
pub struct GenVar {
    projects: Vec<ProjectID>,
    cap_factors: CapacityFactorMap,
}

impl GenVar {
    /// Load the capacity factors of the given projects
    pub fn load(scenario: &Scenario, subproblem: &Subproblem, projects: Vec<ProjectID>) -> Result<Self> {
        let cap_factors = read_variable_profiles(
            &subproblem.file_path(VARIABLE_PROFILES_FILE_NAME),
            &scenario.projects,
            "gen_var",
            &subproblem.temporal,
        )?;

        Ok(Self::new(projects, cap_factors))
    }

    /// Create a new [`GenVar`]
    pub fn new(projects: Vec<ProjectID>, cap_factors: CapacityFactorMap) -> Self {
        Self {
            projects,
            cap_factors,
        }
    }
}

impl OperationalType for GenVar {
    fn tag(&self) -> &str {
        "gen_var"
    }

    fn add_model_components(
        &self,
        ctx: &BuildContext,
        registry: &Registry,
        formulation: &mut Formulation,
    ) -> Result<()> {
        for project_id in &self.projects {
            let has_footroom = has_reserves(registry, ProjectRegistryKey::Footroom, project_id);
            for timepoint in ctx.operational_timepoints(project_id) {
                let index = project_timepoint(project_id, timepoint);
                let cap_factor = *self
                    .cap_factors
                    .get(&(project_id.clone(), timepoint.id))
                    .with_context(|| {
                        format!(
                            "Missing capacity factor for project {project_id} in timepoint {}",
                            timepoint.id
                        )
                    })?;

                let power =
                    formulation.add_variable(GEN_VAR_PROVIDE_POWER_MW, index.clone(), Bounds::NON_NEGATIVE)?;
                let headroom = registry.project_sum(ProjectRegistryKey::Headroom, project_id, &index);
                formulation.add_constraint(
                    "GenVar_Max_Power_Constraint",
                    index.clone(),
                    Constraint::less_or_equal(
                        power.clone() + headroom,
                        capacity(project_id, timepoint) * cap_factor,
                    ),
                )?;
                if has_footroom {
                    let footroom =
                        registry.project_sum(ProjectRegistryKey::Footroom, project_id, &index);
                    formulation.add_constraint(
                        "GenVar_Min_Power_Constraint",
                        index,
                        Constraint::greater_or_equal(power.clone() - footroom, 0.0),
                    )?;
                }

                add_power_provision(ctx, formulation, project_id, timepoint, power.clone(), power)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::ProjectOperationalPeriods;
    use crate::fixture::{assert_error, operational_periods, scenario, subproblem};
    use crate::formulation::ComponentIndex;
    use crate::registry::RegistryBuilder;
    use float_cmp::assert_approx_eq;
    use indexmap::IndexMap;
    use rstest::rstest;

    #[rstest]
    fn test_gen_var_components(
        scenario: Scenario,
        subproblem: Subproblem,
        operational_periods: ProjectOperationalPeriods,
    ) {
        let ctx = BuildContext::new(&scenario, &subproblem, &operational_periods, None);
        let mut builder = RegistryBuilder::default();
        builder
            .register_for_project(ProjectRegistryKey::Headroom, &"Wind".into(), "Provide_Up_MW")
            .unwrap();
        let registry = builder.freeze();

        let cap_factors: CapacityFactorMap = (1..=4)
            .map(|timepoint| ((ProjectID::new("Wind"), timepoint), 0.25))
            .collect();
        let mut formulation = Formulation::default();
        GenVar::new(vec!["Wind".into()], cap_factors)
            .add_model_components(&ctx, &registry, &mut formulation)
            .unwrap();

        let index = ComponentIndex::ProjectTimepoint("Wind".into(), 1);
        let constraint = formulation
            .constraint("GenVar_Max_Power_Constraint", &index)
            .unwrap();
        assert_eq!(constraint.lhs.iter_terms().count(), 2);
        for (_, coeff) in constraint.rhs.iter_terms() {
            assert_approx_eq!(f64, coeff, 0.25);
        }

        // No footroom is registered
        assert!(
            formulation
                .constraint("GenVar_Min_Power_Constraint", &index)
                .is_none()
        );
    }

    #[rstest]
    fn test_missing_capacity_factor(
        scenario: Scenario,
        subproblem: Subproblem,
        operational_periods: ProjectOperationalPeriods,
    ) {
        let ctx = BuildContext::new(&scenario, &subproblem, &operational_periods, None);
        let registry = RegistryBuilder::default().freeze();
        let mut formulation = Formulation::default();
        assert_error!(
            GenVar::new(vec!["Wind".into()], IndexMap::new()).add_model_components(
                &ctx,
                &registry,
                &mut formulation
            ),
            "Missing capacity factor for project Wind in timepoint 1"
        );
    }
}
