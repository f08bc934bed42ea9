//! Generators with linearised capacity commitment.
//!
//! Rather than committing whole units, a continuous amount of capacity is committed in each
//! timepoint. Committed capacity must run at or above the minimum stable level, and increases in
//! commitment incur startup costs.
use super::{
    OperationalType, add_power_provision, capacity, has_reserves, project_balancing_type,
    project_timepoint, projects_to_link, solved_value,
};
use crate::build::BuildContext;
use crate::formulation::{
    AssembledModel, Bounds, ComponentKind, Constraint, Formulation, LinearExpr,
};
use crate::linkage::{LinkedStateStore, LinkedTimepointState, PreviousState, TimepointLink};
use crate::project::ProjectID;
use crate::registry::{ProjectRegistryKey, Registry, RegistryBuilder, RegistryKey};
use crate::scenario::{Scenario, Subproblem};
use crate::temporal::{BalancingType, Timepoint};
use anyhow::{Context, Result, bail};
use indexmap::IndexMap;

/// Name of the variables for committed capacity
pub const GEN_COMMIT_CAP_COMMIT_MW: &str = "GenCommitCap_Commit_MW";
/// Name of the variables for power output
pub const GEN_COMMIT_CAP_PROVIDE_POWER_MW: &str = "GenCommitCap_Provide_Power_MW";
const GEN_COMMIT_CAP_STARTUP_MW: &str = "GenCommitCap_Startup_MW";
const GEN_COMMIT_CAP_SHUTDOWN_MW: &str = "GenCommitCap_Shutdown_MW";
const GEN_COMMIT_CAP_STARTUP_COST: &str = "GenCommitCap_Startup_Cost";
const GEN_COMMIT_CAP_CONTINUITY_CONSTRAINT: &str = "GenCommitCap_Commitment_Continuity_Constraint";

/// Operational parameters of a project with capacity commitment
#[derive(PartialEq, Debug, Clone)]
pub struct CommitmentParams {
    /// The balancing type of the horizons over which commitment is tracked
    pub balancing_type: BalancingType,
    /// Minimum output as a fraction of committed capacity
    pub min_stable_level_fraction: f64,
    /// Cost of starting up a MW of capacity
    pub startup_cost_per_mw: f64,
}

/// Generators with continuous capacity commitment (`gen_commit_cap`)
#[derive(Debug)]
pub struct GenCommitCap {
    projects: IndexMap<ProjectID, CommitmentParams>,
    project_ids: Vec<ProjectID>,
}

impl GenCommitCap {
    /// Get the commitment parameters of the given projects
    pub fn load(scenario: &Scenario, subproblem: &Subproblem, projects: Vec<ProjectID>) -> Result<Self> {
        let params = projects
            .into_iter()
            .map(|project_id| {
                let chars = scenario.operational_chars(&project_id);
                let params = CommitmentParams {
                    balancing_type: project_balancing_type(scenario, subproblem, &project_id)?,
                    min_stable_level_fraction: chars.min_stable_level_fraction,
                    startup_cost_per_mw: chars.startup_cost_per_mw,
                };
                Ok((project_id, params))
            })
            .collect::<Result<_>>()?;

        Ok(Self::new(params))
    }

    /// Create a new [`GenCommitCap`]
    pub fn new(projects: IndexMap<ProjectID, CommitmentParams>) -> Self {
        let project_ids = projects.keys().cloned().collect();
        Self {
            projects,
            project_ids,
        }
    }

    /// Constrain the change in commitment since the previous timepoint to be the difference
    /// between startups and shutdowns
    fn add_continuity(
        &self,
        ctx: &BuildContext,
        formulation: &mut Formulation,
        project_id: &ProjectID,
        params: &CommitmentParams,
        timepoint: &Timepoint,
    ) -> Result<()> {
        let previous_commitment = match ctx.linkage.previous_state(
            project_id,
            timepoint.id,
            &params.balancing_type,
        )? {
            PreviousState::Skip => return Ok(()),
            PreviousState::Timepoint(id) => {
                let previous = ctx
                    .subproblem
                    .temporal
                    .timepoint(id)
                    .with_context(|| format!("Unknown timepoint {id}"))?;
                if !ctx.is_operational(project_id, previous.period) {
                    return Ok(());
                }
                LinearExpr::variable(
                    GEN_COMMIT_CAP_COMMIT_MW,
                    project_timepoint(project_id, previous),
                )
            }
            PreviousState::Linked { state, .. } => {
                let LinkedTimepointState::Commitment { committed_mw, .. } = *state else {
                    bail!(
                        "Linked state of project {project_id} is not the state of capacity \
                        commitment"
                    );
                };
                LinearExpr::from(committed_mw)
            }
        };

        let index = project_timepoint(project_id, timepoint);
        formulation.add_constraint(
            GEN_COMMIT_CAP_CONTINUITY_CONSTRAINT,
            index.clone(),
            Constraint::equal(
                LinearExpr::variable(GEN_COMMIT_CAP_COMMIT_MW, index.clone()) - previous_commitment,
                LinearExpr::variable(GEN_COMMIT_CAP_STARTUP_MW, index.clone())
                    - LinearExpr::variable(GEN_COMMIT_CAP_SHUTDOWN_MW, index),
            ),
        )
    }
}

impl OperationalType for GenCommitCap {
    fn tag(&self) -> &str {
        "gen_commit_cap"
    }

    fn register(&self, _ctx: &BuildContext, registry: &mut RegistryBuilder) -> Result<()> {
        registry.register(RegistryKey::ObjectiveCosts, GEN_COMMIT_CAP_STARTUP_COST)
    }

    fn add_model_components(
        &self,
        ctx: &BuildContext,
        registry: &Registry,
        formulation: &mut Formulation,
    ) -> Result<()> {
        formulation.declare(GEN_COMMIT_CAP_STARTUP_COST, ComponentKind::Expression)?;
        for (project_id, params) in &self.projects {
            let has_footroom = has_reserves(registry, ProjectRegistryKey::Footroom, project_id);
            for timepoint in ctx.operational_timepoints(project_id) {
                let index = project_timepoint(project_id, timepoint);
                let commit = formulation.add_variable(
                    GEN_COMMIT_CAP_COMMIT_MW,
                    index.clone(),
                    Bounds::NON_NEGATIVE,
                )?;
                let power = formulation.add_variable(
                    GEN_COMMIT_CAP_PROVIDE_POWER_MW,
                    index.clone(),
                    Bounds::NON_NEGATIVE,
                )?;
                let startup = formulation.add_variable(
                    GEN_COMMIT_CAP_STARTUP_MW,
                    index.clone(),
                    Bounds::NON_NEGATIVE,
                )?;
                formulation.add_variable(
                    GEN_COMMIT_CAP_SHUTDOWN_MW,
                    index.clone(),
                    Bounds::NON_NEGATIVE,
                )?;

                formulation.add_constraint(
                    "GenCommitCap_Max_Commit_Constraint",
                    index.clone(),
                    Constraint::less_or_equal(commit.clone(), capacity(project_id, timepoint)),
                )?;
                let headroom = registry.project_sum(ProjectRegistryKey::Headroom, project_id, &index);
                formulation.add_constraint(
                    "GenCommitCap_Max_Power_Constraint",
                    index.clone(),
                    Constraint::less_or_equal(power.clone() + headroom, commit.clone()),
                )?;
                if has_footroom || params.min_stable_level_fraction > 0.0 {
                    let footroom =
                        registry.project_sum(ProjectRegistryKey::Footroom, project_id, &index);
                    formulation.add_constraint(
                        "GenCommitCap_Min_Power_Constraint",
                        index.clone(),
                        Constraint::greater_or_equal(
                            power.clone() - footroom,
                            commit * params.min_stable_level_fraction,
                        ),
                    )?;
                }
                self.add_continuity(ctx, formulation, project_id, params, timepoint)?;

                // Startup costs are incurred once rather than per hour
                formulation.add_expression(
                    GEN_COMMIT_CAP_STARTUP_COST,
                    index,
                    startup * (params.startup_cost_per_mw / timepoint.hours),
                )?;
                add_power_provision(ctx, formulation, project_id, timepoint, power.clone(), power)?;
            }
        }

        Ok(())
    }

    fn export_linked_states(
        &self,
        ctx: &BuildContext,
        model: &AssembledModel,
        values: &[f64],
        links: &[TimepointLink],
        store: &mut LinkedStateStore,
    ) -> Result<()> {
        for (project_id, timepoint, link) in projects_to_link(ctx, &self.project_ids, links)? {
            let index = project_timepoint(project_id, timepoint);
            let value = |name: &str| -> Result<f64> {
                Ok(solved_value(model, values, name, &index)?.max(0.0))
            };
            let state = LinkedTimepointState::Commitment {
                committed_mw: value(GEN_COMMIT_CAP_COMMIT_MW)?,
                power_mw: value(GEN_COMMIT_CAP_PROVIDE_POWER_MW)?,
            };
            store.insert(project_id.clone(), link.linked_timepoint, state)?;
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
    use float_cmp::assert_approx_eq;
    use indexmap::indexmap;
    use rstest::{fixture, rstest};

    #[fixture]
    fn gen_commit_cap() -> GenCommitCap {
        GenCommitCap::new(indexmap! {
            "Coal".into() => CommitmentParams {
                balancing_type: "day".into(),
                min_stable_level_fraction: 0.4,
                startup_cost_per_mw: 10.0,
            }
        })
    }

    fn index(timepoint: u32) -> ComponentIndex {
        ComponentIndex::ProjectTimepoint("Coal".into(), timepoint)
    }

    fn build(
        gen_commit_cap: &GenCommitCap,
        scenario: &Scenario,
        subproblem: &Subproblem,
        operational_periods: &ProjectOperationalPeriods,
        linked_states: Option<&LinkedStateStore>,
    ) -> Result<Formulation> {
        let ctx = BuildContext::new(scenario, subproblem, operational_periods, linked_states);
        let mut builder = RegistryBuilder::default();
        gen_commit_cap.register(&ctx, &mut builder)?;
        let registry = builder.freeze();
        let mut formulation = Formulation::default();
        gen_commit_cap.add_model_components(&ctx, &registry, &mut formulation)?;
        Ok(formulation)
    }

    #[rstest]
    fn test_gen_commit_cap_components(
        gen_commit_cap: GenCommitCap,
        scenario: Scenario,
        subproblem: Subproblem,
        operational_periods: ProjectOperationalPeriods,
    ) {
        let formulation = build(
            &gen_commit_cap,
            &scenario,
            &subproblem,
            &operational_periods,
            None,
        )
        .unwrap();

        let constraint = formulation
            .constraint("GenCommitCap_Min_Power_Constraint", &index(2))
            .unwrap();
        let (_, coeff) = constraint.rhs.iter_terms().next().unwrap();
        assert_approx_eq!(f64, coeff, 0.4);

        // No previous subproblem to link to
        assert!(
            formulation
                .constraint(GEN_COMMIT_CAP_CONTINUITY_CONSTRAINT, &index(1))
                .is_none()
        );
        assert!(
            formulation
                .constraint(GEN_COMMIT_CAP_CONTINUITY_CONSTRAINT, &index(2))
                .is_some()
        );

        let cost = formulation
            .expression(GEN_COMMIT_CAP_STARTUP_COST, &index(2))
            .unwrap();
        let (_, coeff) = cost.iter_terms().next().unwrap();
        assert_approx_eq!(f64, coeff, 10.0);
    }

    #[rstest]
    fn test_continuity_linked(
        gen_commit_cap: GenCommitCap,
        scenario: Scenario,
        subproblem: Subproblem,
        operational_periods: ProjectOperationalPeriods,
    ) {
        let mut store = LinkedStateStore::default();
        store
            .insert(
                "Coal".into(),
                0,
                LinkedTimepointState::Commitment {
                    committed_mw: 150.0,
                    power_mw: 100.0,
                },
            )
            .unwrap();
        let formulation = build(
            &gen_commit_cap,
            &scenario,
            &subproblem,
            &operational_periods,
            Some(&store),
        )
        .unwrap();

        let constraint = formulation
            .constraint(GEN_COMMIT_CAP_CONTINUITY_CONSTRAINT, &index(1))
            .unwrap();
        assert_eq!(constraint.lhs.iter_terms().count(), 1);
        assert_approx_eq!(f64, constraint.lhs.constant(), -150.0);
    }

    #[rstest]
    fn test_continuity_wrong_state(
        gen_commit_cap: GenCommitCap,
        scenario: Scenario,
        subproblem: Subproblem,
        operational_periods: ProjectOperationalPeriods,
    ) {
        let mut store = LinkedStateStore::default();
        store
            .insert(
                "Coal".into(),
                0,
                LinkedTimepointState::Storage {
                    starting_energy_mwh: 1.0,
                    charge_mw: 0.0,
                    discharge_mw: 0.0,
                },
            )
            .unwrap();
        assert_error!(
            build(
                &gen_commit_cap,
                &scenario,
                &subproblem,
                &operational_periods,
                Some(&store)
            ),
            "Linked state of project Coal is not the state of capacity commitment"
        );
    }
}
