//! Operational types, which determine how projects are dispatched.
//!
//! Every operational type defines `Power_Provision_MW` and `Variable_OM_Cost` for each of its
//! projects in each operational timepoint. Types which track state between timepoints get the
//! preceding state from the build context's linkage resolver and export their final state for
//! the next subproblem.
use crate::build::BuildContext;
use crate::capacity::CAPACITY_MW;
use crate::formulation::{AssembledModel, ComponentIndex, Formulation, LinearExpr};
use crate::linkage::{LinkedStateStore, TimepointLink};
use crate::project::{ProjectID, projects_with_operational_type};
use crate::registry::{ProjectRegistryKey, Registry, RegistryBuilder};
use crate::scenario::{Scenario, Subproblem};
use crate::temporal::{BalancingType, Timepoint};
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexSet;
use log::debug;
use std::fmt::Debug;

pub mod gen_commit_cap;
pub mod gen_must_run;
pub mod gen_var;
pub mod stor;
use gen_commit_cap::GenCommitCap;
use gen_must_run::GenMustRun;
use gen_var::GenVar;
use stor::Stor;

/// Name of the expressions for the power a project provides to its load zone
pub const POWER_PROVISION_MW: &str = "Power_Provision_MW";
/// Name of the expressions for the variable operation and maintenance cost of a project
pub const VARIABLE_OM_COST: &str = "Variable_OM_Cost";

/// A way of modelling the operations of projects
pub trait OperationalType: Debug {
    /// The tag by which projects refer to this operational type
    fn tag(&self) -> &str;

    /// Register components, e.g. additional costs
    fn register(&self, _ctx: &BuildContext, _registry: &mut RegistryBuilder) -> Result<()> {
        Ok(())
    }

    /// Add `Power_Provision_MW` and `Variable_OM_Cost` for every operational timepoint of the
    /// type's projects, along with any variables and constraints the type needs
    fn add_model_components(
        &self,
        ctx: &BuildContext,
        registry: &Registry,
        formulation: &mut Formulation,
    ) -> Result<()>;

    /// Record the state of the type's projects in the timepoints handed over to the next
    /// subproblem
    fn export_linked_states(
        &self,
        _ctx: &BuildContext,
        _model: &AssembledModel,
        _values: &[f64],
        _links: &[TimepointLink],
        _store: &mut LinkedStateStore,
    ) -> Result<()> {
        Ok(())
    }

    /// Whether projects of this type can provide reserves
    fn provides_reserves(&self) -> bool {
        true
    }
}

/// Load the operational types used by the scenario's projects
pub fn load_operational_types(
    scenario: &Scenario,
    subproblem: &Subproblem,
) -> Result<Vec<Box<dyn OperationalType>>> {
    let tags: IndexSet<_> = scenario
        .projects
        .values()
        .map(|project| project.operational_type.as_str())
        .collect();

    let mut operational_types: Vec<Box<dyn OperationalType>> = Vec::new();
    for tag in tags {
        let projects: Vec<ProjectID> = projects_with_operational_type(&scenario.projects, tag)
            .cloned()
            .collect();
        let operational_type: Box<dyn OperationalType> = match tag {
            "gen_must_run" => Box::new(GenMustRun::new(projects)),
            "gen_var" => Box::new(GenVar::load(scenario, subproblem, projects)?),
            "stor" => Box::new(Stor::load(scenario, subproblem, projects)?),
            "gen_commit_cap" => Box::new(GenCommitCap::load(scenario, subproblem, projects)?),
            _ => bail!(
                "Unknown operational type {tag} for project {}",
                projects.first().map(ToString::to_string).unwrap_or_default()
            ),
        };
        debug!("Loaded operational type {tag}");
        operational_types.push(operational_type);
    }

    Ok(operational_types)
}

/// Get the balancing type over which a project's state is tracked.
///
/// It must be given in the project's operational characteristics and have horizons in the
/// subproblem.
pub fn project_balancing_type(
    scenario: &Scenario,
    subproblem: &Subproblem,
    project_id: &ProjectID,
) -> Result<BalancingType> {
    let balancing_type = scenario
        .operational_chars(project_id)
        .balancing_type
        .with_context(|| {
            format!("No balancing type given in operational characteristics of project {project_id}")
        })?;
    ensure!(
        subproblem.temporal.has_balancing_type(&balancing_type),
        "Balancing type {balancing_type} of project {project_id} has no horizons in subproblem {}",
        subproblem.id
    );

    Ok(balancing_type)
}

/// The index of a project in a timepoint
pub fn project_timepoint(project_id: &ProjectID, timepoint: &Timepoint) -> ComponentIndex {
    ComponentIndex::ProjectTimepoint(project_id.clone(), timepoint.id)
}

/// The capacity of a project in the period of a timepoint
pub fn capacity(project_id: &ProjectID, timepoint: &Timepoint) -> LinearExpr {
    LinearExpr::component(
        CAPACITY_MW,
        ComponentIndex::ProjectPeriod(project_id.clone(), timepoint.period),
    )
}

/// Add `Power_Provision_MW` and `Variable_OM_Cost` for a project in a timepoint.
///
/// # Arguments
///
/// * `ctx` - The build context
/// * `formulation` - The model being built
/// * `project_id` - The project
/// * `timepoint` - The timepoint
/// * `power` - The power provided to the project's load zone
/// * `generation` - The power on which variable O&M costs are incurred
pub fn add_power_provision(
    ctx: &BuildContext,
    formulation: &mut Formulation,
    project_id: &ProjectID,
    timepoint: &Timepoint,
    power: LinearExpr,
    generation: LinearExpr,
) -> Result<()> {
    let project = ctx
        .scenario
        .projects
        .get(project_id)
        .with_context(|| format!("Unknown project {project_id}"))?;
    let index = project_timepoint(project_id, timepoint);
    formulation.add_expression(POWER_PROVISION_MW, index.clone(), power)?;
    formulation.add_expression(
        VARIABLE_OM_COST,
        index,
        generation * project.variable_om_cost_per_mwh,
    )
}

/// Whether any reserves are registered for the project in the given direction
pub fn has_reserves(registry: &Registry, key: ProjectRegistryKey, project_id: &ProjectID) -> bool {
    registry.project_components(key, project_id).next().is_some()
}

/// Get the value of a variable or expression from a solution
pub fn solved_value(
    model: &AssembledModel,
    values: &[f64],
    name: &str,
    index: &ComponentIndex,
) -> Result<f64> {
    model
        .value(name, index, values)
        .with_context(|| format!("No value for {name}{index}"))
}

/// Pair each timepoint to link with the projects among `projects` operational in it
pub fn projects_to_link<'a>(
    ctx: &BuildContext<'a>,
    projects: &'a [ProjectID],
    links: &'a [TimepointLink],
) -> Result<Vec<(&'a ProjectID, &'a Timepoint, &'a TimepointLink)>> {
    let mut pairs = Vec::new();
    for link in links {
        let timepoint = ctx
            .subproblem
            .temporal
            .timepoint(link.timepoint)
            .with_context(|| {
                format!(
                    "Timepoint {} to link is not in subproblem {}",
                    link.timepoint, ctx.subproblem.id
                )
            })?;
        pairs.extend(
            projects
                .iter()
                .filter(|project_id| ctx.is_operational(project_id, timepoint.period))
                .map(|project_id| (project_id, timepoint, link)),
        );
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, scenario, subproblem};
    use crate::project::OperationalChars;
    use rstest::rstest;

    #[rstest]
    fn test_project_balancing_type(mut scenario: Scenario, subproblem: Subproblem) {
        let project_id = ProjectID::new("Battery1");
        scenario.operational_chars.insert(
            project_id.clone(),
            OperationalChars {
                balancing_type: Some("day".into()),
                ..Default::default()
            },
        );
        assert_eq!(
            project_balancing_type(&scenario, &subproblem, &project_id).unwrap(),
            BalancingType::new("day")
        );

        scenario.operational_chars[&project_id].balancing_type = Some("week".into());
        assert_error!(
            project_balancing_type(&scenario, &subproblem, &project_id),
            "Balancing type week of project Battery1 has no horizons in subproblem 1"
        );

        scenario.operational_chars.clear();
        assert_error!(
            project_balancing_type(&scenario, &subproblem, &project_id),
            "No balancing type given in operational characteristics of project Battery1"
        );
    }

    #[rstest]
    fn test_unknown_operational_type(mut scenario: Scenario, subproblem: Subproblem) {
        scenario.projects["Wind"].operational_type = "gen_hydro".into();
        assert_error!(
            load_operational_types(&scenario, &subproblem),
            "Unknown operational type gen_hydro for project Wind"
        );
    }
}
