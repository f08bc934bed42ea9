//! The build context and the pipeline which turns a subproblem's inputs into a model.
use crate::capacity::{CAPACITY_COST, CapacityType, ProjectOperationalPeriods};
use crate::formulation::{AssembledModel, ComponentKind, ComponentName, Formulation};
use crate::linkage::{LinkageResolver, LinkedStateStore};
use crate::operations::{OperationalType, VARIABLE_OM_COST};
use crate::project::ProjectID;
use crate::registry::{ProjectRegistryKey, Registry, RegistryBuilder, RegistryKey};
use crate::scenario::{Scenario, Subproblem};
use crate::system::ModelModule;
use crate::system::objective::add_objective;
use crate::temporal::Timepoint;
use anyhow::{Context, Result, ensure};
use indexmap::IndexSet;
use log::debug;

/// Everything a module may consult while adding components to the model.
///
/// A context is created for a single build pass and discarded once the model has been
/// assembled.
pub struct BuildContext<'a> {
    /// Scenario-level inputs
    pub scenario: &'a Scenario,
    /// The subproblem being built
    pub subproblem: &'a Subproblem,
    /// The periods in which each project is operational
    pub operational_periods: &'a ProjectOperationalPeriods,
    /// Supplies the state preceding each timepoint to state-tracking constraints
    pub linkage: LinkageResolver<'a>,
    periods: Vec<u32>,
}

impl<'a> BuildContext<'a> {
    /// Create a new [`BuildContext`].
    ///
    /// # Arguments
    ///
    /// * `scenario` - Scenario-level inputs
    /// * `subproblem` - The subproblem to build
    /// * `operational_periods` - Aggregated operational periods of all projects
    /// * `linked_states` - State published by the previous subproblem, if any
    pub fn new(
        scenario: &'a Scenario,
        subproblem: &'a Subproblem,
        operational_periods: &'a ProjectOperationalPeriods,
        linked_states: Option<&'a LinkedStateStore>,
    ) -> Self {
        Self {
            scenario,
            subproblem,
            operational_periods,
            linkage: LinkageResolver::new(&subproblem.temporal, linked_states),
            periods: subproblem.temporal.periods(),
        }
    }

    /// The periods covered by the subproblem's timepoints
    pub fn periods(&self) -> &[u32] {
        &self.periods
    }

    /// Iterate over the subproblem's timepoints
    pub fn timepoints(&self) -> impl Iterator<Item = &'a Timepoint> + use<'a> {
        self.subproblem.temporal.iter_timepoints()
    }

    /// Whether a project is operational in a period of this subproblem
    pub fn is_operational(&self, project_id: &ProjectID, period: u32) -> bool {
        self.periods.contains(&period) && self.operational_periods.contains(project_id, period)
    }

    /// The periods of this subproblem in which a project is operational
    pub fn operational_periods_of<'b>(
        &'b self,
        project_id: &'b ProjectID,
    ) -> impl Iterator<Item = u32> + 'b {
        self.periods
            .iter()
            .copied()
            .filter(move |period| self.operational_periods.contains(project_id, *period))
    }

    /// Iterate over the timepoints in which a project is operational
    pub fn operational_timepoints<'b>(
        &'b self,
        project_id: &'b ProjectID,
    ) -> impl Iterator<Item = &'a Timepoint> + 'b {
        self.timepoints()
            .filter(move |timepoint| self.is_operational(project_id, timepoint.period))
    }
}

/// A built model along with the number of members of each component family
pub struct BuiltModel {
    /// The model, ready for the solver
    pub model: AssembledModel,
    /// Component families and their sizes, in the order they were added
    pub summary: Vec<(ComponentName, ComponentKind, usize)>,
}

/// Build the model for a subproblem.
///
/// Registration for every contributor completes before the registry is frozen, and aggregate
/// constraints are only added once every contributor has added its own components.
///
/// # Arguments
///
/// * `ctx` - The build context
/// * `capacity_types` - The capacity types used by the scenario's projects
/// * `operational_types` - The operational types used by the scenario's projects
/// * `modules` - System modules for the subproblem
pub fn build_model(
    ctx: &BuildContext,
    capacity_types: &[Box<dyn CapacityType>],
    operational_types: &[Box<dyn OperationalType>],
    modules: &[Box<dyn ModelModule>],
) -> Result<BuiltModel> {
    // Registration phase
    let mut builder = RegistryBuilder::default();
    builder.register(RegistryKey::ObjectiveCosts, CAPACITY_COST)?;
    builder.register(RegistryKey::ObjectiveCosts, VARIABLE_OM_COST)?;
    for operational_type in operational_types {
        operational_type
            .register(ctx, &mut builder)
            .with_context(|| format!("Registration failed for {}", operational_type.tag()))?;
    }
    for module in modules {
        module
            .register(ctx, &mut builder)
            .with_context(|| format!("Registration failed for {}", module.name()))?;
    }
    let registry = builder.freeze();
    check_reserve_providers(ctx, &registry, operational_types)?;

    // Component phase
    let mut formulation = Formulation::default();
    formulation.declare(CAPACITY_COST, ComponentKind::Expression)?;
    formulation.declare(VARIABLE_OM_COST, ComponentKind::Expression)?;
    for capacity_type in capacity_types {
        debug!("Adding components for capacity type {}", capacity_type.tag());
        capacity_type
            .add_model_components(ctx, &mut formulation)
            .with_context(|| format!("Failed to add components for {}", capacity_type.tag()))?;
    }
    for module in modules {
        module
            .add_model_components(ctx, &registry, &mut formulation)
            .with_context(|| format!("Failed to add components for {}", module.name()))?;
    }
    for operational_type in operational_types {
        debug!(
            "Adding components for operational type {}",
            operational_type.tag()
        );
        operational_type
            .add_model_components(ctx, &registry, &mut formulation)
            .with_context(|| format!("Failed to add components for {}", operational_type.tag()))?;
    }

    // Aggregate phase
    for module in modules {
        module
            .add_aggregate_constraints(ctx, &registry, &mut formulation)
            .with_context(|| format!("Failed to add constraints for {}", module.name()))?;
    }
    registry.check_defined(&formulation)?;
    add_objective(ctx, &registry, &mut formulation)?;

    let summary = formulation.summary();
    let model = formulation.assemble()?;
    debug!(
        "Built model for subproblem {} with {} variables and {} constraints",
        ctx.subproblem.id,
        model.num_columns(),
        model.iter_constraints().count()
    );

    Ok(BuiltModel { model, summary })
}

/// Check that every project registered as providing reserves has an operational type which can
/// provide them
fn check_reserve_providers(
    ctx: &BuildContext,
    registry: &Registry,
    operational_types: &[Box<dyn OperationalType>],
) -> Result<()> {
    let providers: IndexSet<_> = registry
        .projects(ProjectRegistryKey::Headroom)
        .chain(registry.projects(ProjectRegistryKey::Footroom))
        .collect();

    for project_id in providers {
        let project = ctx
            .scenario
            .projects
            .get(project_id)
            .with_context(|| format!("Unknown project {project_id}"))?;
        let operational_type = operational_types
            .iter()
            .find(|operational_type| operational_type.tag() == project.operational_type)
            .with_context(|| {
                format!(
                    "No operational type {} loaded for project {project_id}",
                    project.operational_type
                )
            })?;
        ensure!(
            operational_type.provides_reserves(),
            "Project {project_id} has operational type {} which cannot provide reserves",
            project.operational_type
        );
    }

    Ok(())
}
