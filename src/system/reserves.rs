//! Operating reserves: capacity held back by projects to respond to short-term imbalances.
use super::{ModelModule, add_penalised_slack};
use crate::build::BuildContext;
use crate::formulation::{
    Bounds, ComponentIndex, ComponentKind, Constraint, Formulation, LinearExpr,
};
use crate::input::system::{read_reserve_projects, read_reserve_requirements};
use crate::input::zone::read_policy_zones;
use crate::project::ProjectID;
use crate::registry::{ProjectRegistryKey, Registry, RegistryBuilder, RegistryKey};
use crate::scenario::{Scenario, Subproblem};
use crate::zone::{PolicyZoneMap, ZoneID};
use anyhow::Result;
use derive_more::Display;
use indexmap::IndexMap;

/// A kind of operating reserve
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum ReserveKind {
    /// Regulation up
    #[display("regulation up")]
    RegulationUp,
    /// Regulation down
    #[display("regulation down")]
    RegulationDown,
    /// Load-following up
    #[display("load-following up")]
    LoadFollowingUp,
    /// Load-following down
    #[display("load-following down")]
    LoadFollowingDown,
    /// Spinning reserves
    #[display("spinning reserves")]
    Spinning,
}

impl ReserveKind {
    /// Prefix for the names of this reserve's input files
    pub fn file_prefix(self) -> &'static str {
        match self {
            Self::RegulationUp => "regulation_up",
            Self::RegulationDown => "regulation_down",
            Self::LoadFollowingUp => "lf_reserves_up",
            Self::LoadFollowingDown => "lf_reserves_down",
            Self::Spinning => "spinning_reserves",
        }
    }

    /// Prefix for the names of this reserve's model components
    pub fn component_prefix(self) -> &'static str {
        match self {
            Self::RegulationUp => "Regulation_Up",
            Self::RegulationDown => "Regulation_Down",
            Self::LoadFollowingUp => "LF_Reserves_Up",
            Self::LoadFollowingDown => "LF_Reserves_Down",
            Self::Spinning => "Spinning_Reserves",
        }
    }

    /// Whether provision uses a project's headroom (upward reserves) or footroom (downward)
    pub fn direction(self) -> ProjectRegistryKey {
        match self {
            Self::RegulationUp | Self::LoadFollowingUp | Self::Spinning => {
                ProjectRegistryKey::Headroom
            }
            Self::RegulationDown | Self::LoadFollowingDown => ProjectRegistryKey::Footroom,
        }
    }

    /// Name of the variables for reserve provision by projects
    pub fn provision_name(self) -> String {
        format!("Provide_{}_MW", self.component_prefix())
    }

    fn total_provision_name(self) -> String {
        format!("Total_{}_Provision_MW", self.component_prefix())
    }

    fn violation_name(self) -> String {
        format!("{}_Violation_MW", self.component_prefix())
    }

    fn penalty_cost_name(self) -> String {
        format!("{}_Penalty_Costs", self.component_prefix())
    }

    fn constraint_name(self) -> String {
        format!("Meet_{}_Constraint", self.component_prefix())
    }
}

/// Requirements for one kind of reserve in each balancing area
#[derive(Debug)]
pub struct Reserves {
    kind: ReserveKind,
    balancing_areas: PolicyZoneMap,
    /// The balancing area in which each contributing project provides the reserve
    projects: IndexMap<ProjectID, ZoneID>,
    requirements: IndexMap<(ZoneID, u32), f64>,
}

impl Reserves {
    /// Load the reserve's input data
    pub fn load(kind: ReserveKind, scenario: &Scenario, subproblem: &Subproblem) -> Result<Self> {
        let prefix = kind.file_prefix();
        let balancing_areas =
            read_policy_zones(&scenario.path.join(format!("{prefix}_balancing_areas.csv")))?;
        let projects = read_reserve_projects(
            &scenario.path.join(format!("{prefix}_projects.csv")),
            &scenario.projects,
            &balancing_areas,
        )?;
        let requirements = read_reserve_requirements(
            &subproblem.file_path(&format!("{prefix}_requirement.csv")),
            &balancing_areas,
            &subproblem.temporal,
        )?;

        Ok(Self::new(kind, balancing_areas, projects, requirements))
    }

    /// Create a new [`Reserves`] from already validated data
    pub fn new(
        kind: ReserveKind,
        balancing_areas: PolicyZoneMap,
        projects: IndexMap<ProjectID, ZoneID>,
        requirements: IndexMap<(ZoneID, u32), f64>,
    ) -> Self {
        Self {
            kind,
            balancing_areas,
            projects,
            requirements,
        }
    }
}

impl ModelModule for Reserves {
    fn name(&self) -> String {
        self.kind.to_string()
    }

    fn register(&self, _ctx: &BuildContext, registry: &mut RegistryBuilder) -> Result<()> {
        let provision_name = self.kind.provision_name();
        for project_id in self.projects.keys() {
            registry.register_for_project(self.kind.direction(), project_id, &provision_name)?;
        }
        registry.register(
            RegistryKey::ReserveProvision(self.kind),
            &self.kind.total_provision_name(),
        )?;
        registry.register(RegistryKey::ObjectiveCosts, &self.kind.penalty_cost_name())
    }

    fn add_model_components(
        &self,
        ctx: &BuildContext,
        _registry: &Registry,
        formulation: &mut Formulation,
    ) -> Result<()> {
        let provision_name = self.kind.provision_name();
        formulation.declare(&provision_name, ComponentKind::Variable)?;
        formulation.declare(&self.kind.total_provision_name(), ComponentKind::Expression)?;
        formulation.declare(&self.kind.penalty_cost_name(), ComponentKind::Expression)?;
        for project_id in self.projects.keys() {
            for timepoint in ctx.operational_timepoints(project_id) {
                formulation.add_variable(
                    &provision_name,
                    ComponentIndex::ProjectTimepoint(project_id.clone(), timepoint.id),
                    Bounds::NON_NEGATIVE,
                )?;
            }
        }

        for area in self.balancing_areas.values() {
            for timepoint in ctx.timepoints() {
                let index = ComponentIndex::ZoneTimepoint(area.id.clone(), timepoint.id);
                let total = self
                    .projects
                    .iter()
                    .filter(|(project_id, project_area)| {
                        **project_area == area.id
                            && ctx.is_operational(project_id, timepoint.period)
                    })
                    .map(|(project_id, _)| {
                        LinearExpr::variable(
                            &provision_name,
                            ComponentIndex::ProjectTimepoint(project_id.clone(), timepoint.id),
                        )
                    })
                    .sum();
                formulation.add_expression(&self.kind.total_provision_name(), index.clone(), total)?;

                add_penalised_slack(
                    formulation,
                    &self.kind.violation_name(),
                    &self.kind.penalty_cost_name(),
                    index,
                    area.allow_violation,
                    area.violation_penalty,
                )?;
            }
        }

        Ok(())
    }

    fn add_aggregate_constraints(
        &self,
        _ctx: &BuildContext,
        registry: &Registry,
        formulation: &mut Formulation,
    ) -> Result<()> {
        for ((area_id, timepoint), requirement) in &self.requirements {
            let index = ComponentIndex::ZoneTimepoint(area_id.clone(), *timepoint);
            let provision = registry.sum(RegistryKey::ReserveProvision(self.kind), &index)
                + LinearExpr::variable(&self.kind.violation_name(), index.clone());
            formulation.add_constraint(
                &self.kind.constraint_name(),
                index,
                Constraint::greater_or_equal(provision, *requirement),
            )?;
        }

        Ok(())
    }
}
