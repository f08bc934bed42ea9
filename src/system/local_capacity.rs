//! Local capacity requirements: enough capacity must be sited in each local capacity zone.
use super::{ModelModule, add_penalised_slack};
use crate::build::BuildContext;
use crate::capacity::CAPACITY_MW;
use crate::formulation::{ComponentIndex, ComponentKind, Constraint, Formulation, LinearExpr};
use crate::input::system::{
    ProjectZoneMap, ZoneTimeMap, read_local_capacity_projects, read_local_capacity_requirements,
};
use crate::input::zone::read_policy_zones;
use crate::registry::{Registry, RegistryBuilder, RegistryKey};
use crate::scenario::Scenario;
use crate::zone::PolicyZoneMap;
use anyhow::Result;

const LOCAL_CAPACITY_ZONES_FILE_NAME: &str = "local_capacity_zones.csv";
const LOCAL_CAPACITY_PROJECTS_FILE_NAME: &str = "local_capacity_zone_projects.csv";
const LOCAL_CAPACITY_REQUIREMENTS_FILE_NAME: &str = "local_capacity_requirements.csv";

/// Name of the expressions for the capacity counting towards a zone's requirement
pub const LOCAL_CAPACITY_CONTRIBUTION_MW: &str = "Local_Capacity_Contribution_MW";
const LOCAL_CAPACITY_SHORTAGE: &str = "Local_Capacity_Shortage_MW";
const LOCAL_CAPACITY_SHORTAGE_PENALTY_COSTS: &str = "Local_Capacity_Shortage_Penalty_Costs";
const LOCAL_CAPACITY_CONSTRAINT: &str = "Local_Capacity_Constraint";

/// Requires a minimum amount of capacity in each local capacity zone
#[derive(Debug)]
pub struct LocalCapacity {
    zones: PolicyZoneMap,
    /// Zone of each contributing project and the fraction of its capacity which counts
    projects: ProjectZoneMap,
    requirements: ZoneTimeMap,
}

impl LocalCapacity {
    /// Load local capacity zones, projects and requirements
    pub fn load(scenario: &Scenario) -> Result<Self> {
        let zones = read_policy_zones(&scenario.path.join(LOCAL_CAPACITY_ZONES_FILE_NAME))?;
        let projects = read_local_capacity_projects(
            &scenario.path.join(LOCAL_CAPACITY_PROJECTS_FILE_NAME),
            &scenario.projects,
            &zones,
        )?;
        let requirements = read_local_capacity_requirements(
            &scenario.path.join(LOCAL_CAPACITY_REQUIREMENTS_FILE_NAME),
            &zones,
            &scenario.periods,
        )?;

        Ok(Self::new(zones, projects, requirements))
    }

    /// Create a new [`LocalCapacity`] from already validated data
    pub fn new(zones: PolicyZoneMap, projects: ProjectZoneMap, requirements: ZoneTimeMap) -> Self {
        Self {
            zones,
            projects,
            requirements,
        }
    }
}

impl ModelModule for LocalCapacity {
    fn name(&self) -> String {
        "local capacity".into()
    }

    fn register(&self, _ctx: &BuildContext, registry: &mut RegistryBuilder) -> Result<()> {
        registry.register(
            RegistryKey::LocalCapacityContributions,
            LOCAL_CAPACITY_CONTRIBUTION_MW,
        )?;
        registry.register(
            RegistryKey::ObjectiveCosts,
            LOCAL_CAPACITY_SHORTAGE_PENALTY_COSTS,
        )
    }

    fn add_model_components(
        &self,
        ctx: &BuildContext,
        _registry: &Registry,
        formulation: &mut Formulation,
    ) -> Result<()> {
        formulation.declare(LOCAL_CAPACITY_CONTRIBUTION_MW, ComponentKind::Expression)?;
        formulation.declare(LOCAL_CAPACITY_SHORTAGE_PENALTY_COSTS, ComponentKind::Expression)?;

        for zone in self.zones.values() {
            for &period in ctx.periods() {
                let contribution = self
                    .projects
                    .iter()
                    .filter(|(project_id, (zone_id, _))| {
                        *zone_id == zone.id && ctx.is_operational(project_id, period)
                    })
                    .map(|(project_id, (_, fraction))| {
                        LinearExpr::component(
                            CAPACITY_MW,
                            ComponentIndex::ProjectPeriod(project_id.clone(), period),
                        ) * *fraction
                    })
                    .sum();

                let index = ComponentIndex::ZonePeriod(zone.id.clone(), period);
                formulation.add_expression(
                    LOCAL_CAPACITY_CONTRIBUTION_MW,
                    index.clone(),
                    contribution,
                )?;
                add_penalised_slack(
                    formulation,
                    LOCAL_CAPACITY_SHORTAGE,
                    LOCAL_CAPACITY_SHORTAGE_PENALTY_COSTS,
                    index,
                    zone.allow_violation,
                    zone.violation_penalty,
                )?;
            }
        }

        Ok(())
    }

    fn add_aggregate_constraints(
        &self,
        ctx: &BuildContext,
        registry: &Registry,
        formulation: &mut Formulation,
    ) -> Result<()> {
        for ((zone_id, period), requirement) in &self.requirements {
            if !ctx.periods().contains(period) {
                continue;
            }

            let index = ComponentIndex::ZonePeriod(zone_id.clone(), *period);
            let capacity = registry.sum(RegistryKey::LocalCapacityContributions, &index)
                + LinearExpr::variable(LOCAL_CAPACITY_SHORTAGE, index.clone());
            formulation.add_constraint(
                LOCAL_CAPACITY_CONSTRAINT,
                index,
                Constraint::greater_or_equal(capacity, *requirement),
            )?;
        }

        Ok(())
    }
}
