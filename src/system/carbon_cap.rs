//! Carbon caps: limits on the emissions of projects in a carbon cap zone in each period.
use super::{ModelModule, add_penalised_slack, annual_hours};
use crate::build::BuildContext;
use crate::formulation::{ComponentIndex, ComponentKind, Constraint, Formulation, LinearExpr};
use crate::input::system::{
    ProjectZoneMap, ZoneTimeMap, read_carbon_cap_projects, read_carbon_cap_targets,
};
use crate::input::zone::read_policy_zones;
use crate::operations::POWER_PROVISION_MW;
use crate::registry::{Registry, RegistryBuilder, RegistryKey};
use crate::scenario::Scenario;
use crate::zone::PolicyZoneMap;
use anyhow::Result;

const CARBON_CAP_ZONES_FILE_NAME: &str = "carbon_cap_zones.csv";
const CARBON_CAP_PROJECTS_FILE_NAME: &str = "carbon_cap_zone_projects.csv";
const CARBON_CAP_TARGETS_FILE_NAME: &str = "carbon_cap_targets.csv";

/// Name of the expressions for emissions of a project in a timepoint (tonnes per hour)
pub const PROJECT_CARBON_EMISSIONS: &str = "Project_Carbon_Emissions_Tons";
/// Name of the expressions for total emissions of projects in a zone in a period
pub const TOTAL_CARBON_EMISSIONS: &str = "Total_Carbon_Emissions_Tons";
const CARBON_CAP_OVERAGE: &str = "Carbon_Cap_Overage_Tons";
const CARBON_CAP_OVERAGE_PENALTY_COSTS: &str = "Carbon_Cap_Overage_Penalty_Costs";
const CARBON_CAP_CONSTRAINT: &str = "Carbon_Cap_Constraint";

/// Limits emissions in each carbon cap zone
#[derive(Debug)]
pub struct CarbonCap {
    zones: PolicyZoneMap,
    /// Zone and emissions intensity (tCO2/MWh) of emitting projects
    projects: ProjectZoneMap,
    targets: ZoneTimeMap,
}

impl CarbonCap {
    /// Load carbon cap zones, projects and targets
    pub fn load(scenario: &Scenario) -> Result<Self> {
        let zones = read_policy_zones(&scenario.path.join(CARBON_CAP_ZONES_FILE_NAME))?;
        let projects = read_carbon_cap_projects(
            &scenario.path.join(CARBON_CAP_PROJECTS_FILE_NAME),
            &scenario.projects,
            &zones,
        )?;
        let targets = read_carbon_cap_targets(
            &scenario.path.join(CARBON_CAP_TARGETS_FILE_NAME),
            &zones,
            &scenario.periods,
        )?;

        Ok(Self::new(zones, projects, targets))
    }

    /// Create a new [`CarbonCap`] from already validated data
    pub fn new(zones: PolicyZoneMap, projects: ProjectZoneMap, targets: ZoneTimeMap) -> Self {
        Self {
            zones,
            projects,
            targets,
        }
    }
}

impl ModelModule for CarbonCap {
    fn name(&self) -> String {
        "carbon cap".into()
    }

    fn register(&self, _ctx: &BuildContext, registry: &mut RegistryBuilder) -> Result<()> {
        registry.register(RegistryKey::CarbonCapEmissions, TOTAL_CARBON_EMISSIONS)?;
        registry.register(RegistryKey::ObjectiveCosts, CARBON_CAP_OVERAGE_PENALTY_COSTS)
    }

    fn add_model_components(
        &self,
        ctx: &BuildContext,
        _registry: &Registry,
        formulation: &mut Formulation,
    ) -> Result<()> {
        formulation.declare(TOTAL_CARBON_EMISSIONS, ComponentKind::Expression)?;
        formulation.declare(CARBON_CAP_OVERAGE_PENALTY_COSTS, ComponentKind::Expression)?;

        for (project_id, (_, intensity)) in &self.projects {
            for timepoint in ctx.operational_timepoints(project_id) {
                let index = ComponentIndex::ProjectTimepoint(project_id.clone(), timepoint.id);
                let power = LinearExpr::expression(POWER_PROVISION_MW, index.clone());
                formulation.add_expression(PROJECT_CARBON_EMISSIONS, index, power * *intensity)?;
            }
        }

        for zone in self.zones.values() {
            for &period in ctx.periods() {
                let mut total = LinearExpr::default();
                for (project_id, _) in self
                    .projects
                    .iter()
                    .filter(|(_, (zone_id, _))| *zone_id == zone.id)
                {
                    for timepoint in ctx.operational_timepoints(project_id) {
                        if timepoint.period != period {
                            continue;
                        }
                        let emissions = LinearExpr::expression(
                            PROJECT_CARBON_EMISSIONS,
                            ComponentIndex::ProjectTimepoint(project_id.clone(), timepoint.id),
                        );
                        total += emissions * annual_hours(ctx, timepoint.id)?;
                    }
                }

                let index = ComponentIndex::ZonePeriod(zone.id.clone(), period);
                formulation.add_expression(TOTAL_CARBON_EMISSIONS, index.clone(), total)?;
                add_penalised_slack(
                    formulation,
                    CARBON_CAP_OVERAGE,
                    CARBON_CAP_OVERAGE_PENALTY_COSTS,
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
        for ((zone_id, period), target) in &self.targets {
            if !ctx.periods().contains(period) {
                continue;
            }

            let index = ComponentIndex::ZonePeriod(zone_id.clone(), *period);
            let emissions = registry.sum(RegistryKey::CarbonCapEmissions, &index);
            let overage = LinearExpr::variable(CARBON_CAP_OVERAGE, index.clone());
            formulation.add_constraint(
                CARBON_CAP_CONSTRAINT,
                index,
                Constraint::less_or_equal(emissions, overage + *target),
            )?;
        }

        Ok(())
    }
}
