//! The load balance: production must equal consumption in every load zone and timepoint.
use super::{ModelModule, add_penalised_slack};
use crate::build::BuildContext;
use crate::formulation::{ComponentIndex, Constraint, Formulation, LinearExpr};
use crate::input::system::{ZoneTimeMap, read_load};
use crate::registry::{Registry, RegistryBuilder, RegistryKey};
use crate::scenario::{Scenario, Subproblem};
use anyhow::{Context, Result};

const LOAD_FILE_NAME: &str = "load.csv";

/// Name of the expressions for static load
pub const STATIC_LOAD_MW: &str = "Static_Load_MW";
/// Name of the variables for unserved energy
pub const UNSERVED_ENERGY_MW: &str = "Unserved_Energy_MW";
/// Name of the variables for overgeneration
pub const OVERGENERATION_MW: &str = "Overgeneration_MW";
/// Name of the load balance constraints
pub const MEET_LOAD_CONSTRAINT: &str = "Meet_Load_Constraint";
const UNSERVED_ENERGY_PENALTY_COSTS: &str = "Unserved_Energy_Penalty_Costs";
const OVERGENERATION_PENALTY_COSTS: &str = "Overgeneration_Penalty_Costs";

/// Balances registered production and consumption in every load zone and timepoint
#[derive(Debug)]
pub struct LoadBalance {
    load: ZoneTimeMap,
}

impl LoadBalance {
    /// Load the static load for a subproblem
    pub fn load(scenario: &Scenario, subproblem: &Subproblem) -> Result<Self> {
        let load = read_load(
            &subproblem.file_path(LOAD_FILE_NAME),
            &scenario.load_zones,
            &subproblem.temporal,
        )?;

        Ok(Self::new(load))
    }

    /// Create a new [`LoadBalance`] with the given load per zone and timepoint
    pub fn new(load: ZoneTimeMap) -> Self {
        Self { load }
    }
}

impl ModelModule for LoadBalance {
    fn name(&self) -> String {
        "load balance".into()
    }

    fn register(&self, _ctx: &BuildContext, registry: &mut RegistryBuilder) -> Result<()> {
        registry.register(RegistryKey::LoadBalanceProduction, UNSERVED_ENERGY_MW)?;
        registry.register(RegistryKey::LoadBalanceConsumption, STATIC_LOAD_MW)?;
        registry.register(RegistryKey::LoadBalanceConsumption, OVERGENERATION_MW)?;
        registry.register(RegistryKey::ObjectiveCosts, UNSERVED_ENERGY_PENALTY_COSTS)?;
        registry.register(RegistryKey::ObjectiveCosts, OVERGENERATION_PENALTY_COSTS)
    }

    fn add_model_components(
        &self,
        ctx: &BuildContext,
        _registry: &Registry,
        formulation: &mut Formulation,
    ) -> Result<()> {
        for zone in ctx.scenario.load_zones.values() {
            for timepoint in ctx.timepoints() {
                let load = *self
                    .load
                    .get(&(zone.id.clone(), timepoint.id))
                    .with_context(|| {
                        format!("Missing load for zone {} in timepoint {}", zone.id, timepoint.id)
                    })?;
                let index = ComponentIndex::ZoneTimepoint(zone.id.clone(), timepoint.id);
                formulation.add_expression(STATIC_LOAD_MW, index.clone(), load.into())?;

                add_penalised_slack(
                    formulation,
                    UNSERVED_ENERGY_MW,
                    UNSERVED_ENERGY_PENALTY_COSTS,
                    index.clone(),
                    zone.allow_unserved_energy,
                    zone.unserved_energy_penalty_per_mwh,
                )?;
                add_penalised_slack(
                    formulation,
                    OVERGENERATION_MW,
                    OVERGENERATION_PENALTY_COSTS,
                    index,
                    zone.allow_overgeneration,
                    zone.overgeneration_penalty_per_mwh,
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
        for zone_id in ctx.scenario.load_zones.keys() {
            for timepoint in ctx.timepoints() {
                let index = ComponentIndex::ZoneTimepoint(zone_id.clone(), timepoint.id);
                let production: LinearExpr =
                    registry.sum(RegistryKey::LoadBalanceProduction, &index);
                let consumption = registry.sum(RegistryKey::LoadBalanceConsumption, &index);
                formulation.add_constraint(
                    MEET_LOAD_CONSTRAINT,
                    index,
                    Constraint::equal(production, consumption),
                )?;
            }
        }

        Ok(())
    }
}
