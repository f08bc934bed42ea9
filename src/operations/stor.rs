//! Storage projects which charge from and discharge to the grid.
use super::{
    OperationalType, add_power_provision, capacity, has_reserves, project_balancing_type,
    project_timepoint, projects_to_link, solved_value,
};
use crate::build::BuildContext;
use crate::capacity::ENERGY_CAPACITY_MWH;
use crate::formulation::{AssembledModel, Bounds, ComponentIndex, Constraint, Formulation, LinearExpr};
use crate::linkage::{LinkedStateStore, LinkedTimepointState, PreviousState, TimepointLink};
use crate::project::ProjectID;
use crate::registry::{ProjectRegistryKey, Registry};
use crate::scenario::{Scenario, Subproblem};
use crate::temporal::{BalancingType, Timepoint};
use anyhow::{Context, Result, bail};
use indexmap::IndexMap;

/// Name of the variables for charging power
pub const STOR_CHARGE_MW: &str = "Stor_Charge_MW";
/// Name of the variables for discharging power
pub const STOR_DISCHARGE_MW: &str = "Stor_Discharge_MW";
/// Name of the variables for the energy stored at the start of a timepoint
pub const STOR_STARTING_ENERGY_MWH: &str = "Stor_Starting_Energy_In_Storage_MWh";
/// Name of the constraints relating stored energy to that of the preceding timepoint
pub const STOR_ENERGY_TRACKING_CONSTRAINT: &str = "Stor_Energy_Tracking_Constraint";

/// Operational parameters of a storage project
#[derive(PartialEq, Debug, Clone)]
pub struct StorageParams {
    /// The balancing type of the horizons over which stored energy is tracked
    pub balancing_type: BalancingType,
    /// Fraction of charged energy which is stored
    pub charging_efficiency: f64,
    /// Fraction of stored energy which is delivered when discharging
    pub discharging_efficiency: f64,
}

/// Generic storage (`stor`).
///
/// Stored energy is tracked from one timepoint to the next within each horizon. The energy
/// preceding a horizon's first timepoint depends on the horizon's boundary type.
#[derive(Debug)]
pub struct Stor {
    projects: IndexMap<ProjectID, StorageParams>,
    project_ids: Vec<ProjectID>,
}

impl Stor {
    /// Get the storage parameters of the given projects
    pub fn load(scenario: &Scenario, subproblem: &Subproblem, projects: Vec<ProjectID>) -> Result<Self> {
        let mut params = IndexMap::new();
        for project_id in projects {
            let chars = scenario.operational_chars(&project_id);
            let balancing_type = project_balancing_type(scenario, subproblem, &project_id)?;
            params.insert(
                project_id,
                StorageParams {
                    balancing_type,
                    charging_efficiency: chars.charging_efficiency,
                    discharging_efficiency: chars.discharging_efficiency,
                },
            );
        }

        Ok(Self::new(params))
    }

    /// Create a new [`Stor`]
    pub fn new(projects: IndexMap<ProjectID, StorageParams>) -> Self {
        let project_ids = projects.keys().cloned().collect();
        Self {
            projects,
            project_ids,
        }
    }

    /// Add the constraint relating the energy stored in a timepoint to the previous state
    fn add_energy_tracking(
        &self,
        ctx: &BuildContext,
        formulation: &mut Formulation,
        project_id: &ProjectID,
        params: &StorageParams,
        timepoint: &Timepoint,
    ) -> Result<()> {
        let previous = ctx
            .linkage
            .previous_state(project_id, timepoint.id, &params.balancing_type)?;
        let previous_energy = match previous {
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

                let index = project_timepoint(project_id, previous);
                let energy = LinearExpr::variable(STOR_STARTING_ENERGY_MWH, index.clone())
                    + LinearExpr::variable(STOR_CHARGE_MW, index.clone())
                        * (previous.hours * params.charging_efficiency)
                    - LinearExpr::variable(STOR_DISCHARGE_MW, index)
                        * (previous.hours / params.discharging_efficiency);
                energy
            }
            PreviousState::Linked { state, timepoint } => {
                let LinkedTimepointState::Storage {
                    starting_energy_mwh,
                    charge_mw,
                    discharge_mw,
                } = *state
                else {
                    bail!("Linked state of project {project_id} is not the state of storage");
                };
                let energy = starting_energy_mwh
                    + charge_mw * timepoint.hours * params.charging_efficiency
                    - discharge_mw * timepoint.hours / params.discharging_efficiency;
                LinearExpr::from(energy)
            }
        };

        let index = project_timepoint(project_id, timepoint);
        formulation.add_constraint(
            STOR_ENERGY_TRACKING_CONSTRAINT,
            index.clone(),
            Constraint::equal(
                LinearExpr::variable(STOR_STARTING_ENERGY_MWH, index),
                previous_energy,
            ),
        )
    }
}

impl OperationalType for Stor {
    fn tag(&self) -> &str {
        "stor"
    }

    fn add_model_components(
        &self,
        ctx: &BuildContext,
        registry: &Registry,
        formulation: &mut Formulation,
    ) -> Result<()> {
        for (project_id, params) in &self.projects {
            let has_headroom = has_reserves(registry, ProjectRegistryKey::Headroom, project_id);
            let has_footroom = has_reserves(registry, ProjectRegistryKey::Footroom, project_id);
            for timepoint in ctx.operational_timepoints(project_id) {
                let index = project_timepoint(project_id, timepoint);
                let capacity = capacity(project_id, timepoint);
                let charge =
                    formulation.add_variable(STOR_CHARGE_MW, index.clone(), Bounds::NON_NEGATIVE)?;
                let discharge =
                    formulation.add_variable(STOR_DISCHARGE_MW, index.clone(), Bounds::NON_NEGATIVE)?;
                let energy = formulation.add_variable(
                    STOR_STARTING_ENERGY_MWH,
                    index.clone(),
                    Bounds::NON_NEGATIVE,
                )?;

                formulation.add_constraint(
                    "Stor_Max_Charge_Constraint",
                    index.clone(),
                    Constraint::less_or_equal(charge.clone(), capacity.clone()),
                )?;
                formulation.add_constraint(
                    "Stor_Max_Discharge_Constraint",
                    index.clone(),
                    Constraint::less_or_equal(discharge.clone(), capacity.clone()),
                )?;
                if has_headroom {
                    let headroom =
                        registry.project_sum(ProjectRegistryKey::Headroom, project_id, &index);
                    formulation.add_constraint(
                        "Stor_Max_Headroom_Power_Constraint",
                        index.clone(),
                        Constraint::less_or_equal(
                            headroom,
                            capacity.clone() - discharge.clone() + charge.clone(),
                        ),
                    )?;
                }
                if has_footroom {
                    let footroom =
                        registry.project_sum(ProjectRegistryKey::Footroom, project_id, &index);
                    formulation.add_constraint(
                        "Stor_Max_Footroom_Power_Constraint",
                        index.clone(),
                        Constraint::less_or_equal(
                            footroom,
                            capacity + discharge.clone() - charge.clone(),
                        ),
                    )?;
                }
                formulation.add_constraint(
                    "Stor_Max_Energy_In_Storage_Constraint",
                    index,
                    Constraint::less_or_equal(
                        energy,
                        LinearExpr::component(
                            ENERGY_CAPACITY_MWH,
                            ComponentIndex::ProjectPeriod(project_id.clone(), timepoint.period),
                        ),
                    ),
                )?;
                self.add_energy_tracking(ctx, formulation, project_id, params, timepoint)?;

                add_power_provision(
                    ctx,
                    formulation,
                    project_id,
                    timepoint,
                    discharge.clone() - charge,
                    discharge,
                )?;
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
            let state = LinkedTimepointState::Storage {
                starting_energy_mwh: value(STOR_STARTING_ENERGY_MWH)?,
                charge_mw: value(STOR_CHARGE_MW)?,
                discharge_mw: value(STOR_DISCHARGE_MW)?,
            };
            store.insert(project_id.clone(), link.linked_timepoint, state)?;
        }

        Ok(())
    }
}
