//! System-level modules, which build aggregate constraints from registered components.
//!
//! Each module contributes components in the same three steps: registration, model components
//! and aggregate constraints. The aggregate step only ever sees a frozen [`Registry`].
use crate::build::BuildContext;
use crate::formulation::{Bounds, ComponentIndex, Formulation, LinearExpr};
use crate::registry::{Registry, RegistryBuilder};
use crate::scenario::parameters::Feature;
use crate::scenario::{Scenario, Subproblem};
use anyhow::{Context, Result};
use log::debug;

pub mod carbon_cap;
pub mod load_balance;
pub mod local_capacity;
pub mod objective;
pub mod project_power;
pub mod reserves;
use carbon_cap::CarbonCap;
use load_balance::LoadBalance;
use local_capacity::LocalCapacity;
use project_power::ProjectPower;
use reserves::Reserves;

/// A module which contributes components and aggregate constraints to the model
pub trait ModelModule {
    /// A human-readable name for the module
    fn name(&self) -> String;

    /// Register components under registry keys
    fn register(&self, ctx: &BuildContext, registry: &mut RegistryBuilder) -> Result<()>;

    /// Add the module's variables and expressions
    fn add_model_components(
        &self,
        ctx: &BuildContext,
        registry: &Registry,
        formulation: &mut Formulation,
    ) -> Result<()>;

    /// Add constraints built from registered components
    fn add_aggregate_constraints(
        &self,
        _ctx: &BuildContext,
        _registry: &Registry,
        _formulation: &mut Formulation,
    ) -> Result<()> {
        Ok(())
    }
}

/// Load the system modules required for a subproblem.
///
/// Power aggregation and load balance are always included. Other modules are included if the
/// corresponding feature is enabled for the scenario.
pub fn load_modules(scenario: &Scenario, subproblem: &Subproblem) -> Result<Vec<Box<dyn ModelModule>>> {
    let mut modules: Vec<Box<dyn ModelModule>> = vec![
        Box::new(ProjectPower),
        Box::new(LoadBalance::load(scenario, subproblem)?),
    ];

    for feature in &scenario.parameters.features {
        let module: Box<dyn ModelModule> = match feature.reserve_kind() {
            Some(kind) => Box::new(Reserves::load(kind, scenario, subproblem)?),
            None => match feature {
                Feature::CarbonCap => Box::new(CarbonCap::load(scenario)?),
                Feature::LocalCapacity => Box::new(LocalCapacity::load(scenario)?),
                _ => continue,
            },
        };
        debug!("Including module: {}", module.name());
        modules.push(module);
    }

    Ok(modules)
}

/// Add a slack variable which relaxes a requirement, along with the cost of using it.
///
/// If `allowed` is false, the variable is fixed to zero. Returns an expression referring to the
/// variable.
///
/// # Arguments
///
/// * `formulation` - The model being built
/// * `name` - Name of the slack variable
/// * `cost_name` - Name of the expression for the penalty cost
/// * `index` - Index for both the variable and the cost
/// * `allowed` - Whether the requirement may be relaxed
/// * `penalty` - Penalty per unit of slack
pub fn add_penalised_slack(
    formulation: &mut Formulation,
    name: &str,
    cost_name: &str,
    index: ComponentIndex,
    allowed: bool,
    penalty: f64,
) -> Result<LinearExpr> {
    let bounds = if allowed {
        Bounds::NON_NEGATIVE
    } else {
        Bounds::fixed(0.0)
    };
    let slack = formulation.add_variable(name, index.clone(), bounds)?;
    formulation.add_expression(cost_name, index, slack.clone() * penalty)?;

    Ok(slack)
}

/// Get the number of hours a timepoint represents in a year (hours × weight)
pub fn annual_hours(ctx: &BuildContext, timepoint: u32) -> Result<f64> {
    let timepoint = ctx
        .subproblem
        .temporal
        .timepoint(timepoint)
        .with_context(|| format!("Unknown timepoint {timepoint}"))?;

    Ok(timepoint.hours * timepoint.weight)
}
