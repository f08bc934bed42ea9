//! Functionality for running a scenario: its subproblems are built and solved strictly in
//! order, with state handed over from each subproblem to the next.
use crate::build::{BuildContext, build_model};
use crate::capacity::{
    CapacityType, ProjectOperationalPeriods, aggregate_operational_periods, load_capacity_types,
};
use crate::formulation::AssembledModel;
use crate::input::load_subproblem;
use crate::linkage::{ArtifactStore, CsvArtifactStore, LinkedStateStore};
use crate::operations::load_operational_types;
use crate::output::{DataWriter, write_metadata, write_project_operational_periods};
use crate::scenario::{Scenario, Subproblem};
use crate::solver::{Solution, solve};
use crate::system::load_modules;
use anyhow::{Context, Result};
use log::{debug, info};
use std::path::Path;

/// Run the scenario.
///
/// # Arguments
///
/// * `scenario` - The scenario to run
/// * `output_path` - The folder to which output files will be written
/// * `debug_model` - Whether to write additional information about the models to file
pub fn run(scenario: &Scenario, output_path: &Path, debug_model: bool) -> Result<()> {
    let capacity_types = load_capacity_types(scenario)?;
    let operational_periods = aggregate_operational_periods(&scenario.periods, &capacity_types)?;
    info!(
        "Projects are operational in {} (project, period) pairs",
        operational_periods.len()
    );
    write_project_operational_periods(output_path, &operational_periods)?;
    write_metadata(output_path, scenario)?;

    let mut writer = DataWriter::create(output_path, debug_model)?;
    let mut store = CsvArtifactStore::new(output_path);
    for &id in &scenario.parameters.subproblems {
        info!("Subproblem: {id}");
        let subproblem = load_subproblem(scenario, id)?;
        run_subproblem(
            scenario,
            &subproblem,
            &capacity_types,
            &operational_periods,
            &mut store,
            Some(&mut writer),
            solve,
        )
        .with_context(|| format!("Failed to run subproblem {id}"))?;
    }
    writer.flush()?;

    Ok(())
}

/// Build and solve one subproblem.
///
/// Linked state published by the previous subproblem is loaded from `store` and, if the
/// subproblem has timepoints to link, its own state is published for the next.
///
/// # Arguments
///
/// * `scenario` - The scenario
/// * `subproblem` - The subproblem to run
/// * `capacity_types` - The capacity types used by the scenario's projects
/// * `operational_periods` - Aggregated operational periods of all projects
/// * `store` - Where linked state is kept between subproblems
/// * `writer` - Where to write results, if anywhere
/// * `solve` - Solves the assembled model
pub fn run_subproblem<F>(
    scenario: &Scenario,
    subproblem: &Subproblem,
    capacity_types: &[Box<dyn CapacityType>],
    operational_periods: &ProjectOperationalPeriods,
    store: &mut dyn ArtifactStore,
    writer: Option<&mut DataWriter>,
    solve: F,
) -> Result<Solution>
where
    F: FnOnce(&AssembledModel) -> Result<Solution>,
{
    let linked_states = store.load(subproblem.id)?;
    if let Some(states) = &linked_states {
        debug!(
            "Loaded {} linked states for subproblem {}",
            states.len(),
            subproblem.id
        );
    }

    let ctx = BuildContext::new(
        scenario,
        subproblem,
        operational_periods,
        linked_states.as_ref(),
    );
    let operational_types = load_operational_types(scenario, subproblem)?;
    let modules = load_modules(scenario, subproblem)?;
    let built = build_model(&ctx, capacity_types, &operational_types, &modules)?;
    let solution = solve(&built.model)?;

    if let Some(writer) = writer {
        writer.write_results(&ctx, capacity_types, &built, &solution)?;
    }

    let links = scenario.linked_subproblems.timepoints_to_link(subproblem.id);
    if let Some(link) = links.first() {
        let mut states = LinkedStateStore::default();
        for operational_type in &operational_types {
            operational_type.export_linked_states(
                &ctx,
                &built.model,
                solution.columns(),
                links,
                &mut states,
            )?;
        }
        info!(
            "Handing over {} linked states to subproblem {}",
            states.len(),
            link.subproblem_to_link
        );
        store.publish(link.subproblem_to_link, &states)?;
    }

    Ok(solution)
}

/// Check that every subproblem of a scenario can be built, without solving any of them.
///
/// Linked state is not available without solving, so continuity across subproblems is not
/// checked.
pub fn validate(scenario: &Scenario) -> Result<()> {
    let capacity_types = load_capacity_types(scenario)?;
    let operational_periods = aggregate_operational_periods(&scenario.periods, &capacity_types)?;
    for &id in &scenario.parameters.subproblems {
        let subproblem = load_subproblem(scenario, id)?;
        let ctx = BuildContext::new(scenario, &subproblem, &operational_periods, None);
        let operational_types = load_operational_types(scenario, &subproblem)?;
        let modules = load_modules(scenario, &subproblem)?;
        let built = build_model(&ctx, &capacity_types, &operational_types, &modules)
            .with_context(|| format!("Failed to build subproblem {id}"))?;
        info!(
            "Subproblem {id}: {} variables and {} constraints",
            built.model.num_columns(),
            built.model.iter_constraints().count()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::load_scenario;
    use crate::formulation::{ComponentIndex, ResolvedExpr};
    use crate::linkage::{InMemoryArtifactStore, LinkedTimepointState};
    use crate::operations::stor::STOR_ENERGY_TRACKING_CONSTRAINT;
    use crate::project::ProjectID;
    use float_cmp::assert_approx_eq;
    use std::path::PathBuf;

    fn demo_path() -> PathBuf {
        [env!("CARGO_MANIFEST_DIR"), "demos", "simple"].iter().collect()
    }

    /// Solve by setting every column to the same value
    fn fake_solve(value: f64) -> impl FnOnce(&AssembledModel) -> Result<Solution> {
        move |model| Ok(Solution::new(model, vec![value; model.num_columns()]))
    }

    #[test]
    fn test_run_subproblem_hands_over_state() {
        let scenario = load_scenario(demo_path()).unwrap();
        let capacity_types = load_capacity_types(&scenario).unwrap();
        let operational_periods =
            aggregate_operational_periods(&scenario.periods, &capacity_types).unwrap();
        let mut store = InMemoryArtifactStore::default();

        let subproblem = load_subproblem(&scenario, 1).unwrap();
        run_subproblem(
            &scenario,
            &subproblem,
            &capacity_types,
            &operational_periods,
            &mut store,
            None,
            fake_solve(3.0),
        )
        .unwrap();

        let states = store.load(2).unwrap().unwrap();
        match states.get(&ProjectID::new("Battery"), 0).unwrap() {
            LinkedTimepointState::Storage {
                starting_energy_mwh,
                ..
            } => assert_approx_eq!(f64, *starting_energy_mwh, 3.0),
            LinkedTimepointState::Commitment { .. } => panic!("Unexpected state"),
        }
        assert!(matches!(
            states.get(&ProjectID::new("Coal"), 0),
            Some(LinkedTimepointState::Commitment { .. })
        ));

        // The last subproblem has nothing to hand over
        let subproblem = load_subproblem(&scenario, 2).unwrap();
        run_subproblem(
            &scenario,
            &subproblem,
            &capacity_types,
            &operational_periods,
            &mut store,
            None,
            fake_solve(0.0),
        )
        .unwrap();
        assert!(store.load(3).unwrap().is_none());

        // State can only be handed over once
        let subproblem = load_subproblem(&scenario, 1).unwrap();
        assert!(
            run_subproblem(
                &scenario,
                &subproblem,
                &capacity_types,
                &operational_periods,
                &mut store,
                None,
                fake_solve(3.0),
            )
            .is_err()
        );
    }

    #[test]
    fn test_validate() {
        let scenario = load_scenario(demo_path()).unwrap();
        assert!(validate(&scenario).is_ok());
    }

    #[test]
    fn test_linked_storage_state_reaches_next_subproblem() {
        let scenario = load_scenario(demo_path()).unwrap();
        let capacity_types = load_capacity_types(&scenario).unwrap();
        let operational_periods =
            aggregate_operational_periods(&scenario.periods, &capacity_types).unwrap();
        let mut store = InMemoryArtifactStore::default();

        // Every column of subproblem 1 is 3, so the battery ends timepoint 4 with 3 MWh stored
        // while charging and discharging at 3 MW
        let subproblem = load_subproblem(&scenario, 1).unwrap();
        run_subproblem(
            &scenario,
            &subproblem,
            &capacity_types,
            &operational_periods,
            &mut store,
            None,
            fake_solve(3.0),
        )
        .unwrap();

        let mut tracking: Option<(ResolvedExpr, ResolvedExpr)> = None;
        let subproblem = load_subproblem(&scenario, 2).unwrap();
        run_subproblem(
            &scenario,
            &subproblem,
            &capacity_types,
            &operational_periods,
            &mut store,
            None,
            |model: &AssembledModel| {
                let index = ComponentIndex::ProjectTimepoint(ProjectID::new("Battery"), 5);
                let constraint = model
                    .constraint(STOR_ENERGY_TRACKING_CONSTRAINT, &index)
                    .context("No energy tracking in first timepoint")?;
                tracking = Some((constraint.lhs.clone(), constraint.rhs.clone()));
                fake_solve(0.0)(model)
            },
        )
        .unwrap();

        // The first timepoint of subproblem 2 starts from the published state, not a variable
        let (lhs, rhs) = tracking.unwrap();
        assert_eq!(lhs.coefficients.len(), 1);
        assert!(rhs.coefficients.is_empty());
        assert_approx_eq!(
            f64,
            rhs.constant,
            3.0 + 3.0 * 6.0 * 0.9 - 3.0 * 6.0 / 0.9,
            epsilon = 1e-9
        );

        // Subproblem 2 has no successor
        assert!(store.load(3).unwrap().is_none());
    }
}
