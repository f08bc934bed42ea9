//! Integration tests for the `run` command.
use gridplan::cli::{RunOpts, handle_run_command};
use gridplan::settings::Settings;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn get_scenario_dir() -> PathBuf {
    [env!("CARGO_MANIFEST_DIR"), "demos", "simple"].iter().collect()
}

fn count_rows(file_path: &Path) -> usize {
    csv::Reader::from_path(file_path).unwrap().records().count()
}

/// Run both subproblems of the simple scenario with the real solver
#[test]
fn test_handle_run_command() {
    unsafe { std::env::set_var("GRIDPLAN_LOG_LEVEL", "off") };

    let dir = tempdir().unwrap();
    // Check that the output directory is created
    let output_dir = dir.path().join("results");
    let opts = RunOpts {
        output_dir: Some(output_dir.clone()),
        overwrite: false,
        debug_model: true,
    };
    handle_run_command(&get_scenario_dir(), &opts, Some(Settings::default())).unwrap();

    for file_name in [
        "metadata.toml",
        "project_operational_periods.csv",
        "capacity.csv",
        "new_build.csv",
        "dispatch.csv",
        "load_balance.csv",
        "debug_model_summary.csv",
        "gridplan_info.log",
        "gridplan_error.log",
    ] {
        assert!(output_dir.join(file_name).is_file(), "{file_name} missing");
    }

    // One objective value per subproblem
    assert_eq!(count_rows(&output_dir.join("objective.csv")), 2);

    // Five projects in four timepoints in each subproblem
    assert_eq!(count_rows(&output_dir.join("dispatch.csv")), 40);

    // State at the end of subproblem 1 is published for subproblem 2
    let linked_dir = output_dir.join("2");
    let storage_state =
        fs::read_to_string(linked_dir.join("stor_linked_timepoint_params.csv")).unwrap();
    assert!(storage_state.contains("Battery"));
    let commitment_state =
        fs::read_to_string(linked_dir.join("gen_commit_cap_linked_timepoint_params.csv")).unwrap();
    assert!(commitment_state.contains("Coal"));
    assert!(commitment_state.contains("Gas"));

    // The output directory is not empty now, so a second run needs permission to overwrite
    assert_eq!(
        handle_run_command(&get_scenario_dir(), &opts, Some(Settings::default()))
            .unwrap_err()
            .chain()
            .next()
            .unwrap()
            .to_string(),
        format!(
            "Failed to create output directory: {}",
            output_dir.display()
        )
    );
}
