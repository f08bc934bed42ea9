//! Code for writing metadata about a run to file
use crate::scenario::Scenario;
use anyhow::Result;
use chrono::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// The output file name for metadata
const METADATA_FILE_NAME: &str = "metadata.toml";

#[derive(Serialize)]
struct Metadata<'a> {
    run: RunMetadata<'a>,
    program: ProgramMetadata<'a>,
}

/// Information about the run
#[derive(Serialize)]
struct RunMetadata<'a> {
    /// Path to the scenario which was run
    scenario_path: &'a Path,
    /// The subproblems of the scenario, in the order they are solved
    subproblems: &'a [u32],
    /// The optional modules enabled for the scenario
    features: Vec<String>,
    /// The date and time on which the run started
    datetime: String,
}

/// Information about the program
#[derive(Serialize)]
struct ProgramMetadata<'a> {
    /// The program name
    name: &'a str,
    /// The program version as specified in Cargo.toml
    version: &'a str,
}

impl Default for ProgramMetadata<'_> {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Write metadata to the specified output path in TOML format
pub fn write_metadata(output_path: &Path, scenario: &Scenario) -> Result<()> {
    let metadata = Metadata {
        run: RunMetadata {
            scenario_path: &scenario.path,
            subproblems: &scenario.parameters.subproblems,
            features: scenario
                .parameters
                .features
                .iter()
                .map(ToString::to_string)
                .collect(),
            datetime: Local::now().to_rfc2822(),
        },
        program: ProgramMetadata::default(),
    };
    let file_path = output_path.join(METADATA_FILE_NAME);
    fs::write(&file_path, toml::to_string(&metadata)?)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::scenario;
    use rstest::rstest;
    use tempfile::tempdir;

    #[rstest]
    fn test_write_metadata(scenario: Scenario) {
        let dir = tempdir().unwrap();
        write_metadata(dir.path(), &scenario).unwrap();

        let contents = fs::read_to_string(dir.path().join(METADATA_FILE_NAME)).unwrap();
        let metadata: toml::Table = toml::from_str(&contents).unwrap();
        assert_eq!(metadata["program"]["name"].as_str(), Some("gridplan"));
        assert_eq!(
            metadata["run"]["subproblems"].as_array().map(Vec::len),
            Some(scenario.parameters.subproblems.len())
        );
    }
}
