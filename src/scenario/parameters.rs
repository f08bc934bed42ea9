//! Defines the `ScenarioParameters` struct, which represents the contents of `scenario.toml`.
use crate::input::{input_err_msg, is_sorted_and_unique, read_toml};
use crate::system::reserves::ReserveKind;
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::path::Path;
use strum::Display;

const SCENARIO_PARAMETERS_FILE_NAME: &str = "scenario.toml";

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_subproblems, Vec<u32>, vec![1]);

/// Represents the contents of the scenario file
#[derive(Debug, Deserialize, PartialEq)]
pub struct ScenarioParameters {
    /// Subproblems, in the order in which they are solved.
    ///
    /// Each has its own subdirectory of the scenario directory.
    #[serde(default = "default_subproblems")]
    pub subproblems: Vec<u32>,
    /// Optional modules to include
    #[serde(default)]
    pub features: Vec<Feature>,
}

/// An optional module which can be included in a scenario
#[derive(DeserializeLabeledStringEnum, Display, Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Feature {
    /// Limit emissions in carbon cap zones
    #[string = "carbon_cap"]
    #[strum(serialize = "carbon_cap")]
    CarbonCap,
    /// Require local capacity in local capacity zones
    #[string = "local_capacity"]
    #[strum(serialize = "local_capacity")]
    LocalCapacity,
    /// Regulation up reserves
    #[string = "regulation_up"]
    #[strum(serialize = "regulation_up")]
    RegulationUp,
    /// Regulation down reserves
    #[string = "regulation_down"]
    #[strum(serialize = "regulation_down")]
    RegulationDown,
    /// Load-following up reserves
    #[string = "lf_reserves_up"]
    #[strum(serialize = "lf_reserves_up")]
    LoadFollowingUp,
    /// Load-following down reserves
    #[string = "lf_reserves_down"]
    #[strum(serialize = "lf_reserves_down")]
    LoadFollowingDown,
    /// Spinning reserves
    #[string = "spinning_reserves"]
    #[strum(serialize = "spinning_reserves")]
    SpinningReserves,
}

impl Feature {
    /// The kind of reserve this feature adds, if any
    pub fn reserve_kind(self) -> Option<ReserveKind> {
        match self {
            Self::RegulationUp => Some(ReserveKind::RegulationUp),
            Self::RegulationDown => Some(ReserveKind::RegulationDown),
            Self::LoadFollowingUp => Some(ReserveKind::LoadFollowingUp),
            Self::LoadFollowingDown => Some(ReserveKind::LoadFollowingDown),
            Self::SpinningReserves => Some(ReserveKind::Spinning),
            Self::CarbonCap | Self::LocalCapacity => None,
        }
    }
}

/// Check that the `subproblems` parameter is valid
fn check_subproblems(subproblems: &[u32]) -> Result<()> {
    ensure!(!subproblems.is_empty(), "`subproblems` is empty");

    ensure!(
        is_sorted_and_unique(subproblems),
        "`subproblems` must be composed of unique values in order"
    );

    Ok(())
}

/// Check that the `features` parameter is valid
fn check_features(features: &[Feature]) -> Result<()> {
    ensure!(
        features.iter().all_unique(),
        "`features` cannot contain duplicates"
    );

    Ok(())
}

impl ScenarioParameters {
    /// Read a scenario file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `scenario_dir` - Folder containing scenario configuration files
    ///
    /// # Returns
    ///
    /// The scenario file contents as a [`ScenarioParameters`] struct or an error if the file is
    /// invalid
    pub fn from_path<P: AsRef<Path>>(scenario_dir: P) -> Result<ScenarioParameters> {
        let file_path = scenario_dir.as_ref().join(SCENARIO_PARAMETERS_FILE_NAME);
        let parameters: ScenarioParameters = read_toml(&file_path)?;

        parameters
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(parameters)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        check_subproblems(&self.subproblems)?;
        check_features(&self.features)?;

        Ok(())
    }

    /// Whether the given feature is enabled
    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    /// The subproblem solved after the given one, if any
    pub fn next_subproblem(&self, subproblem: u32) -> Option<u32> {
        let pos = self.subproblems.iter().position(|&s| s == subproblem)?;
        self.subproblems.get(pos + 1).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[rstest]
    #[case(&[1], true)]
    #[case(&[1, 2, 3], true)]
    #[case(&[], false)]
    #[case(&[2, 1], false)]
    #[case(&[1, 1], false)]
    fn test_check_subproblems(#[case] subproblems: &[u32], #[case] is_valid: bool) {
        assert_eq!(check_subproblems(subproblems).is_ok(), is_valid);
    }

    #[test]
    fn test_check_features() {
        assert!(check_features(&[Feature::CarbonCap, Feature::RegulationUp]).is_ok());
        assert_error!(
            check_features(&[Feature::CarbonCap, Feature::CarbonCap]),
            "`features` cannot contain duplicates"
        );
    }

    #[test]
    fn test_scenario_parameters_from_path() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(SCENARIO_PARAMETERS_FILE_NAME)).unwrap();
            writeln!(
                file,
                "subproblems = [1, 2, 3]\nfeatures = [\"carbon_cap\", \"spinning_reserves\"]"
            )
            .unwrap();
        }

        let parameters = ScenarioParameters::from_path(dir.path()).unwrap();
        assert_eq!(
            parameters,
            ScenarioParameters {
                subproblems: vec![1, 2, 3],
                features: vec![Feature::CarbonCap, Feature::SpinningReserves],
            }
        );
        assert_eq!(parameters.next_subproblem(2), Some(3));
        assert_eq!(parameters.next_subproblem(3), None);
        assert_eq!(
            Feature::SpinningReserves.reserve_kind(),
            Some(ReserveKind::Spinning)
        );
    }

    #[test]
    fn test_scenario_parameters_defaults() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join(SCENARIO_PARAMETERS_FILE_NAME)).unwrap();

        let parameters = ScenarioParameters::from_path(dir.path()).unwrap();
        assert_eq!(parameters.subproblems, [1]);
        assert!(parameters.features.is_empty());
        assert!(!parameters.has_feature(Feature::CarbonCap));
    }

    #[test]
    fn test_scenario_parameters_unknown_feature() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(SCENARIO_PARAMETERS_FILE_NAME)).unwrap();
            writeln!(file, "features = [\"stages\"]").unwrap();
        }

        assert!(ScenarioParameters::from_path(dir.path()).is_err());
    }
}
