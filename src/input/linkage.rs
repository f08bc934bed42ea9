//! Code for reading the map of timepoints linked between subproblems.
use super::*;
use crate::linkage::{LinkedSubproblemsMap, TimepointLink};
use crate::scenario::parameters::ScenarioParameters;
use serde::Deserialize;
use std::path::Path;

const LINKED_SUBPROBLEMS_MAP_FILE_NAME: &str = "linked_subproblems_map.csv";

#[derive(PartialEq, Debug, Deserialize)]
struct TimepointLinkRaw {
    subproblem: u32,
    timepoint: u32,
    subproblem_to_link: u32,
    linked_timepoint: i32,
}

/// Read which timepoints of each subproblem hand their state over to the next.
///
/// The file is optional: without it, no state is carried between subproblems.
///
/// # Arguments
///
/// * `scenario_dir` - Folder containing scenario input files
/// * `parameters` - Scenario parameters, which define the order of subproblems
pub fn read_linked_subproblems_map(
    scenario_dir: &Path,
    parameters: &ScenarioParameters,
) -> Result<LinkedSubproblemsMap> {
    let file_path = scenario_dir.join(LINKED_SUBPROBLEMS_MAP_FILE_NAME);
    let links_csv = read_csv_optional(&file_path)?;
    read_linked_subproblems_map_from_iter(links_csv, parameters)
        .with_context(|| input_err_msg(&file_path))
}

fn read_linked_subproblems_map_from_iter<I>(
    iter: I,
    parameters: &ScenarioParameters,
) -> Result<LinkedSubproblemsMap>
where
    I: Iterator<Item = TimepointLinkRaw>,
{
    let mut map = LinkedSubproblemsMap::default();
    for raw in iter {
        ensure!(
            parameters.subproblems.contains(&raw.subproblem),
            "Unknown subproblem {}",
            raw.subproblem
        );

        // State can only be handed to the subproblem solved immediately afterwards
        let next = parameters.next_subproblem(raw.subproblem).with_context(|| {
            format!(
                "Subproblem {} is the last subproblem so cannot link to subproblem {}",
                raw.subproblem, raw.subproblem_to_link
            )
        })?;
        ensure!(
            raw.subproblem_to_link == next,
            "Subproblem {} can only link to the next subproblem ({next}), not {}",
            raw.subproblem,
            raw.subproblem_to_link
        );

        map.insert(
            raw.subproblem,
            TimepointLink {
                timepoint: raw.timepoint,
                subproblem_to_link: raw.subproblem_to_link,
                linked_timepoint: raw.linked_timepoint,
            },
        )?;
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;

    fn parameters() -> ScenarioParameters {
        ScenarioParameters {
            subproblems: vec![1, 2, 3],
            features: Vec::new(),
        }
    }

    fn link(subproblem: u32, timepoint: u32, subproblem_to_link: u32) -> TimepointLinkRaw {
        TimepointLinkRaw {
            subproblem,
            timepoint,
            subproblem_to_link,
            linked_timepoint: 0,
        }
    }

    #[test]
    fn test_read_linked_subproblems_map_from_iter() {
        let map = read_linked_subproblems_map_from_iter(
            [link(1, 24, 2), link(2, 48, 3)].into_iter(),
            &parameters(),
        )
        .unwrap();
        assert_eq!(map.timepoints_to_link(1)[0].timepoint, 24);
        assert_eq!(map.timepoints_to_link(2)[0].subproblem_to_link, 3);
        assert!(map.timepoints_to_link(3).is_empty());
    }

    #[test]
    fn test_read_linked_subproblems_map_from_iter_invalid() {
        assert_error!(
            read_linked_subproblems_map_from_iter([link(4, 1, 5)].into_iter(), &parameters()),
            "Unknown subproblem 4"
        );
        assert_error!(
            read_linked_subproblems_map_from_iter([link(3, 1, 4)].into_iter(), &parameters()),
            "Subproblem 3 is the last subproblem so cannot link to subproblem 4"
        );
        assert_error!(
            read_linked_subproblems_map_from_iter([link(1, 24, 3)].into_iter(), &parameters()),
            "Subproblem 1 can only link to the next subproblem (2), not 3"
        );
    }
}
