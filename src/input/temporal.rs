//! Code for reading a subproblem's timepoints and horizons from CSV files.
use super::*;
use crate::period::PeriodInfo;
use crate::temporal::{BalancingType, BoundaryType, Horizon, LinkedTimepoint, TemporalInfo, Timepoint};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const TIMEPOINTS_FILE_NAME: &str = "timepoints.csv";
const HORIZONS_FILE_NAME: &str = "horizons.csv";
const HORIZON_TIMEPOINTS_FILE_NAME: &str = "horizon_timepoints.csv";
const LINKED_TIMEPOINTS_FILE_NAME: &str = "linked_timepoints.csv";

fn default_timepoint_weight() -> f64 {
    1.0
}

#[derive(PartialEq, Debug, Deserialize)]
struct TimepointRaw {
    timepoint: u32,
    period: u32,
    hours_in_timepoint: f64,
    #[serde(default = "default_timepoint_weight")]
    timepoint_weight: f64,
}

#[derive(PartialEq, Debug, Deserialize)]
struct HorizonRaw {
    balancing_type: String,
    horizon: u32,
    boundary: BoundaryType,
}

#[derive(PartialEq, Debug, Deserialize)]
struct HorizonTimepointRaw {
    balancing_type: String,
    horizon: u32,
    timepoint: u32,
}

#[derive(PartialEq, Debug, Deserialize)]
struct LinkedTimepointRaw {
    linked_timepoint: i32,
    hours_in_timepoint: f64,
    #[serde(default = "default_timepoint_weight")]
    timepoint_weight: f64,
}

/// Read the temporal structure of a subproblem.
///
/// # Arguments
///
/// * `subproblem_dir` - Folder containing the subproblem's input files
/// * `periods` - All periods in the scenario
pub fn read_temporal_info(subproblem_dir: &Path, periods: &PeriodInfo) -> Result<TemporalInfo> {
    let file_path = subproblem_dir.join(TIMEPOINTS_FILE_NAME);
    let timepoints = read_csv(&file_path)?
        .map(|raw: TimepointRaw| Timepoint {
            id: raw.timepoint,
            period: raw.period,
            hours: raw.hours_in_timepoint,
            weight: raw.timepoint_weight,
        })
        .collect();

    let horizons_path = subproblem_dir.join(HORIZONS_FILE_NAME);
    let horizon_timepoints_path = subproblem_dir.join(HORIZON_TIMEPOINTS_FILE_NAME);
    let horizons = read_horizons_from_iter(
        read_csv(&horizons_path)?,
        read_csv(&horizon_timepoints_path)?,
    )
    .with_context(|| input_err_msg(&horizon_timepoints_path))?;

    let linked_timepoints = read_csv_optional(&subproblem_dir.join(LINKED_TIMEPOINTS_FILE_NAME))?
        .map(|raw: LinkedTimepointRaw| LinkedTimepoint {
            index: raw.linked_timepoint,
            hours: raw.hours_in_timepoint,
            weight: raw.timepoint_weight,
        })
        .collect();

    TemporalInfo::new(timepoints, horizons, linked_timepoints, periods)
        .with_context(|| format!("Invalid timepoints in {}", subproblem_dir.display()))
}

/// Combine horizon definitions with their member timepoints, preserving the order of both files
fn read_horizons_from_iter<I, J>(horizons: I, horizon_timepoints: J) -> Result<Vec<Horizon>>
where
    I: Iterator<Item = HorizonRaw>,
    J: Iterator<Item = HorizonTimepointRaw>,
{
    let mut map = IndexMap::new();
    for raw in horizons {
        let balancing_type = BalancingType::from(raw.balancing_type);
        ensure!(
            !map.contains_key(&(balancing_type.clone(), raw.horizon)),
            "Duplicate horizon {} for balancing type {balancing_type}",
            raw.horizon
        );
        let horizon = Horizon {
            id: raw.horizon,
            balancing_type: balancing_type.clone(),
            boundary: raw.boundary,
            timepoints: Vec::new(),
        };
        map.insert((balancing_type, raw.horizon), horizon);
    }

    for raw in horizon_timepoints {
        let key = (BalancingType::from(raw.balancing_type), raw.horizon);
        let horizon = map.get_mut(&key).with_context(|| {
            format!(
                "Timepoint {} is in unknown horizon {} of balancing type {}",
                raw.timepoint, key.1, key.0
            )
        })?;
        horizon.timepoints.push(raw.timepoint);
    }

    Ok(map.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, periods};
    use rstest::rstest;
    use std::fs;
    use tempfile::tempdir;

    fn horizon_raw(balancing_type: &str, horizon: u32, boundary: BoundaryType) -> HorizonRaw {
        HorizonRaw {
            balancing_type: balancing_type.into(),
            horizon,
            boundary,
        }
    }

    fn horizon_timepoint_raw(balancing_type: &str, horizon: u32, timepoint: u32) -> HorizonTimepointRaw {
        HorizonTimepointRaw {
            balancing_type: balancing_type.into(),
            horizon,
            timepoint,
        }
    }

    #[test]
    fn test_read_horizons_from_iter() {
        let horizons = read_horizons_from_iter(
            [
                horizon_raw("day", 1, BoundaryType::Linked),
                horizon_raw("day", 2, BoundaryType::Circular),
            ]
            .into_iter(),
            [
                horizon_timepoint_raw("day", 2, 3),
                horizon_timepoint_raw("day", 1, 1),
                horizon_timepoint_raw("day", 1, 2),
            ]
            .into_iter(),
        )
        .unwrap();
        assert_eq!(horizons.len(), 2);
        assert_eq!(horizons[0].timepoints, [1, 2]);
        assert_eq!(horizons[0].boundary, BoundaryType::Linked);
        assert_eq!(horizons[1].timepoints, [3]);

        assert_error!(
            read_horizons_from_iter(
                [horizon_raw("day", 1, BoundaryType::Linear)].into_iter(),
                [horizon_timepoint_raw("week", 1, 1)].into_iter(),
            ),
            "Timepoint 1 is in unknown horizon 1 of balancing type week"
        );
    }

    #[rstest]
    fn test_read_temporal_info(periods: PeriodInfo) {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(TIMEPOINTS_FILE_NAME),
            "timepoint,period,hours_in_timepoint,timepoint_weight\n1,2020,12,365\n2,2020,12,365\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(HORIZONS_FILE_NAME),
            "balancing_type,horizon,boundary\nday,1,circular\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(HORIZON_TIMEPOINTS_FILE_NAME),
            "balancing_type,horizon,timepoint\nday,1,1\nday,1,2\n",
        )
        .unwrap();

        let info = read_temporal_info(dir.path(), &periods).unwrap();
        assert_eq!(info.iter_timepoints().count(), 2);
        assert_eq!(info.timepoint(2).unwrap().weight, 365.0);
        assert!(info.iter_linked_timepoints().next().is_none());

        fs::write(
            dir.path().join(LINKED_TIMEPOINTS_FILE_NAME),
            "linked_timepoint,hours_in_timepoint\n0,12\n",
        )
        .unwrap();
        let info = read_temporal_info(dir.path(), &periods).unwrap();
        assert_eq!(info.linked_timepoint(0).unwrap().hours, 12.0);
    }
}
