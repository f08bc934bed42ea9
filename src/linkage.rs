//! Resolution of the state preceding the first timepoint of a horizon.
//!
//! State-tracking constraints (storage energy, unit commitment) relate each timepoint to the one
//! before it. Within a horizon this is simply the adjacent timepoint. For a horizon's first
//! timepoint, it depends on the horizon's boundary type:
//!
//! * `circular`: the horizon's last timepoint in the same subproblem
//! * `linear`: nothing, so the constraint is skipped
//! * `linked`: the state recorded at the end of the previous subproblem, if there was one
use crate::project::ProjectID;
use crate::temporal::{BalancingType, BoundaryType, Horizon, LinkedTimepoint, TemporalInfo};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use log::{debug, warn};

pub mod store;
pub use store::{ArtifactStore, CsvArtifactStore, InMemoryArtifactStore, LinkedStateStore};

/// The state of a project in a timepoint, carried over from one subproblem to the next
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LinkedTimepointState {
    /// State of a storage project
    Storage {
        /// Energy stored at the start of the timepoint
        starting_energy_mwh: f64,
        /// Charging power during the timepoint
        charge_mw: f64,
        /// Discharging power during the timepoint
        discharge_mw: f64,
    },
    /// State of a project with capacity commitment
    Commitment {
        /// Capacity committed in the timepoint
        committed_mw: f64,
        /// Power provided in the timepoint
        power_mw: f64,
    },
}

/// Where the state preceding a timepoint comes from
#[derive(Debug, PartialEq)]
pub enum PreviousState<'a> {
    /// The given timepoint of the current subproblem
    Timepoint(u32),
    /// State recorded by the previous subproblem
    Linked {
        /// The recorded state
        state: &'a LinkedTimepointState,
        /// The previous subproblem's timepoint to which the state refers
        timepoint: &'a LinkedTimepoint,
    },
    /// There is no previous state, so continuity constraints are skipped
    Skip,
}

/// Supplies the previous state for timepoints of a subproblem
#[derive(Debug, Clone, Copy)]
pub struct LinkageResolver<'a> {
    temporal: &'a TemporalInfo,
    linked_states: Option<&'a LinkedStateStore>,
}

impl<'a> LinkageResolver<'a> {
    /// Create a new [`LinkageResolver`].
    ///
    /// # Arguments
    ///
    /// * `temporal` - The subproblem's temporal structure
    /// * `linked_states` - State published by the previous subproblem (`None` if there wasn't
    ///   any, e.g. for the first subproblem)
    pub fn new(temporal: &'a TemporalInfo, linked_states: Option<&'a LinkedStateStore>) -> Self {
        Self {
            temporal,
            linked_states,
        }
    }

    /// Work out where the state preceding `timepoint` comes from for a project
    pub fn previous_state(
        &self,
        project_id: &ProjectID,
        timepoint: u32,
        balancing_type: &BalancingType,
    ) -> Result<PreviousState<'a>> {
        let temporal = self.temporal;
        let horizon = temporal
            .horizon_of(timepoint, balancing_type)
            .with_context(|| {
                format!(
                    "Timepoint {timepoint} is not in any horizon of balancing type \
                    {balancing_type}"
                )
            })?;

        if let Some(previous) = temporal.previous_timepoint(timepoint, balancing_type) {
            return Ok(PreviousState::Timepoint(previous));
        }

        match horizon.boundary {
            BoundaryType::Linear => Ok(PreviousState::Skip),
            BoundaryType::Circular => Ok(PreviousState::Timepoint(horizon.last())),
            BoundaryType::Linked => self.resolve_linked(project_id, horizon),
        }
    }

    fn resolve_linked(&self, project_id: &ProjectID, horizon: &Horizon) -> Result<PreviousState<'a>> {
        let Some(linked_states) = self.linked_states else {
            debug!(
                "No linked state for horizon {} of balancing type {}: skipping continuity \
                for project {project_id}",
                horizon.id, horizon.balancing_type
            );
            return Ok(PreviousState::Skip);
        };

        let timepoint = self
            .temporal
            .linked_timepoint(0)
            .context("Linked state is available but linked timepoint 0 is not defined")?;

        match linked_states.get(project_id, 0) {
            Some(state) => Ok(PreviousState::Linked { state, timepoint }),
            None => {
                warn!(
                    "No linked state recorded for project {project_id}: skipping continuity in \
                    horizon {} of balancing type {}",
                    horizon.id, horizon.balancing_type
                );
                Ok(PreviousState::Skip)
            }
        }
    }
}

/// A timepoint whose state is handed over to a later subproblem
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimepointLink {
    /// Timepoint of the producing subproblem
    pub timepoint: u32,
    /// The subproblem which consumes the state
    pub subproblem_to_link: u32,
    /// Index of the linked timepoint in the consuming subproblem
    pub linked_timepoint: i32,
}

/// The timepoints to link for every subproblem
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkedSubproblemsMap(IndexMap<u32, Vec<TimepointLink>>);

impl LinkedSubproblemsMap {
    /// Add a link for the given subproblem.
    ///
    /// All links of a subproblem must hand over to the same subproblem, and each timepoint and
    /// linked timepoint can only appear once.
    pub fn insert(&mut self, subproblem: u32, link: TimepointLink) -> Result<()> {
        ensure!(
            link.linked_timepoint <= 0,
            "Linked timepoint index must not be positive (got {})",
            link.linked_timepoint
        );

        let links = self.0.entry(subproblem).or_default();
        for existing in links.iter() {
            ensure!(
                existing.subproblem_to_link == link.subproblem_to_link,
                "Subproblem {subproblem} cannot link to both subproblem {} and {}",
                existing.subproblem_to_link,
                link.subproblem_to_link
            );
            ensure!(
                existing.timepoint != link.timepoint,
                "Timepoint {} of subproblem {subproblem} is linked more than once",
                link.timepoint
            );
            ensure!(
                existing.linked_timepoint != link.linked_timepoint,
                "Linked timepoint {} of subproblem {} is defined more than once",
                link.linked_timepoint,
                link.subproblem_to_link
            );
        }
        links.push(link);

        Ok(())
    }

    /// The timepoints whose state subproblem `subproblem` must export
    pub fn timepoints_to_link(&self, subproblem: u32) -> &[TimepointLink] {
        self.0.get(&subproblem).map_or(&[], Vec::as_slice)
    }

    /// Iterate over subproblems which export state, with the subproblem they hand over to
    pub fn iter_handovers(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.0
            .iter()
            .filter_map(|(&from, links)| links.first().map(|link| (from, link.subproblem_to_link)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, horizon, periods, timepoints};
    use crate::period::PeriodInfo;
    use crate::temporal::Timepoint;
    use rstest::{fixture, rstest};

    #[fixture]
    fn temporal(periods: PeriodInfo, timepoints: Vec<Timepoint>) -> TemporalInfo {
        TemporalInfo::new(
            timepoints,
            vec![
                horizon("day", 1, BoundaryType::Circular, &[1, 2]),
                horizon("day", 2, BoundaryType::Linear, &[3]),
                horizon("day", 3, BoundaryType::Linked, &[4]),
                horizon("week", 1, BoundaryType::Linked, &[1, 2, 3, 4]),
            ],
            vec![LinkedTimepoint {
                index: 0,
                hours: 2.0,
                weight: 1.0,
            }],
            &periods,
        )
        .unwrap()
    }

    fn storage_state(starting_energy_mwh: f64) -> LinkedTimepointState {
        LinkedTimepointState::Storage {
            starting_energy_mwh,
            charge_mw: 0.0,
            discharge_mw: 0.0,
        }
    }

    #[rstest]
    fn test_previous_state_within_subproblem(temporal: TemporalInfo) {
        let resolver = LinkageResolver::new(&temporal, None);
        let project_id = ProjectID::new("Battery1");
        let day = BalancingType::new("day");

        // Adjacent timepoint
        assert_eq!(
            resolver.previous_state(&project_id, 2, &day).unwrap(),
            PreviousState::Timepoint(1)
        );

        // Circular wraps to the end of the horizon
        assert_eq!(
            resolver.previous_state(&project_id, 1, &day).unwrap(),
            PreviousState::Timepoint(2)
        );

        // Linear has no previous state
        assert_eq!(
            resolver.previous_state(&project_id, 3, &day).unwrap(),
            PreviousState::Skip
        );

        // Linked, but there was no previous subproblem
        assert_eq!(
            resolver.previous_state(&project_id, 4, &day).unwrap(),
            PreviousState::Skip
        );

        assert_error!(
            resolver.previous_state(&project_id, 1, &BalancingType::new("year")),
            "Timepoint 1 is not in any horizon of balancing type year"
        );
    }

    #[rstest]
    fn test_previous_state_linked(temporal: TemporalInfo) {
        let mut linked_states = LinkedStateStore::default();
        linked_states
            .insert("Battery1".into(), 0, storage_state(42.0))
            .unwrap();
        let resolver = LinkageResolver::new(&temporal, Some(&linked_states));
        let week = BalancingType::new("week");

        match resolver
            .previous_state(&"Battery1".into(), 1, &week)
            .unwrap()
        {
            PreviousState::Linked { state, timepoint } => {
                assert_eq!(*state, storage_state(42.0));
                assert_eq!(timepoint.index, 0);
            }
            other => panic!("Unexpected previous state: {other:?}"),
        }

        // Only the first timepoint of the horizon uses linked state
        assert_eq!(
            resolver.previous_state(&"Battery1".into(), 2, &week).unwrap(),
            PreviousState::Timepoint(1)
        );

        // No record for this project
        assert_eq!(
            resolver.previous_state(&"Battery2".into(), 1, &week).unwrap(),
            PreviousState::Skip
        );
    }

    #[test]
    fn test_linked_subproblems_map() {
        let link = |timepoint, subproblem_to_link, linked_timepoint| TimepointLink {
            timepoint,
            subproblem_to_link,
            linked_timepoint,
        };

        let mut map = LinkedSubproblemsMap::default();
        map.insert(1, link(24, 2, 0)).unwrap();
        map.insert(1, link(23, 2, -1)).unwrap();
        assert_eq!(map.timepoints_to_link(1).len(), 2);
        assert!(map.timepoints_to_link(2).is_empty());
        assert_eq!(map.iter_handovers().collect::<Vec<_>>(), [(1, 2)]);

        assert_error!(
            map.insert(1, link(22, 3, -2)),
            "Subproblem 1 cannot link to both subproblem 2 and 3"
        );
        assert_error!(
            map.insert(1, link(24, 2, -2)),
            "Timepoint 24 of subproblem 1 is linked more than once"
        );
        assert_error!(
            map.insert(1, link(22, 2, 0)),
            "Linked timepoint 0 of subproblem 2 is defined more than once"
        );
        assert_error!(
            map.insert(2, link(1, 3, 1)),
            "Linked timepoint index must not be positive (got 1)"
        );
    }
}
