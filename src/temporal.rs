//! Timepoints and the balancing segments ("horizons") which group them.
use crate::id::define_id_type;
use crate::period::PeriodInfo;
use anyhow::{Context, Result, ensure};
use indexmap::{IndexMap, IndexSet};
use serde_string_enum::DeserializeLabeledStringEnum;
use std::collections::HashMap;

define_id_type! {BalancingType}

/// The smallest unit of time in a subproblem
#[derive(PartialEq, Debug, Clone)]
pub struct Timepoint {
    /// Identifier for the timepoint
    pub id: u32,
    /// The period to which the timepoint belongs
    pub period: u32,
    /// Number of hours represented by the timepoint
    pub hours: f64,
    /// Number of times the timepoint occurs in a year
    pub weight: f64,
}

/// How the first timepoint of a horizon obtains its "previous" state
#[derive(PartialEq, Eq, Debug, Clone, Copy, DeserializeLabeledStringEnum)]
pub enum BoundaryType {
    /// The previous timepoint is the horizon's last timepoint
    #[string = "circular"]
    Circular,
    /// There is no previous timepoint, so continuity constraints are skipped
    #[string = "linear"]
    Linear,
    /// The previous state comes from the preceding subproblem
    #[string = "linked"]
    Linked,
}

/// A balancing segment: an ordered run of timepoints sharing continuity
#[derive(PartialEq, Debug, Clone)]
pub struct Horizon {
    /// Identifier for the horizon (unique within its balancing type)
    pub id: u32,
    /// The balancing type (e.g. "day") of the horizon
    pub balancing_type: BalancingType,
    /// Boundary condition for the horizon's first timepoint
    pub boundary: BoundaryType,
    /// Timepoints in order. Never empty once the horizon is part of a [`TemporalInfo`].
    pub timepoints: Vec<u32>,
}

impl Horizon {
    /// The first timepoint of the horizon
    pub fn first(&self) -> u32 {
        self.timepoints[0]
    }

    /// The last timepoint of the horizon
    pub fn last(&self) -> u32 {
        self.timepoints[self.timepoints.len() - 1]
    }
}

/// A timepoint of the previous subproblem whose state carries over to this one.
///
/// Index 0 is the timepoint immediately preceding this subproblem, -1 the one before it, etc.
#[derive(PartialEq, Debug, Clone)]
pub struct LinkedTimepoint {
    /// Index of the linked timepoint (never positive)
    pub index: i32,
    /// Number of hours represented by the timepoint
    pub hours: f64,
    /// Number of times the timepoint occurs in a year
    pub weight: f64,
}

/// The temporal structure of a subproblem
#[derive(PartialEq, Debug, Clone)]
pub struct TemporalInfo {
    timepoints: IndexMap<u32, Timepoint>,
    horizons: IndexMap<(BalancingType, u32), Horizon>,
    /// Horizon ID for every (timepoint, balancing type)
    horizon_of: HashMap<(u32, BalancingType), u32>,
    linked_timepoints: IndexMap<i32, LinkedTimepoint>,
}

impl TemporalInfo {
    /// Create a new [`TemporalInfo`], checking that its components are consistent.
    ///
    /// # Arguments
    ///
    /// * `timepoints` - The subproblem's timepoints, in order
    /// * `horizons` - The horizons for every balancing type
    /// * `linked_timepoints` - Timepoints from the previous subproblem (may be empty)
    /// * `periods` - All periods in the scenario
    pub fn new(
        timepoints: Vec<Timepoint>,
        horizons: Vec<Horizon>,
        linked_timepoints: Vec<LinkedTimepoint>,
        periods: &PeriodInfo,
    ) -> Result<Self> {
        let mut timepoint_map = IndexMap::new();
        for timepoint in timepoints {
            ensure!(
                periods.contains(timepoint.period),
                "Timepoint {} is in unknown period {}",
                timepoint.id,
                timepoint.period
            );
            check_duration(timepoint.hours, timepoint.weight)
                .with_context(|| format!("Invalid timepoint {}", timepoint.id))?;
            let id = timepoint.id;
            ensure!(
                timepoint_map.insert(id, timepoint).is_none(),
                "Duplicate timepoint {id}"
            );
        }
        ensure!(!timepoint_map.is_empty(), "No timepoints defined");

        let mut horizon_map = IndexMap::new();
        let mut horizon_of = HashMap::new();
        for horizon in horizons {
            ensure!(
                !horizon.timepoints.is_empty(),
                "Horizon {} of balancing type {} has no timepoints",
                horizon.id,
                horizon.balancing_type
            );
            for &timepoint in &horizon.timepoints {
                ensure!(
                    timepoint_map.contains_key(&timepoint),
                    "Horizon {} of balancing type {} contains unknown timepoint {timepoint}",
                    horizon.id,
                    horizon.balancing_type
                );
                let key = (timepoint, horizon.balancing_type.clone());
                ensure!(
                    horizon_of.insert(key, horizon.id).is_none(),
                    "Timepoint {timepoint} is in more than one horizon of balancing type {}",
                    horizon.balancing_type
                );
            }

            let key = (horizon.balancing_type.clone(), horizon.id);
            ensure!(
                !horizon_map.contains_key(&key),
                "Duplicate horizon {} for balancing type {}",
                horizon.id,
                horizon.balancing_type
            );
            horizon_map.insert(key, horizon);
        }

        // Every timepoint must belong to a horizon of every balancing type
        let balancing_types: IndexSet<_> = horizon_map.keys().map(|(bt, _)| bt.clone()).collect();
        for balancing_type in &balancing_types {
            for &timepoint in timepoint_map.keys() {
                ensure!(
                    horizon_of.contains_key(&(timepoint, balancing_type.clone())),
                    "Timepoint {timepoint} is not in any horizon of balancing type {balancing_type}"
                );
            }
        }

        let mut linked_map = IndexMap::new();
        for linked in linked_timepoints {
            ensure!(
                linked.index <= 0,
                "Linked timepoint index must not be positive (got {})",
                linked.index
            );
            check_duration(linked.hours, linked.weight)
                .with_context(|| format!("Invalid linked timepoint {}", linked.index))?;
            let index = linked.index;
            ensure!(
                linked_map.insert(index, linked).is_none(),
                "Duplicate linked timepoint {index}"
            );
        }
        linked_map.sort_keys();

        Ok(Self {
            timepoints: timepoint_map,
            horizons: horizon_map,
            horizon_of,
            linked_timepoints: linked_map,
        })
    }

    /// Iterate over all timepoints in order
    pub fn iter_timepoints(&self) -> impl Iterator<Item = &Timepoint> {
        self.timepoints.values()
    }

    /// Get the timepoint with the given ID
    pub fn timepoint(&self, id: u32) -> Option<&Timepoint> {
        self.timepoints.get(&id)
    }

    /// Iterate over the timepoints in the given period
    pub fn timepoints_in_period(&self, period: u32) -> impl Iterator<Item = &Timepoint> {
        self.timepoints
            .values()
            .filter(move |timepoint| timepoint.period == period)
    }

    /// The distinct periods covered by this subproblem's timepoints, in order
    pub fn periods(&self) -> Vec<u32> {
        self.timepoints
            .values()
            .map(|timepoint| timepoint.period)
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    /// Iterate over the horizons
    pub fn iter_horizons(&self) -> impl Iterator<Item = &Horizon> {
        self.horizons.values()
    }

    /// Whether horizons are defined for the given balancing type
    pub fn has_balancing_type(&self, balancing_type: &BalancingType) -> bool {
        self.horizons.keys().any(|(bt, _)| bt == balancing_type)
    }

    /// Get the horizon of the given balancing type to which a timepoint belongs
    pub fn horizon_of(&self, timepoint: u32, balancing_type: &BalancingType) -> Option<&Horizon> {
        let horizon_id = self
            .horizon_of
            .get(&(timepoint, balancing_type.clone()))?;
        self.horizons.get(&(balancing_type.clone(), *horizon_id))
    }

    /// Whether the timepoint is the first of its horizon for the given balancing type
    pub fn is_first_timepoint(&self, timepoint: u32, balancing_type: &BalancingType) -> bool {
        self.horizon_of(timepoint, balancing_type)
            .is_some_and(|horizon| horizon.first() == timepoint)
    }

    /// Get the timepoint immediately before this one in its horizon.
    ///
    /// Returns `None` for the first timepoint of a horizon (or an unknown timepoint); boundary
    /// conditions are handled by [`crate::linkage::LinkageResolver`].
    pub fn previous_timepoint(&self, timepoint: u32, balancing_type: &BalancingType) -> Option<u32> {
        let horizon = self.horizon_of(timepoint, balancing_type)?;
        let pos = horizon.timepoints.iter().position(|&t| t == timepoint)?;
        pos.checked_sub(1).map(|prev| horizon.timepoints[prev])
    }

    /// Get the linked timepoint with the given index
    pub fn linked_timepoint(&self, index: i32) -> Option<&LinkedTimepoint> {
        self.linked_timepoints.get(&index)
    }

    /// Iterate over linked timepoints, earliest first
    pub fn iter_linked_timepoints(&self) -> impl Iterator<Item = &LinkedTimepoint> {
        self.linked_timepoints.values()
    }
}

/// Check the duration and weighting of a timepoint
fn check_duration(hours: f64, weight: f64) -> Result<()> {
    ensure!(
        hours.is_finite() && hours > 0.0,
        "hours_in_timepoint must be a finite number greater than zero"
    );
    ensure!(
        weight.is_finite() && weight > 0.0,
        "timepoint_weight must be a finite number greater than zero"
    );

    Ok(())
}
