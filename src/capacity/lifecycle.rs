//! Aggregation of the operational periods contributed by each capacity type.
use crate::project::ProjectID;
use anyhow::{Result, ensure};
use indexmap::{IndexMap, IndexSet};
use std::rc::Rc;

/// Collects the (project, period) pairs contributed by capacity types, in any order
#[derive(Default, Debug)]
pub struct OperationalPeriodsBuilder {
    contributors: IndexSet<Rc<str>>,
    pairs: IndexMap<(ProjectID, u32), Rc<str>>,
}

impl OperationalPeriodsBuilder {
    /// Add the operational periods of one capacity type.
    ///
    /// A capacity type may only contribute once and no (project, period) pair may be claimed by
    /// more than one capacity type. Repeated pairs within one contribution are merged.
    pub fn add<I>(&mut self, capacity_type: &str, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (ProjectID, u32)>,
    {
        let capacity_type: Rc<str> = Rc::from(capacity_type);
        ensure!(
            self.contributors.insert(Rc::clone(&capacity_type)),
            "Capacity type {capacity_type} has already contributed operational periods"
        );

        for (project_id, period) in pairs {
            if let Some(existing) = self.pairs.get(&(project_id.clone(), period)) {
                ensure!(
                    *existing == capacity_type,
                    "Project {project_id} is operational in period {period} under both capacity \
                    types {existing} and {capacity_type}"
                );
                continue;
            }
            self.pairs
                .insert((project_id, period), Rc::clone(&capacity_type));
        }

        Ok(())
    }

    /// Union the contributions into the canonical relation
    pub fn build(mut self) -> ProjectOperationalPeriods {
        self.pairs.sort_keys();

        let mut by_project: IndexMap<ProjectID, Vec<u32>> = IndexMap::new();
        let mut by_period: IndexMap<u32, Vec<ProjectID>> = IndexMap::new();
        for (project_id, period) in self.pairs.keys() {
            by_project
                .entry(project_id.clone())
                .or_default()
                .push(*period);
            by_period
                .entry(*period)
                .or_default()
                .push(project_id.clone());
        }
        by_period.sort_keys();

        ProjectOperationalPeriods {
            pairs: self.pairs,
            by_project,
            by_period,
        }
    }
}

/// The periods in which each project is operational, across all capacity types.
///
/// Iteration is ordered by project and then by period.
#[derive(Default, Debug, PartialEq)]
pub struct ProjectOperationalPeriods {
    pairs: IndexMap<(ProjectID, u32), Rc<str>>,
    by_project: IndexMap<ProjectID, Vec<u32>>,
    by_period: IndexMap<u32, Vec<ProjectID>>,
}

impl ProjectOperationalPeriods {
    /// Iterate over (project, period, capacity type)
    pub fn iter(&self) -> impl Iterator<Item = (&ProjectID, u32, &str)> {
        self.pairs
            .iter()
            .map(|((project_id, period), capacity_type)| (project_id, *period, &**capacity_type))
    }

    /// Whether the project is operational in the period
    pub fn contains(&self, project_id: &ProjectID, period: u32) -> bool {
        self.pairs.contains_key(&(project_id.clone(), period))
    }

    /// The periods in which the project is operational, in order
    pub fn periods_for_project(&self, project_id: &ProjectID) -> &[u32] {
        self.by_project
            .get(project_id)
            .map_or(&[], |periods| periods.as_slice())
    }

    /// The projects which are operational in the period, in order
    pub fn projects_in_period(&self, period: u32) -> &[ProjectID] {
        self.by_period
            .get(&period)
            .map_or(&[], |projects| projects.as_slice())
    }

    /// The capacity type which contributed the (project, period) pair
    pub fn capacity_type_of(&self, project_id: &ProjectID, period: u32) -> Option<&str> {
        self.pairs
            .get(&(project_id.clone(), period))
            .map(|capacity_type| &**capacity_type)
    }

    /// The number of (project, period) pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether no project is ever operational
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;

    fn pairs(project: &str, periods: &[u32]) -> Vec<(ProjectID, u32)> {
        periods
            .iter()
            .map(|period| (ProjectID::new(project), *period))
            .collect()
    }

    #[test]
    fn test_union_is_ordered_and_complete() {
        let mut builder = OperationalPeriodsBuilder::default();
        builder.add("gen_new_lin", pairs("Wind", &[2030, 2025])).unwrap();
        builder
            .add("gen_spec", pairs("Wind", &[2020]).into_iter().chain(pairs("Coal", &[2020, 2020])))
            .unwrap();
        let operational = builder.build();

        // Two non-overlapping contributions for Wind: nothing lost, nothing duplicated
        assert_eq!(operational.periods_for_project(&"Wind".into()), [2020, 2025, 2030]);
        assert_eq!(operational.len(), 4);
        assert_eq!(
            operational
                .iter()
                .map(|(project_id, period, _)| (project_id.to_string(), period))
                .collect::<Vec<_>>(),
            [
                ("Coal".to_string(), 2020),
                ("Wind".to_string(), 2020),
                ("Wind".to_string(), 2025),
                ("Wind".to_string(), 2030)
            ]
        );
        assert_eq!(
            operational.projects_in_period(2020),
            [ProjectID::new("Coal"), ProjectID::new("Wind")]
        );
        assert!(operational.projects_in_period(2040).is_empty());
        assert_eq!(
            operational.capacity_type_of(&"Wind".into(), 2025),
            Some("gen_new_lin")
        );
        assert!(operational.contains(&"Coal".into(), 2020));
        assert!(!operational.contains(&"Coal".into(), 2025));
    }

    #[test]
    fn test_order_of_contributions_does_not_matter() {
        let mut first = OperationalPeriodsBuilder::default();
        first.add("a", pairs("P1", &[2025])).unwrap();
        first.add("b", pairs("P2", &[2020])).unwrap();

        let mut second = OperationalPeriodsBuilder::default();
        second.add("b", pairs("P2", &[2020])).unwrap();
        second.add("a", pairs("P1", &[2025])).unwrap();

        assert!(first.build().iter().eq(second.build().iter()));
    }

    #[test]
    fn test_conflicting_claims() {
        let mut builder = OperationalPeriodsBuilder::default();
        builder.add("gen_spec", pairs("ProjectX", &[2030])).unwrap();
        assert_error!(
            builder.add("gen_new_lin", pairs("ProjectX", &[2025, 2030])),
            "Project ProjectX is operational in period 2030 under both capacity types gen_spec \
            and gen_new_lin"
        );
    }

    #[test]
    fn test_contributing_twice() {
        let mut builder = OperationalPeriodsBuilder::default();
        builder.add("gen_spec", pairs("Coal", &[2020])).unwrap();
        assert_error!(
            builder.add("gen_spec", pairs("Nuclear", &[2020])),
            "Capacity type gen_spec has already contributed operational periods"
        );
    }
}
