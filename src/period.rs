//! Planning periods and the rules for working out when capacity of a given vintage can operate.
//!
//! A vintage is simply a period in which capacity is built. Capacity built in vintage `v` with a
//! lifetime of `L` years is operational in every period `p` whose start year lies in the
//! right-open interval `[start_year(v), start_year(v) + L)`.
use crate::project::ProjectID;
use anyhow::{Context, Result, ensure};
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;

/// Lifetimes in years, keyed by project and vintage
pub type VintageLifetimeMap = IndexMap<(ProjectID, u32), f64>;

/// A planning period
#[derive(PartialEq, Debug, Clone)]
pub struct Period {
    /// Identifier for the period (conventionally its first year, e.g. 2030)
    pub id: u32,
    /// First year covered by the period
    pub start_year: u32,
    /// First year *after* the period
    pub end_year: u32,
    /// Factor applied to costs incurred in the period
    pub discount_factor: f64,
    /// Number of years whose costs are represented by a single year of the period
    pub number_years_represented: f64,
}

/// An ordered collection of contiguous, non-overlapping periods
#[derive(PartialEq, Debug, Clone)]
pub struct PeriodInfo(IndexMap<u32, Period>);

impl PeriodInfo {
    /// Create a new [`PeriodInfo`] from periods in order, checking that they are valid
    pub fn new<I>(periods: I) -> Result<Self>
    where
        I: IntoIterator<Item = Period>,
    {
        let mut map: IndexMap<u32, Period> = IndexMap::new();
        for period in periods {
            check_period(&period).with_context(|| format!("Invalid period {}", period.id))?;

            if let Some((_, last)) = map.last() {
                ensure!(
                    period.id > last.id,
                    "Periods must be in order and unique (period {} follows {})",
                    period.id,
                    last.id
                );
                ensure!(
                    period.start_year == last.end_year,
                    "Period {} must start in the year period {} ends ({})",
                    period.id,
                    last.id,
                    last.end_year
                );
            }

            map.insert(period.id, period);
        }

        ensure!(!map.is_empty(), "At least one period must be defined");

        Ok(Self(map))
    }

    /// Get the period with the given ID
    pub fn get(&self, id: u32) -> Option<&Period> {
        self.0.get(&id)
    }

    /// Whether a period with the given ID exists
    pub fn contains(&self, id: u32) -> bool {
        self.0.contains_key(&id)
    }

    /// Iterate over the periods in order
    pub fn iter(&self) -> impl Iterator<Item = &Period> {
        self.0.values()
    }

    /// Iterate over the period IDs in order
    pub fn iter_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.keys().copied()
    }

    /// The number of periods
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no periods (never true for a validated [`PeriodInfo`])
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Check the values for an individual period
fn check_period(period: &Period) -> Result<()> {
    ensure!(
        period.start_year < period.end_year,
        "start_year ({}) must be before end_year ({})",
        period.start_year,
        period.end_year
    );
    ensure!(
        period.discount_factor.is_finite() && period.discount_factor > 0.0,
        "discount_factor must be a finite number greater than zero"
    );
    ensure!(
        period.number_years_represented.is_finite() && period.number_years_represented > 0.0,
        "number_years_represented must be a finite number greater than zero"
    );

    Ok(())
}

/// Get the periods in which capacity of the given vintage is operational.
///
/// A period is included if its start year falls within
/// `[start_year(vintage), start_year(vintage) + lifetime)`. The window is empty if the lifetime is
/// not positive (or is NaN). It is also legal for the window to be empty because there are no
/// later periods, e.g. for a vintage with a short lifetime in the final period.
///
/// # Arguments
///
/// * `periods` - All periods in the scenario
/// * `vintage` - The period in which capacity is built
/// * `lifetime` - Lifetime of the capacity in years
///
/// # Returns
///
/// The IDs of the operational periods, in order, or an error if the vintage is unknown.
pub fn operational_periods_by_vintage(
    periods: &PeriodInfo,
    vintage: u32,
    lifetime: f64,
) -> Result<Vec<u32>> {
    let vintage_start = periods
        .get(vintage)
        .with_context(|| format!("Unknown vintage {vintage}"))?
        .start_year as f64;

    if lifetime.is_nan() || lifetime <= 0.0 {
        return Ok(Vec::new());
    }

    let window_end = vintage_start + lifetime;
    Ok(periods
        .iter()
        .filter(|period| {
            let start = period.start_year as f64;
            vintage_start <= start && start < window_end
        })
        .map(|period| period.id)
        .collect())
}

/// Get the union of the operational windows of every (project, vintage) pair.
///
/// The returned pairs are sorted by project and then by period, without duplicates.
pub fn project_operational_periods(
    periods: &PeriodInfo,
    lifetimes: &VintageLifetimeMap,
) -> Result<IndexSet<(ProjectID, u32)>> {
    let mut pairs = Vec::new();
    for ((project_id, vintage), lifetime) in lifetimes {
        let window = operational_periods_by_vintage(periods, *vintage, *lifetime)
            .with_context(|| format!("Invalid vintage for project {project_id}"))?;
        pairs.extend(window.into_iter().map(|period| (project_id.clone(), period)));
    }

    Ok(pairs.into_iter().sorted().dedup().collect())
}

/// Get the (project, vintage) pairs whose capacity is operational in the given period.
///
/// This is the inverse of [`operational_periods_by_vintage`] and is used to sum the capacity built
/// in every vintage which is still alive in a period.
pub fn vintages_operational_in_period(
    periods: &PeriodInfo,
    lifetimes: &VintageLifetimeMap,
    period: u32,
) -> Result<Vec<(ProjectID, u32)>> {
    let mut out = Vec::new();
    for ((project_id, vintage), lifetime) in lifetimes {
        if operational_periods_by_vintage(periods, *vintage, *lifetime)?.contains(&period) {
            out.push((project_id.clone(), *vintage));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, periods};
    use rstest::rstest;

    fn period(id: u32, start_year: u32, end_year: u32) -> Period {
        Period {
            id,
            start_year,
            end_year,
            discount_factor: 1.0,
            number_years_represented: 5.0,
        }
    }

    #[rstest]
    fn test_battery_window(periods: PeriodInfo) {
        // 2030 is exactly start_year(2020) + 10 so is excluded
        assert_eq!(
            operational_periods_by_vintage(&periods, 2020, 10.0).unwrap(),
            [2020, 2025]
        );

        // 2035 is not reached by a lifetime of 15 years either
        assert_eq!(
            operational_periods_by_vintage(&periods, 2020, 15.0).unwrap(),
            [2020, 2025, 2030]
        );
    }

    #[rstest]
    #[case(5.0, &[2020])]
    #[case(5.5, &[2020, 2025])]
    #[case(15.0, &[2020, 2025, 2030])]
    #[case(100.0, &[2020, 2025, 2030, 2035, 2040])]
    #[case(0.0, &[])]
    #[case(-3.0, &[])]
    #[case(f64::NAN, &[])]
    fn test_window_boundaries(periods: PeriodInfo, #[case] lifetime: f64, #[case] expected: &[u32]) {
        assert_eq!(
            operational_periods_by_vintage(&periods, 2020, lifetime).unwrap(),
            expected
        );
    }

    #[rstest]
    fn test_window_is_monotonic_in_lifetime(periods: PeriodInfo) {
        let mut last = Vec::new();
        for lifetime in [0.0, 1.0, 5.0, 7.5, 10.0, 12.0, 25.0, 40.0] {
            let window = operational_periods_by_vintage(&periods, 2025, lifetime).unwrap();
            assert!(last.iter().all(|p| window.contains(p)));
            last = window;
        }
    }

    #[rstest]
    fn test_terminal_vintage(periods: PeriodInfo) {
        // Built in the last period, but never lives long enough to reach another one
        assert_eq!(
            operational_periods_by_vintage(&periods, 2040, 5.0).unwrap(),
            [2040]
        );
        assert!(operational_periods_by_vintage(&periods, 2040, 0.0)
            .unwrap()
            .is_empty());
    }

    #[rstest]
    fn test_unknown_vintage(periods: PeriodInfo) {
        assert_error!(
            operational_periods_by_vintage(&periods, 2021, 10.0),
            "Unknown vintage 2021"
        );
    }

    #[rstest]
    fn test_project_operational_periods(periods: PeriodInfo) {
        let lifetimes = VintageLifetimeMap::from_iter([
            (("Wind".into(), 2025), 10.0),
            (("Battery1".into(), 2030), 5.0),
            (("Battery1".into(), 2020), 15.0),
        ]);
        let pairs = project_operational_periods(&periods, &lifetimes).unwrap();
        let expected: Vec<(ProjectID, u32)> = vec![
            ("Battery1".into(), 2020),
            ("Battery1".into(), 2025),
            ("Battery1".into(), 2030),
            ("Wind".into(), 2025),
            ("Wind".into(), 2030),
        ];
        assert_eq!(pairs.into_iter().collect::<Vec<_>>(), expected);
    }

    #[rstest]
    fn test_vintages_operational_in_period(periods: PeriodInfo) {
        let lifetimes = VintageLifetimeMap::from_iter([
            (("Battery1".into(), 2020), 10.0),
            (("Battery1".into(), 2025), 10.0),
            (("Battery1".into(), 2035), 10.0),
        ]);
        let expected: Vec<(ProjectID, u32)> =
            vec![("Battery1".into(), 2020), ("Battery1".into(), 2025)];
        assert_eq!(
            vintages_operational_in_period(&periods, &lifetimes, 2025).unwrap(),
            expected
        );
        assert!(
            vintages_operational_in_period(&periods, &lifetimes, 2030)
                .unwrap()
                .iter()
                .all(|(_, vintage)| *vintage == 2025)
        );
    }

    #[test]
    fn test_period_info_new_invalid() {
        assert_error!(
            PeriodInfo::new(Vec::new()),
            "At least one period must be defined"
        );
        assert_error!(
            PeriodInfo::new([period(2020, 2020, 2025), period(2020, 2025, 2030)]),
            "Periods must be in order and unique (period 2020 follows 2020)"
        );
        assert_error!(
            PeriodInfo::new([period(2020, 2020, 2025), period(2030, 2030, 2035)]),
            "Period 2030 must start in the year period 2020 ends (2025)"
        );
        assert_error!(
            PeriodInfo::new([period(2020, 2025, 2020)]),
            "Invalid period 2020"
        );

        let mut bad = period(2020, 2020, 2025);
        bad.discount_factor = 0.0;
        assert!(PeriodInfo::new([bad]).is_err());
    }
}
