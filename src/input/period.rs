//! Code for reading planning periods from a CSV file.
use super::*;
use crate::period::{Period, PeriodInfo};
use serde::Deserialize;
use std::path::Path;

const PERIODS_FILE_NAME: &str = "periods.csv";

#[derive(PartialEq, Debug, Deserialize)]
struct PeriodRaw {
    period: u32,
    start_year: u32,
    end_year: u32,
    discount_factor: f64,
    number_years_represented: f64,
}

/// Read periods from the scenario directory.
///
/// # Arguments
///
/// * `scenario_dir` - Folder containing scenario input files
///
/// # Returns
///
/// The validated periods, in order, or an error.
pub fn read_periods(scenario_dir: &Path) -> Result<PeriodInfo> {
    let file_path = scenario_dir.join(PERIODS_FILE_NAME);
    let periods_csv = read_csv(&file_path)?;
    read_periods_from_iter(periods_csv).with_context(|| input_err_msg(&file_path))
}

fn read_periods_from_iter<I>(iter: I) -> Result<PeriodInfo>
where
    I: Iterator<Item = PeriodRaw>,
{
    PeriodInfo::new(iter.map(|raw| Period {
        id: raw.period,
        start_year: raw.start_year,
        end_year: raw.end_year,
        discount_factor: raw.discount_factor,
        number_years_represented: raw.number_years_represented,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_read_periods() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(PERIODS_FILE_NAME)).unwrap();
            writeln!(
                file,
                "period,start_year,end_year,discount_factor,number_years_represented
2020,2020,2025,1.0,5
2025,2025,2030,0.8,5"
            )
            .unwrap();
        }

        let periods = read_periods(dir.path()).unwrap();
        assert_eq!(periods.iter_ids().collect::<Vec<_>>(), [2020, 2025]);
        assert_eq!(periods.get(2025).unwrap().discount_factor, 0.8);
    }

    #[test]
    fn test_read_periods_from_iter_gap() {
        let raw = |period, start_year, end_year| PeriodRaw {
            period,
            start_year,
            end_year,
            discount_factor: 1.0,
            number_years_represented: 5.0,
        };
        assert!(
            read_periods_from_iter([raw(2020, 2020, 2025), raw(2030, 2030, 2035)].into_iter())
                .is_err()
        );
    }
}
