use ahash::{AHashMap, AHashSet};
use anyhow::{ensure, Result};
use log::{debug, info, warn};
use polars::prelude::*;

use crate::common::{f64_values, filter_rows, has_column, is_numeric, set_f64, set_str, str_values};

use super::manifest::{LOCATION_COLUMNS, SOLAR_COLUMNS};

/// Columns that identify or locate a row; these are never filled.
pub const IDENTIFIER_COLUMNS: [&str; 7] = [
    "address_id", "solar_id", "lat", "lon", "lat_solar", "lon_solar", "solar_to_address_distance",
];

/// Grouping keys for mean imputation, narrowest first. Global mean comes last.
pub const GROUP_LEVELS: [&str; 3] = ["streetname", "sector_code", "postcode"];

/// Counts of what the cascade changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImputeReport {
    /// Rows dropped for missing population.
    pub dropped_rows: usize,
    /// Solar string cells set to "not_available".
    pub not_available: usize,
    /// Other string cells set to "unknown".
    pub unknown: usize,
    /// Solar numeric cells set to 0.
    pub zeroed: usize,
    /// Numeric cells filled at each level (`streetname`, `sector_code`, `postcode`, `global`).
    pub by_level: Vec<(String, usize)>,
}

/// Ordered fallback imputation of the fused feature table.
///
/// 1. solar string columns become "not_available"
/// 2. rows without `population` are dropped
/// 3. remaining string columns become "unknown", grouping keys included, so
///    rows without a street pool into the "unknown" street
/// 4. solar numeric columns become 0
/// 5. other numeric columns take the mean of their street, then sector, then
///    postcode, then the whole table. Location columns are never averaged,
///    even when they were read as numbers.
#[derive(Debug, Clone)]
pub struct MissingValueCascade {
    solar_columns: AHashSet<String>,
}

impl Default for MissingValueCascade {
    fn default() -> Self {
        Self::new(SOLAR_COLUMNS)
    }
}

impl MissingValueCascade {
    pub fn new<S: Into<String>>(solar_columns: impl IntoIterator<Item = S>) -> Self {
        Self { solar_columns: solar_columns.into_iter().map(Into::into).collect() }
    }

    fn is_solar(&self, name: &str) -> bool {
        self.solar_columns.contains(name)
    }

    pub fn run(&self, df: DataFrame) -> Result<(DataFrame, ImputeReport)> {
        let mut report = ImputeReport::default();
        let mut df = df;

        let columns = df.get_columns().iter()
            .map(|column| (column.name().to_string(), column.dtype().clone()))
            .filter(|(name, _)| !IDENTIFIER_COLUMNS.contains(&name.as_str()))
            .collect::<Vec<_>>();

        for (name, _) in columns.iter().filter(|(name, dtype)| dtype == &DataType::String && self.is_solar(name)) {
            report.not_available += fill_str(&mut df, name, "not_available")?;
        }

        ensure!(has_column(&df, "population"), "[fusion::impute] missing column \"population\"");
        let keep = f64_values(&df, "population")?.iter().map(Option::is_some).collect::<Vec<_>>();
        report.dropped_rows = keep.iter().filter(|&&keep| !keep).count();
        if report.dropped_rows > 0 {
            df = filter_rows(&df, &keep)?;
            warn!("[fusion::impute] dropped {} rows without population", report.dropped_rows);
        }

        for (name, _) in columns.iter().filter(|(name, dtype)| dtype == &DataType::String && !self.is_solar(name)) {
            report.unknown += fill_str(&mut df, name, "unknown")?;
        }

        for (name, _) in columns.iter().filter(|(name, dtype)| is_numeric(dtype) && self.is_solar(name)) {
            let values = f64_values(&df, name)?;
            report.zeroed += values.iter().filter(|value| value.is_none()).count();
            set_f64(&mut df, name, values.into_iter().map(|value| Some(value.unwrap_or(0.0))).collect())?;
        }

        let numeric = columns.iter()
            .filter(|(name, dtype)| is_numeric(dtype) && !self.is_solar(name)
                && !LOCATION_COLUMNS.contains(&name.as_str()))
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>();
        report.by_level = self.fill_numeric(&mut df, &numeric)?;

        info!(
            "[fusion::impute] {} not_available, {} unknown, {} zeroed; means by level: {:?}",
            report.not_available, report.unknown, report.zeroed, report.by_level,
        );

        Ok((df, report))
    }

    fn fill_numeric(&self, df: &mut DataFrame, columns: &[&str]) -> Result<Vec<(String, usize)>> {
        let mut levels = Vec::new();
        for level in GROUP_LEVELS {
            if has_column(df, level) {
                levels.push((level, str_values(df, level)?));
            } else {
                debug!("[fusion::impute] no {level:?} column, skipping that level");
            }
        }
        // One shared key puts every row in the same group.
        levels.push(("global", vec![Some(String::new()); df.height()]));

        let mut counts = levels.iter().map(|(level, _)| (level.to_string(), 0)).collect::<Vec<_>>();

        for &name in columns {
            let mut values = f64_values(df, name)?;
            if values.iter().all(Option::is_some) { continue }

            for ((_, keys), (_, count)) in levels.iter().zip(counts.iter_mut()) {
                *count += fill_by_group(&mut values, keys);
            }

            set_f64(df, name, values)?;
        }

        Ok(counts)
    }
}

/// Replace nulls in a string column; returns how many cells changed.
fn fill_str(df: &mut DataFrame, name: &str, fill: &str) -> Result<usize> {
    let values = str_values(df, name)?;
    let filled = values.iter().filter(|value| value.is_none()).count();
    if filled > 0 {
        set_str(df, name, values.into_iter().map(|value| value.or_else(|| Some(fill.to_string()))).collect())?;
    }
    Ok(filled)
}

/// Fill nulls with the mean of the non-null values sharing their key.
/// Rows with a null key are left alone. Returns how many cells were filled.
fn fill_by_group(values: &mut [Option<f64>], keys: &[Option<String>]) -> usize {
    let mut sums: AHashMap<&str, (f64, usize)> = AHashMap::new();
    for (value, key) in values.iter().zip(keys) {
        if let (Some(value), Some(key)) = (value, key) {
            let entry = sums.entry(key.as_str()).or_default();
            entry.0 += value;
            entry.1 += 1;
        }
    }

    let mut filled = 0;
    for (value, key) in values.iter_mut().zip(keys) {
        if value.is_some() { continue }
        if let Some(&(sum, n)) = key.as_deref().and_then(|key| sums.get(key)) {
            *value = Some(sum / n as f64);
            filled += 1;
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(report: &ImputeReport, name: &str) -> usize {
        report.by_level.iter().find(|(level, _)| level == name).map(|(_, n)| *n).unwrap()
    }

    #[test]
    fn sector_mean_beats_postcode_and_global() {
        // Row 0 is alone on its street; its sector has 10, its postcode averages 55.
        let df = DataFrame::new(vec![
            Column::new("address_id".into(), [0u32, 1, 2]),
            Column::new("streetname".into(), ["X", "Y", "Z"]),
            Column::new("sector_code".into(), ["S1", "S1", "S2"]),
            Column::new("postcode".into(), ["9000", "9000", "9000"]),
            Column::new("population".into(), [100.0, 100.0, 100.0]),
            Column::new("income".into(), [None, Some(10.0), Some(100.0)]),
        ]).unwrap();

        let (df, report) = MissingValueCascade::default().run(df).unwrap();
        assert_eq!(f64_values(&df, "income").unwrap(), vec![Some(10.0), Some(10.0), Some(100.0)]);
        assert_eq!(level(&report, "streetname"), 0);
        assert_eq!(level(&report, "sector_code"), 1);
        assert_eq!(level(&report, "global"), 0);
    }

    #[test]
    fn street_mean_comes_first() {
        let df = DataFrame::new(vec![
            Column::new("streetname".into(), ["X", "X", "Y"]),
            Column::new("sector_code".into(), ["S1", "S1", "S1"]),
            Column::new("population".into(), [1.0, 1.0, 1.0]),
            Column::new("income".into(), [None, Some(4.0), Some(40.0)]),
        ]).unwrap();

        let (df, _) = MissingValueCascade::default().run(df).unwrap();
        assert_eq!(f64_values(&df, "income").unwrap()[0], Some(4.0));
    }

    #[test]
    fn leaves_no_nulls_when_any_value_exists() {
        let df = DataFrame::new(vec![
            Column::new("address_id".into(), [0u32, 1, 2, 3]),
            Column::new("streetname".into(), [Some("X"), None, Some("Y"), None]),
            Column::new("sector_code".into(), [None, Some("S1"), None, None]),
            Column::new("population".into(), [1.0, 2.0, 3.0, 4.0]),
            Column::new("income".into(), [None, None, Some(30.0), None]),
            Column::new("deprivation".into(), [Some(1i64), None, None, Some(3)]),
        ]).unwrap();

        let (df, report) = MissingValueCascade::default().run(df).unwrap();
        for name in ["income", "deprivation"] {
            assert_eq!(df.column(name).unwrap().null_count(), 0, "{name} still has nulls");
        }
        assert_eq!(f64_values(&df, "income").unwrap(), vec![Some(30.0); 4]);
        // Rows 1 and 3 share the "unknown" street.
        assert_eq!(f64_values(&df, "deprivation").unwrap()[1], Some(3.0));
        assert_eq!(f64_values(&df, "deprivation").unwrap()[2], Some(2.0));
        assert_eq!(level(&report, "global"), 1);
    }

    #[test]
    fn drops_rows_without_population() {
        let df = DataFrame::new(vec![
            Column::new("address_id".into(), [0u32, 1, 2]),
            Column::new("population".into(), [Some(5.0), None, Some(7.0)]),
        ]).unwrap();

        let (df, report) = MissingValueCascade::default().run(df).unwrap();
        assert_eq!(report.dropped_rows, 1);
        assert_eq!(f64_values(&df, "address_id").unwrap(), vec![Some(0.0), Some(2.0)]);
    }

    #[test]
    fn missing_population_column_is_an_error() {
        let df = DataFrame::new(vec![Column::new("address_id".into(), [0u32])]).unwrap();
        assert!(MissingValueCascade::default().run(df).is_err());
    }

    #[test]
    fn solar_and_string_fills() {
        let df = DataFrame::new(vec![
            Column::new("address_id".into(), [0u32, 1]),
            Column::new("solar_id".into(), [Some(4u32), None]),
            Column::new("solar_to_address_distance".into(), [Some(12.5), None]),
            Column::new("building_type".into(), [Some("house"), None]),
            Column::new("energy_production".into(), [Some(9.0), None]),
            Column::new("streetname".into(), [Some("X"), None]),
            Column::new("land_use_type".into(), [Some("residential"), None]),
            Column::new("population".into(), [1.0, 1.0]),
        ]).unwrap();

        let (df, report) = MissingValueCascade::default().run(df).unwrap();
        assert_eq!(str_values(&df, "building_type").unwrap()[1].as_deref(), Some("not_available"));
        assert_eq!(str_values(&df, "land_use_type").unwrap()[1].as_deref(), Some("unknown"));
        assert_eq!(f64_values(&df, "energy_production").unwrap()[1], Some(0.0));
        assert_eq!(str_values(&df, "streetname").unwrap()[1].as_deref(), Some("unknown"));
        // Identifiers stay null.
        assert_eq!(df.column("solar_id").unwrap().null_count(), 1);
        assert_eq!(df.column("solar_to_address_distance").unwrap().null_count(), 1);
        assert_eq!((report.not_available, report.unknown, report.zeroed), (1, 2, 1));
    }

    #[test]
    fn rows_without_street_share_the_unknown_street_mean() {
        let df = DataFrame::new(vec![
            Column::new("streetname".into(), [None, None, Some("A"), Some("A")]),
            Column::new("sector_code".into(), ["S", "S", "S", "S"]),
            Column::new("population".into(), [1.0, 1.0, 1.0, 1.0]),
            Column::new("income".into(), [None, Some(10.0), Some(100.0), Some(100.0)]),
        ]).unwrap();

        let (df, report) = MissingValueCascade::default().run(df).unwrap();
        assert_eq!(str_values(&df, "streetname").unwrap()[0].as_deref(), Some("unknown"));
        assert_eq!(f64_values(&df, "income").unwrap(), vec![Some(10.0), Some(10.0), Some(100.0), Some(100.0)]);
        assert_eq!(level(&report, "streetname"), 1);
        assert_eq!(level(&report, "sector_code"), 0);
    }

    #[test]
    fn numeric_location_columns_are_not_averaged() {
        let df = DataFrame::new(vec![
            Column::new("sector_code".into(), ["S", "S", "S"]),
            Column::new("postcode".into(), [Some(9000i64), Some(9050), None]),
            Column::new("housenumber".into(), [Some(12i64), None, Some(3)]),
            Column::new("population".into(), [1.0, 1.0, 1.0]),
        ]).unwrap();

        let (df, report) = MissingValueCascade::default().run(df).unwrap();
        let postcode = df.column("postcode").unwrap();
        assert_eq!(postcode.dtype(), &DataType::Int64);
        assert_eq!(postcode.null_count(), 1);
        assert_eq!(df.column("housenumber").unwrap().null_count(), 1);
        assert!(report.by_level.iter().all(|(_, n)| *n == 0));
    }
}
