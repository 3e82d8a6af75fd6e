//! Small helpers for moving polars columns in and out of plain vectors.

use anyhow::{Context, Result};
use polars::prelude::*;

/// True for the primitive numeric dtypes the pipeline treats as numeric features.
pub(crate) fn is_numeric(dtype: &DataType) -> bool {
    matches!(dtype,
        DataType::Float32 | DataType::Float64
        | DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        | DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64)
}

/// Names of all columns, in order.
pub(crate) fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|name| name.to_string()).collect()
}

/// True if `df` has a column named `name`.
#[inline]
pub(crate) fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|col| col.as_str() == name)
}

/// Read a column as nullable f64 values (casting if needed).
pub(crate) fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)
        .with_context(|| format!("[common::frame] missing column {name:?}"))?
        .cast(&DataType::Float64)
        .with_context(|| format!("[common::frame] column {name:?} is not numeric"))?;
    Ok(column.f64()?.into_iter().collect())
}

/// Read a column as nullable strings (casting if needed).
pub(crate) fn str_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name)
        .with_context(|| format!("[common::frame] missing column {name:?}"))?
        .cast(&DataType::String)?;
    Ok(column.str()?.into_iter().map(|value| value.map(str::to_string)).collect())
}

/// Add or replace a Float64 column.
pub(crate) fn set_f64(df: &mut DataFrame, name: &str, values: Vec<Option<f64>>) -> Result<()> {
    df.with_column(Column::new(name.into(), values))
        .with_context(|| format!("[common::frame] failed to set column {name:?}"))?;
    Ok(())
}

/// Add or replace a String column.
pub(crate) fn set_str(df: &mut DataFrame, name: &str, values: Vec<Option<String>>) -> Result<()> {
    df.with_column(Column::new(name.into(), values))
        .with_context(|| format!("[common::frame] failed to set column {name:?}"))?;
    Ok(())
}

/// Keep the rows where `mask` is true.
pub(crate) fn filter_rows(df: &DataFrame, mask: &[bool]) -> Result<DataFrame> {
    let mask = BooleanChunked::from_slice("mask".into(), mask);
    df.filter(&mask).context("[common::frame] failed to filter rows")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_through_vectors() {
        let mut df = DataFrame::new(vec![
            Column::new("a".into(), vec![Some(1i64), None, Some(3)]),
            Column::new("b".into(), vec![Some("x"), None, Some("z")]),
        ]).unwrap();

        assert_eq!(f64_values(&df, "a").unwrap(), vec![Some(1.0), None, Some(3.0)]);
        assert_eq!(str_values(&df, "b").unwrap(), vec![Some("x".to_string()), None, Some("z".to_string())]);

        set_f64(&mut df, "a", vec![Some(0.5), Some(1.5), None]).unwrap();
        assert_eq!(df.column("a").unwrap().dtype(), &DataType::Float64);
        assert_eq!(f64_values(&df, "a").unwrap(), vec![Some(0.5), Some(1.5), None]);

        let filtered = filter_rows(&df, &[true, false, true]).unwrap();
        assert_eq!(filtered.height(), 2);
        assert!(has_column(&filtered, "b"));
        assert!(!has_column(&filtered, "c"));
    }

    #[test]
    fn numeric_dtypes() {
        assert!(is_numeric(&DataType::Float64));
        assert!(is_numeric(&DataType::UInt32));
        assert!(!is_numeric(&DataType::String));
        assert!(!is_numeric(&DataType::Boolean));
    }
}
