use std::{cmp::Ordering, collections::BTreeMap, fmt, str::FromStr};

use anyhow::{anyhow, bail, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::common::{f64_values, has_column, is_numeric, str_values};

/// Comparison applied between a column value and a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Comparator {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
        }
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Eq => ordering == Ordering::Equal,
        }
    }
}

impl FromStr for Comparator {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim() {
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "<" => Self::Lt,
            "<=" => Self::Le,
            "=" | "==" => Self::Eq,
            other => bail!("[community::select] unsupported comparator {other:?}"),
        })
    }
}

impl TryFrom<String> for Comparator {
    type Error = anyhow::Error;
    fn try_from(s: String) -> Result<Self> { s.parse() }
}

impl From<Comparator> for String {
    fn from(comparator: Comparator) -> Self { comparator.as_str().to_string() }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Threshold {
    Number(f64),
    Text(String),
}

impl From<f64> for Threshold {
    fn from(value: f64) -> Self { Self::Number(value) }
}

impl From<&str> for Threshold {
    fn from(value: &str) -> Self { Self::Text(value.to_string()) }
}

/// `column <comparator> threshold`; serialised as `[">=", 10]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(Comparator, Threshold)", into = "(Comparator, Threshold)")]
pub struct Criterion {
    pub comparator: Comparator,
    pub threshold: Threshold,
}

impl Criterion {
    pub fn new(comparator: &str, threshold: impl Into<Threshold>) -> Result<Self> {
        Ok(Self { comparator: comparator.parse()?, threshold: threshold.into() })
    }

    /// Per-row pass/fail for `column` of `df`. Null values never pass.
    pub(crate) fn mask(&self, df: &DataFrame, column: &str) -> Result<Vec<bool>> {
        if !has_column(df, column) { bail!("[community::select] unknown column {column:?}") }
        let dtype = df.column(column)?.dtype().clone();

        match &self.threshold {
            Threshold::Number(threshold) => {
                if !is_numeric(&dtype) {
                    bail!("[community::select] column {column:?} is {dtype}, cannot compare with a number");
                }
                Ok(f64_values(df, column)?.into_iter()
                    .map(|value| value
                        .and_then(|value| value.partial_cmp(threshold))
                        .is_some_and(|ordering| self.comparator.accepts(ordering)))
                    .collect())
            }
            Threshold::Text(threshold) => {
                if dtype != DataType::String {
                    bail!("[community::select] column {column:?} is {dtype}, cannot compare with text");
                }
                Ok(str_values(df, column)?.into_iter()
                    .map(|value| value.is_some_and(|value| self.comparator.accepts(value.as_str().cmp(threshold))))
                    .collect())
            }
        }
    }
}

impl From<(Comparator, Threshold)> for Criterion {
    fn from((comparator, threshold): (Comparator, Threshold)) -> Self {
        Self { comparator, threshold }
    }
}

impl From<Criterion> for (Comparator, Threshold) {
    fn from(criterion: Criterion) -> Self { (criterion.comparator, criterion.threshold) }
}

/// Feature name → criterion; a row is selected when it passes all of them.
pub type Criteria = BTreeMap<String, Criterion>;

/// Rows of `df` passing every criterion.
pub(crate) fn selection_mask(df: &DataFrame, criteria: &Criteria) -> Result<Vec<bool>> {
    let mut mask = vec![true; df.height()];
    for (column, criterion) in criteria {
        let pass = criterion.mask(df, column)
            .map_err(|e| anyhow!("{e} (criterion on {column:?})"))?;
        for (keep, pass) in mask.iter_mut().zip(pass) {
            *keep &= pass;
        }
    }
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> DataFrame {
        DataFrame::new(vec![
            Column::new("population".into(), [Some(100.0), Some(250.0), None, Some(400.0)]),
            Column::new("land_use_type".into(), [Some("residential"), Some("other_consumers"), Some("residential"), None]),
        ]).unwrap()
    }

    #[test]
    fn parses_comparators() {
        for (text, comparator) in [(">", Comparator::Gt), (">=", Comparator::Ge), ("<", Comparator::Lt),
            ("<=", Comparator::Le), ("=", Comparator::Eq), ("==", Comparator::Eq)]
        {
            assert_eq!(text.parse::<Comparator>().unwrap(), comparator);
        }
        assert!("!=".parse::<Comparator>().is_err());
        assert!(Criterion::new("~", 1.0).is_err());
    }

    #[test]
    fn nulls_never_pass() {
        let df = table();
        let mask = Criterion::new(">=", 0.0).unwrap().mask(&df, "population").unwrap();
        assert_eq!(mask, vec![true, true, false, true]);

        let mask = Criterion::new("==", "residential").unwrap().mask(&df, "land_use_type").unwrap();
        assert_eq!(mask, vec![true, false, true, false]);
    }

    #[test]
    fn combines_criteria() {
        let df = table();
        let criteria = Criteria::from([
            ("population".to_string(), Criterion::new(">", 150.0).unwrap()),
            ("land_use_type".to_string(), Criterion::new("=", "other_consumers").unwrap()),
        ]);
        assert_eq!(selection_mask(&df, &criteria).unwrap(), vec![false, true, false, false]);
    }

    #[test]
    fn rejects_unknown_columns_and_type_mismatches() {
        let df = table();
        assert!(Criterion::new(">", 1.0).unwrap().mask(&df, "income").is_err());
        assert!(Criterion::new(">", 1.0).unwrap().mask(&df, "land_use_type").is_err());
        assert!(Criterion::new("==", "x").unwrap().mask(&df, "population").is_err());
    }

    #[test]
    fn deserializes_from_json_pairs() {
        let criteria: Criteria = serde_json::from_str(r#"{"population": [">=", 200], "land_use_type": ["==", "residential"]}"#).unwrap();
        assert_eq!(criteria["population"], Criterion::new(">=", 200.0).unwrap());
        assert_eq!(criteria["land_use_type"].threshold, Threshold::Text("residential".to_string()));
        assert!(serde_json::from_str::<Criteria>(r#"{"population": ["!=", 1]}"#).is_err());
    }
}
