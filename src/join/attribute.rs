use ahash::AHashSet;
use anyhow::{ensure, Context, Result};
use log::debug;
use polars::prelude::*;

use crate::common::{column_names, has_column};

const ROW_INDEX: &str = "__row";

/// Join semantics for key-based joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Keep every left row; unmatched right columns are null.
    Left,
    /// Keep only left rows with a matching right key.
    Inner,
}

/// Join `right` onto `left` where `left[left_on] == right[right_on]`.
///
/// - Keys are compared as strings, so `"9000"` and `9000` match.
/// - The left key keeps its original dtype; the right key column is dropped.
/// - Left row order is preserved.
/// - Right keys must be unique, so a left join never duplicates rows.
/// - Right columns whose name already exists on the left are dropped (left wins).
pub fn join_on(left: &DataFrame, right: &DataFrame, left_on: &str, right_on: &str, kind: JoinKind) -> Result<DataFrame> {
    ensure!(has_column(left, left_on), "[join::attribute] left table has no key column {left_on:?}");
    ensure!(has_column(right, right_on), "[join::attribute] right table has no key column {right_on:?}");

    let left_dtype = left.column(left_on)?.dtype().clone();

    let mut left = left.clone();
    let key = left.column(left_on)?.cast(&DataType::String)?;
    left.with_column(key)?;

    let mut right = right.clone();
    let key = right.column(right_on)?.cast(&DataType::String)?;
    right.with_column(key)?;

    // Reject duplicated right keys, which would fan out left rows.
    {
        let mut seen = AHashSet::new();
        for key in right.column(right_on)?.str()?.into_iter().flatten() {
            ensure!(seen.insert(key), "[join::attribute] duplicate key {key:?} in right column {right_on:?}");
        }
    }

    // Drop overlapping non-key columns from the right side.
    for name in column_names(&right) {
        if name != right_on && has_column(&left, &name) {
            debug!("[join::attribute] dropping right column {name:?} (already present on the left)");
            right = right.drop(&name)?;
        }
    }

    let left = left.with_row_index(ROW_INDEX.into(), None)?;
    let joined = match kind {
        JoinKind::Left => left.left_join(&right, [left_on], [right_on]),
        JoinKind::Inner => left.inner_join(&right, [left_on], [right_on]),
    }.with_context(|| format!("[join::attribute] failed to join on {left_on:?} = {right_on:?}"))?;

    let mut joined = joined
        .sort([ROW_INDEX], SortMultipleOptions::default())?
        .drop(ROW_INDEX)?;
    let key = joined.column(left_on)?.cast(&left_dtype)?;
    joined.with_column(key)?;

    Ok(joined)
}
