//! Delimited text and Parquet tables.

use std::{fs::File, path::Path};

use anyhow::{ensure, Context, Result};
use polars::prelude::*;

use crate::common::ensure_parent_dir;

/// Reads a delimited file with a header row into a DataFrame.
pub fn read_csv(path: &Path, separator: char) -> Result<DataFrame> {
    ensure!(separator.is_ascii(), "[io::tables] separator must be a single ASCII character, got {separator:?}");
    let file = File::open(path)
        .with_context(|| format!("[io::tables] failed to open {}", path.display()))?;
    CsvReadOptions::default()
        .with_has_header(true)
        .map_parse_options(|po| po.with_separator(separator as u8))
        .into_reader_with_file_handle(file)
        .finish()
        .with_context(|| format!("[io::tables] failed to read CSV from {}", path.display()))
}

/// Writes a DataFrame as comma-separated CSV with a header row.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;
    let file = File::create(path)
        .with_context(|| format!("[io::tables] failed to create {}", path.display()))?;
    CsvWriter::new(file)
        .include_header(true)
        .finish(df)
        .with_context(|| format!("[io::tables] failed to write CSV to {}", path.display()))
}

/// Writes a DataFrame as Parquet.
#[cfg(feature = "parquet")]
pub fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;
    let file = File::create(path)
        .with_context(|| format!("[io::tables] failed to create {}", path.display()))?;
    ParquetWriter::new(file)
        .finish(df)
        .with_context(|| format!("[io::tables] failed to write Parquet to {}", path.display()))?;
    Ok(())
}

/// Write CSV, or Parquet for a `.parquet` path when that format is compiled in.
pub fn write_table(df: &mut DataFrame, path: &Path) -> Result<()> {
    let is_parquet = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));
    if is_parquet {
        #[cfg(feature = "parquet")]
        return write_parquet(df, path);
        #[cfg(not(feature = "parquet"))]
        anyhow::bail!("[io::tables] {} needs the `parquet` feature", path.display());
    }
    write_csv(df, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_semicolon_tables_and_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("income.csv");
        std::fs::write(&input, "sector_code;avg_net_tax_income\nA01;31000\nA02;28000.5\n").unwrap();

        let mut df = read_csv(&input, ';').unwrap();
        assert_eq!(df.shape(), (2, 2));
        assert_eq!(df.column("avg_net_tax_income").unwrap().dtype(), &DataType::Float64);

        let output = dir.path().join("out/copy.csv");
        write_table(&mut df, &output).unwrap();
        let copy = read_csv(&output, ',').unwrap();
        assert!(copy.equals(&df));
    }

    #[test]
    fn rejects_wide_separators() {
        assert!(read_csv(Path::new("unused.csv"), '§').is_err());
    }
}
