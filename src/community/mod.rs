//! Energy community selection: threshold filtering, spatial clustering and
//! per-cluster summaries over a fused feature table.

mod kmeans;
mod select;

use ahash::AHashSet;
use anyhow::{bail, Result};
use log::info;
use polars::prelude::*;

use crate::common::{column_names, f64_values, filter_rows, has_column, is_numeric, set_f64};

use kmeans::KMeans;

pub use select::{Comparator, Criteria, Criterion, Threshold};

/// Selects participants from a feature table and groups them into communities.
///
/// The base table is never modified; `select` and `cluster` replace the
/// current selection, which starts out empty (meaning "the whole table").
#[derive(Debug, Clone)]
pub struct CommunitySelector {
    table: DataFrame,
    selection: Option<DataFrame>,
    seed: u64,
    max_iters: usize,
}

impl CommunitySelector {
    pub const DEFAULT_SEED: u64 = 0;
    pub const DEFAULT_MAX_ITERS: usize = 300;

    pub fn new(table: DataFrame) -> Self {
        Self { table, selection: None, seed: Self::DEFAULT_SEED, max_iters: Self::DEFAULT_MAX_ITERS }
    }

    /// Seed for k-means++ initialisation.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    #[inline] pub fn table(&self) -> &DataFrame { &self.table }

    /// Current selection, or the base table if nothing was selected.
    #[inline]
    pub fn selection(&self) -> &DataFrame {
        self.selection.as_ref().unwrap_or(&self.table)
    }

    /// Select the rows of the base table that pass every criterion.
    pub fn select(&mut self, criteria: &Criteria) -> Result<&DataFrame> {
        let mask = select::selection_mask(&self.table, criteria)?;
        let selected = filter_rows(&self.table, &mask)?;
        info!("[community] selected {} of {} rows with {} criteria", selected.height(), self.table.height(), criteria.len());
        Ok(self.selection.insert(selected))
    }

    /// Cluster the current selection into `k` communities by `lat`/`lon`.
    ///
    /// Adds `cluster`, `lat_centroid` and `lon_centroid`; each centroid is the
    /// mean position of its members.
    pub fn cluster(&mut self, k: usize) -> Result<&DataFrame> {
        let mut df = self.selection().clone();
        let n = df.height();
        if k == 0 || k > n {
            bail!("[community] cannot form {k} clusters from {n} selected rows");
        }

        let lat = f64_values(&df, "lat")?;
        let lon = f64_values(&df, "lon")?;
        let points = lat.iter().zip(&lon).enumerate()
            .map(|(row, pair)| match pair {
                (Some(lat), Some(lon)) => Ok([*lat, *lon]),
                _ => bail!("[community] row {row} has no lat/lon"),
            })
            .collect::<Result<Vec<_>>>()?;

        let clustering = KMeans::new(k, self.max_iters, self.seed).fit(&points)?;

        let labels = clustering.labels.iter().map(|&label| label as u32).collect::<Vec<_>>();
        let lat_centroid = clustering.labels.iter().map(|&label| Some(clustering.centroids[label][0])).collect();
        let lon_centroid = clustering.labels.iter().map(|&label| Some(clustering.centroids[label][1])).collect();

        df.with_column(Column::new("cluster".into(), labels))?;
        set_f64(&mut df, "lat_centroid", lat_centroid)?;
        set_f64(&mut df, "lon_centroid", lon_centroid)?;

        info!("[community] clustered {n} rows into {k} communities");
        Ok(self.selection.insert(df))
    }

    /// Per-cluster mean of every numeric column of the base table.
    pub fn summarize(&self) -> Result<DataFrame> {
        let Some(selection) = self.selection.as_ref().filter(|df| has_column(df, "cluster")) else {
            bail!("[community] summarize requires cluster() to be called first");
        };

        let labels = f64_values(selection, "cluster")?.into_iter()
            .map(|label| label.map(|label| label as usize))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| anyhow::anyhow!("[community] null cluster label"))?;
        let k = labels.iter().max().map_or(0, |&max| max + 1);

        let base = column_names(&self.table).into_iter().collect::<AHashSet<_>>();
        let numeric = selection.get_columns().iter()
            .filter(|column| base.contains(column.name().as_str()) && is_numeric(column.dtype()))
            .map(|column| column.name().to_string())
            .collect::<Vec<_>>();

        let mut columns = vec![Column::new("cluster".into(), (0..k as u32).collect::<Vec<_>>())];
        for name in &numeric {
            let mut sums = vec![0.0; k];
            let mut counts = vec![0usize; k];
            for (value, &label) in f64_values(selection, name)?.into_iter().zip(&labels) {
                if let Some(value) = value {
                    sums[label] += value;
                    counts[label] += 1;
                }
            }
            let means = sums.iter().zip(&counts)
                .map(|(&sum, &n)| (n > 0).then(|| sum / n as f64))
                .collect::<Vec<_>>();
            columns.push(Column::new(name.as_str().into(), means));
        }

        Ok(DataFrame::new(columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn table() -> DataFrame {
        DataFrame::new(vec![
            Column::new("address_id".into(), [0u32, 1, 2, 3, 4, 5]),
            Column::new("lat".into(), [51.00, 51.01, 51.02, 51.50, 51.51, 51.52]),
            Column::new("lon".into(), [3.70, 3.71, 3.70, 3.90, 3.91, 3.90]),
            Column::new("population".into(), [100.0, 200.0, 300.0, 10.0, 20.0, 30.0]),
            Column::new("land_use_type".into(), ["residential", "residential", "other_consumers", "residential", "residential", "residential"]),
        ]).unwrap()
    }

    #[test]
    fn select_filters_base_table() {
        let mut selector = CommunitySelector::new(table());
        let criteria = Criteria::from([("population".to_string(), Criterion::new(">=", 20.0).unwrap())]);
        assert_eq!(selector.select(&criteria).unwrap().height(), 5);

        // A second selection starts again from the base table.
        let criteria = Criteria::from([("land_use_type".to_string(), Criterion::new("==", "residential").unwrap())]);
        assert_eq!(selector.select(&criteria).unwrap().height(), 5);
        assert_eq!(selector.table().height(), 6);
    }

    #[test]
    fn cluster_assigns_member_mean_centroids() {
        let mut selector = CommunitySelector::new(table()).with_seed(3);
        let clustered = selector.cluster(2).unwrap().clone();

        let labels = f64_values(&clustered, "cluster").unwrap();
        assert_eq!(labels.iter().map(|label| label.unwrap() as u32).collect::<AHashSet<_>>().len(), 2);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[3], labels[5]);
        assert_ne!(labels[0], labels[3]);

        let lat_centroid = f64_values(&clustered, "lat_centroid").unwrap();
        assert_relative_eq!(lat_centroid[0].unwrap(), 51.01, epsilon = 1e-9);
        assert_relative_eq!(lat_centroid[4].unwrap(), 51.51, epsilon = 1e-9);
    }

    #[test]
    fn cluster_rejects_bad_k() {
        let mut selector = CommunitySelector::new(table());
        assert!(selector.cluster(0).is_err());
        assert!(selector.cluster(7).is_err());
    }

    #[test]
    fn summarize_requires_cluster() {
        let selector = CommunitySelector::new(table());
        assert!(selector.summarize().is_err());
    }

    #[test]
    fn summarize_means_numeric_columns() {
        let mut selector = CommunitySelector::new(table()).with_seed(11);
        let criteria = Criteria::from([("land_use_type".to_string(), Criterion::new("==", "residential").unwrap())]);
        selector.select(&criteria).unwrap();
        let clustered = selector.cluster(2).unwrap().clone();
        let summary = selector.summarize().unwrap();

        assert_eq!(summary.height(), 2);
        let names = column_names(&summary);
        assert!(names.contains(&"population".to_string()));
        assert!(!names.contains(&"land_use_type".to_string()));
        assert!(!names.contains(&"lat_centroid".to_string()));

        // The cluster of the northern addresses averages 10, 20, 30.
        let north = f64_values(&clustered, "cluster").unwrap()[2].unwrap() as usize;
        assert_relative_eq!(f64_values(&summary, "population").unwrap()[north].unwrap(), 20.0);
    }
}
