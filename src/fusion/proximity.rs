use std::cmp::Ordering;

use anyhow::{ensure, Result};
use log::info;

use crate::geom::{Buffer, PointSet};

/// Sums a site metric over the top-ranked sites within a radius of each address.
#[derive(Debug, Clone, Copy)]
pub struct ProximityAggregator {
    buffer: f64,
    top_percentile: f64,
}

impl ProximityAggregator {
    pub fn new(buffer: f64, top_percentile: f64) -> Result<Self> {
        ensure!(buffer.is_finite() && buffer > 0.0,
            "[fusion::proximity] buffer must be positive, got {buffer}");
        ensure!(top_percentile > 0.0 && top_percentile <= 1.0,
            "[fusion::proximity] top_percentile must be in (0, 1], got {top_percentile}");
        Ok(Self { buffer, top_percentile })
    }

    #[inline] pub fn buffer(&self) -> f64 { self.buffer }

    #[inline] pub fn top_percentile(&self) -> f64 { self.top_percentile }

    /// Ids of the top `floor(n * top_percentile)` sites by metric, descending.
    /// The sort is stable and null metrics rank last.
    pub fn top_sites(&self, metric: &[Option<f64>]) -> Vec<usize> {
        let mut order = (0..metric.len()).collect::<Vec<_>>();
        order.sort_by(|&a, &b| match (metric[a], metric[b]) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        order.truncate((metric.len() as f64 * self.top_percentile).floor() as usize);
        order
    }

    /// Per address, the sum of `metric` over top sites within the buffer, or
    /// None when no top site is in range. `metric` is indexed by site id.
    pub fn aggregate(&self, addresses: &PointSet, sites: &PointSet, metric: &[Option<f64>]) -> Result<Vec<Option<f64>>> {
        addresses.ensure_metric_with(sites, "proximity aggregation")?;
        ensure!(sites.ids().iter().all(|&id| id < metric.len()),
            "[fusion::proximity] site ids exceed the {} metric values", metric.len());

        let mut is_top = vec![false; metric.len()];
        for id in self.top_sites(metric) {
            is_top[id] = true;
        }
        let top = sites.retain(|id| is_top[id]);

        let sums = addresses.points().iter()
            .map(|&point| {
                let buffer = Buffer::new(point, self.buffer)?;
                Ok(top.within(&buffer)
                    .filter_map(|id| metric[id])
                    .fold(None, |acc: Option<f64>, value| Some(acc.unwrap_or(0.0) + value)))
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            "[fusion::proximity] {} of {} addresses have a top-{:.0}% site within {} m ({} sites ranked)",
            sums.iter().filter(|s| s.is_some()).count(), addresses.len(),
            self.top_percentile * 100.0, self.buffer, top.len(),
        );

        Ok(sums)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Crs;
    use geo::Point;

    fn metric_set(points: &[(f64, f64)]) -> PointSet {
        PointSet::new(
            points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
            Crs::Utm { zone: 31, south: false },
        )
    }

    #[test]
    fn top_sites_are_stable_and_floor_sized() {
        let aggregator = ProximityAggregator::new(100.0, 0.5).unwrap();
        let metric = [Some(5.0), None, Some(9.0), Some(5.0), Some(1.0)];
        // floor(5 * 0.5) = 2; ties keep original order.
        assert_eq!(aggregator.top_sites(&metric), vec![2, 0]);

        let all = ProximityAggregator::new(100.0, 1.0).unwrap();
        assert_eq!(all.top_sites(&metric), vec![2, 0, 3, 4, 1]);
    }

    #[test]
    fn sums_top_sites_in_range() {
        let aggregator = ProximityAggregator::new(10.0, 0.5).unwrap();
        let addresses = metric_set(&[(0.0, 0.0), (1000.0, 0.0)]);
        let sites = metric_set(&[(3.0, 0.0), (0.0, 10.0), (5.0, 5.0), (1000.0, 5.0)]);
        let production = [Some(10.0), Some(20.0), Some(1.0), Some(2.0)];

        // Top 2 sites are 1 (20) and 0 (10); both in range of address 0.
        let sums = aggregator.aggregate(&addresses, &sites, &production).unwrap();
        assert_eq!(sums, vec![Some(30.0), None]);
    }

    #[test]
    fn no_site_in_range_is_null_not_zero() {
        let aggregator = ProximityAggregator::new(5.0, 1.0).unwrap();
        let addresses = metric_set(&[(0.0, 0.0)]);
        let sites = metric_set(&[(100.0, 0.0)]);
        assert_eq!(aggregator.aggregate(&addresses, &sites, &[Some(0.0)]).unwrap(), vec![None]);
    }

    #[test]
    fn zero_production_in_range_is_zero() {
        let aggregator = ProximityAggregator::new(5.0, 1.0).unwrap();
        let addresses = metric_set(&[(0.0, 0.0)]);
        let sites = metric_set(&[(1.0, 0.0)]);
        assert_eq!(aggregator.aggregate(&addresses, &sites, &[Some(0.0)]).unwrap(), vec![Some(0.0)]);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(ProximityAggregator::new(0.0, 0.1).is_err());
        assert!(ProximityAggregator::new(500.0, 0.0).is_err());
        assert!(ProximityAggregator::new(500.0, 1.01).is_err());
    }
}
