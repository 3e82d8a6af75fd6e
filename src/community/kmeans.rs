use ahash::AHashSet;
use anyhow::{ensure, Result};
use log::debug;
use rand::{distr::{weighted::WeightedIndex, Distribution}, rngs::StdRng, Rng, SeedableRng};

/// Lloyd's k-means with k-means++ seeding on 2-D points.
#[derive(Debug, Clone, Copy)]
pub(crate) struct KMeans {
    k: usize,
    max_iters: usize,
    seed: u64,
}

/// Labels per point and one centroid per label; every label in `0..k` has members.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Clustering {
    pub labels: Vec<usize>,
    pub centroids: Vec<[f64; 2]>,
}

#[inline]
fn dist2(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)
}

/// Index of the nearest center; ties go to the lowest index.
fn nearest(point: &[f64; 2], centers: &[[f64; 2]]) -> usize {
    let mut best = (0, f64::INFINITY);
    for (j, center) in centers.iter().enumerate() {
        let d = dist2(point, center);
        if d < best.1 { best = (j, d) }
    }
    best.0
}

impl KMeans {
    pub(crate) fn new(k: usize, max_iters: usize, seed: u64) -> Self {
        Self { k, max_iters, seed }
    }

    pub(crate) fn fit(&self, points: &[[f64; 2]]) -> Result<Clustering> {
        let k = self.k;
        ensure!(k > 0, "[community::kmeans] number of clusters must be positive");
        ensure!(k <= points.len(), "[community::kmeans] cannot form {k} clusters from {} points", points.len());
        ensure!(points.iter().all(|p| p[0].is_finite() && p[1].is_finite()),
            "[community::kmeans] points must have finite coordinates");

        let distinct = points.iter().map(|p| (p[0].to_bits(), p[1].to_bits())).collect::<AHashSet<_>>().len();
        ensure!(k <= distinct, "[community::kmeans] cannot form {k} clusters from {distinct} distinct points");

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centers = self.seed_centers(points, &mut rng)?;
        let mut labels = vec![usize::MAX; points.len()];

        for iter in 0..self.max_iters.max(1) {
            let mut changed = false;
            for (label, point) in labels.iter_mut().zip(points) {
                let best = nearest(point, &centers);
                if *label != best {
                    *label = best;
                    changed = true;
                }
            }

            reseed_empty(points, &mut labels, &centers, k);
            centers = member_means(points, &labels, k);

            if !changed {
                debug!("[community::kmeans] converged after {} iterations", iter + 1);
                break;
            }
        }

        Ok(Clustering { labels, centroids: centers })
    }

    /// k-means++: the first center is uniform, each next one is drawn with
    /// probability proportional to its squared distance from the chosen centers.
    fn seed_centers(&self, points: &[[f64; 2]], rng: &mut impl Rng) -> Result<Vec<[f64; 2]>> {
        let mut centers = Vec::with_capacity(self.k);
        centers.push(points[rng.random_range(0..points.len())]);

        while centers.len() < self.k {
            let weights = points.iter()
                .map(|p| centers.iter().map(|c| dist2(p, c)).fold(f64::INFINITY, f64::min))
                .collect::<Vec<_>>();
            let index = WeightedIndex::new(&weights)?;
            centers.push(points[index.sample(rng)]);
        }

        Ok(centers)
    }
}

/// Give every empty cluster the point farthest from its current center, taken
/// from a cluster that has more than one member.
fn reseed_empty(points: &[[f64; 2]], labels: &mut [usize], centers: &[[f64; 2]], k: usize) {
    let mut sizes = vec![0usize; k];
    for &label in labels.iter() { sizes[label] += 1 }

    for empty in 0..k {
        if sizes[empty] > 0 { continue }

        let farthest = labels.iter().zip(points).enumerate()
            .filter(|(_, (label, _))| sizes[**label] > 1)
            .map(|(i, (&label, point))| (i, dist2(point, &centers[label])))
            .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                Some((_, bd)) if bd >= d => best,
                _ => Some((i, d)),
            });

        if let Some((i, _)) = farthest {
            debug!("[community::kmeans] reseeding empty cluster {empty} with point {i}");
            sizes[labels[i]] -= 1;
            labels[i] = empty;
            sizes[empty] = 1;
        }
    }
}

/// Mean position of each cluster's members.
fn member_means(points: &[[f64; 2]], labels: &[usize], k: usize) -> Vec<[f64; 2]> {
    let mut sums = vec![[0.0, 0.0]; k];
    let mut counts = vec![0usize; k];
    for (point, &label) in points.iter().zip(labels) {
        sums[label][0] += point[0];
        sums[label][1] += point[1];
        counts[label] += 1;
    }
    sums.iter().zip(&counts)
        .map(|(sum, &n)| [sum[0] / n as f64, sum[1] / n as f64])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn blobs() -> Vec<[f64; 2]> {
        vec![
            [0.0, 0.0], [0.1, 0.0], [0.0, 0.1],
            [10.0, 10.0], [10.1, 10.0], [10.0, 10.1],
            [-10.0, 5.0], [-10.1, 5.0],
        ]
    }

    #[test]
    fn separates_obvious_blobs() {
        let points = blobs();
        let clustering = KMeans::new(3, 100, 7).fit(&points).unwrap();

        let labels = &clustering.labels;
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[6], labels[7]);
        assert_eq!(labels.iter().collect::<AHashSet<_>>().len(), 3);
    }

    #[test]
    fn centroids_are_member_means() {
        let points = blobs();
        for k in 1..=points.len() {
            let clustering = KMeans::new(k, 100, 42).fit(&points).unwrap();
            assert_eq!(clustering.labels.iter().collect::<AHashSet<_>>().len(), k);

            for (label, centroid) in clustering.centroids.iter().enumerate() {
                let members = points.iter().zip(&clustering.labels)
                    .filter(|(_, l)| **l == label)
                    .map(|(p, _)| *p)
                    .collect::<Vec<_>>();
                let n = members.len() as f64;
                assert_relative_eq!(centroid[0], members.iter().map(|p| p[0]).sum::<f64>() / n, epsilon = 1e-12);
                assert_relative_eq!(centroid[1], members.iter().map(|p| p[1]).sum::<f64>() / n, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn same_seed_same_result() {
        let points = blobs();
        assert_eq!(KMeans::new(3, 100, 1).fit(&points).unwrap(), KMeans::new(3, 100, 1).fit(&points).unwrap());
    }

    #[test]
    fn rejects_bad_k() {
        let points = blobs();
        assert!(KMeans::new(0, 10, 0).fit(&points).is_err());
        assert!(KMeans::new(9, 10, 0).fit(&points).is_err());
        assert!(KMeans::new(2, 10, 0).fit(&[[1.0, 1.0], [1.0, 1.0]]).is_err());
    }

    #[test]
    fn reseeds_empty_cluster_with_farthest_point() {
        let points = [[0.0, 0.0], [1.0, 0.0], [5.0, 0.0]];
        let mut labels = vec![0, 0, 0];
        reseed_empty(&points, &mut labels, &[[0.0, 0.0], [100.0, 0.0]], 2);
        assert_eq!(labels, vec![0, 0, 1]);
    }
}
