use ahash::{AHashMap, AHashSet};
use anyhow::Result;
use log::{debug, info};

use crate::geom::PointSet;

/// One matched (address, solar site) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPair {
    /// Address id (row position in the address table).
    pub address: usize,
    /// Solar id (row position in the solar table).
    pub site: usize,
    /// Euclidean distance in the metric CRS.
    pub distance: f64,
    /// Zero-based round in which the pair was accepted.
    pub round: usize,
}

/// Result of constrained nearest matching: one-to-one on both sides.
#[derive(Debug, Clone, Default)]
pub struct Matching {
    pairs: Vec<MatchPair>,
    by_address: AHashMap<usize, usize>,
}

impl Matching {
    fn push(&mut self, pair: MatchPair) {
        self.by_address.insert(pair.address, self.pairs.len());
        self.pairs.push(pair);
    }

    /// Pairs in acceptance order (round, then distance).
    #[inline] pub fn pairs(&self) -> &[MatchPair] { &self.pairs }

    #[inline] pub fn len(&self) -> usize { self.pairs.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.pairs.is_empty() }

    /// The pair for a given address, if it matched.
    pub fn for_address(&self, address: usize) -> Option<&MatchPair> {
        self.by_address.get(&address).map(|&i| &self.pairs[i])
    }
}

/// Greedy round-based nearest matching of addresses to solar sites.
///
/// Each round every open address proposes its nearest open site within
/// `max_distance`; proposals are ranked by distance and each site accepts
/// only its closest proposer. Losers retry against the remaining sites in
/// the next round, up to `attempts` rounds.
#[derive(Debug, Clone, Copy)]
pub struct ConstrainedNearestMatcher {
    attempts: usize,
    max_distance: f64,
}

impl ConstrainedNearestMatcher {
    pub fn new(attempts: usize, max_distance: f64) -> Self {
        Self { attempts, max_distance }
    }

    #[inline] pub fn attempts(&self) -> usize { self.attempts }

    #[inline] pub fn max_distance(&self) -> f64 { self.max_distance }

    /// Match `addresses` to `sites`. Both must share a metric CRS.
    pub fn run(&self, addresses: &PointSet, sites: &PointSet) -> Result<Matching> {
        addresses.ensure_metric_with(sites, "constrained nearest matching")?;

        let mut matching = Matching::default();
        if !(self.max_distance.is_finite() && self.max_distance > 0.0) || addresses.is_empty() || sites.is_empty() {
            return Ok(matching);
        }

        let mut open_addresses = addresses.iter().collect::<Vec<_>>();
        let mut taken_sites = AHashSet::new();

        for round in 0..self.attempts {
            if open_addresses.is_empty() || taken_sites.len() == sites.len() { break }

            let pool = sites.retain(|id| !taken_sites.contains(&id));

            let mut candidates = open_addresses.iter()
                .filter_map(|&(address, point)| pool.nearest_within(point, self.max_distance)
                    .map(|(site, distance)| MatchPair { address, site, distance, round }))
                .collect::<Vec<_>>();

            if candidates.is_empty() {
                debug!("[fusion::matcher] round {round}: no candidates left, stopping");
                break;
            }

            // Closest proposer wins each site; equal distances fall back to address order.
            candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.address.cmp(&b.address)));

            let mut accepted = AHashSet::new();
            for pair in candidates {
                if taken_sites.insert(pair.site) {
                    accepted.insert(pair.address);
                    matching.push(pair);
                }
            }

            open_addresses.retain(|(address, _)| !accepted.contains(address));
            debug!("[fusion::matcher] round {round}: accepted {} pairs, {} addresses open", accepted.len(), open_addresses.len());
        }

        let share = 100.0 * matching.len() as f64 / sites.len() as f64;
        info!(
            "[fusion::matcher] matched {} of {} addresses to {} of {} solar sites ({share:.2}%) within {} m",
            matching.len(), addresses.len(), matching.len(), sites.len(), self.max_distance,
        );

        Ok(matching)
    }
}
