//! Causal connectivity between peaks and joint-fit grouping.
//!
//! Two peaks are causally connected when their fit ranges overlap, so they
//! must be fit together against one continuum.

use std::sync::Arc;

use gammaroi_core::{Continuum, Peak};
use log::debug;

/// Upper edge of a peak's region of influence.
fn causal_upper(peak: &Peak, n_sigma: f64, use_roi: bool) -> f64 {
    if !peak.is_gaussian_defined() {
        return peak.upper_x();
    }
    let edge = peak.mean() + n_sigma * peak.sigma();
    if use_roi && peak.continuum().energy_range_defined() {
        edge.max(peak.upper_x())
    } else {
        edge
    }
}

/// Lower edge of a peak's region of influence.
fn causal_lower(peak: &Peak, n_sigma: f64, use_roi: bool) -> f64 {
    if !peak.is_gaussian_defined() {
        return peak.lower_x();
    }
    let edge = peak.mean() - n_sigma * peak.sigma();
    if use_roi && peak.continuum().energy_range_defined() {
        edge.min(peak.lower_x())
    } else {
        edge
    }
}

/// True when the peaks' regions of influence do not overlap.
///
/// The earlier peak reaches up to `mean + n_sigma * sigma`, the later one
/// down to `mean - n_sigma * sigma`; with `use_roi` each also reaches its
/// ROI edge when that is farther. Data-defined peaks use their range.
/// Peaks sharing a continuum are never disconnected.
#[must_use]
pub fn causally_disconnected(a: &Peak, b: &Peak, n_sigma: f64, use_roi: bool) -> bool {
    if a.shares_continuum_with(b) {
        return false;
    }
    let (earlier, later) = if a.mean() <= b.mean() { (a, b) } else { (b, a) };
    causal_lower(later, n_sigma, use_roi) > causal_upper(earlier, n_sigma, use_roi)
}

/// Negation of [`causally_disconnected`].
#[must_use]
pub fn causally_connected(a: &Peak, b: &Peak, n_sigma: f64, use_roi: bool) -> bool {
    !causally_disconnected(a, b, n_sigma, use_roi)
}

/// Union-Find over peak indices.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, x: usize, y: usize) {
        let px = self.find(x);
        let py = self.find(y);
        if px == py {
            return;
        }
        match self.rank[px].cmp(&self.rank[py]) {
            std::cmp::Ordering::Less => self.parent[px] = py,
            std::cmp::Ordering::Greater => self.parent[py] = px,
            std::cmp::Ordering::Equal => {
                self.parent[py] = px;
                self.rank[px] += 1;
            }
        }
    }
}

/// Partitions peaks into sets that must be fit jointly.
///
/// Connectivity is transitive: A-B and B-C put A, B and C in one group even
/// if A and C are far apart. Groups hold indices into `peaks`, each sorted by
/// peak mean, and are ordered by their lowest mean.
#[must_use]
pub fn group_causally_connected(peaks: &[Peak], n_sigma: f64, use_roi: bool) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&i, &j| peaks[i].mean().total_cmp(&peaks[j].mean()));

    let mut uf = UnionFind::new(peaks.len());
    for (pos, &i) in order.iter().enumerate() {
        for &j in &order[pos + 1..] {
            if causally_connected(&peaks[i], &peaks[j], n_sigma, use_roi) {
                uf.union(i, j);
            }
        }
    }

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut group_of_root: Vec<Option<usize>> = vec![None; peaks.len()];
    for &i in &order {
        let root = uf.find(i);
        match group_of_root[root] {
            Some(group) => groups[group].push(i),
            None => {
                group_of_root[root] = Some(groups.len());
                groups.push(vec![i]);
            }
        }
    }
    debug!(
        "{} peaks grouped into {} joint-fit sets",
        peaks.len(),
        groups.len()
    );
    groups
}

/// Points every peak at one continuum covering the union of their ranges.
///
/// The first peak's continuum is copied as the template; peaks whose range
/// is undefined contribute their provisional extent. Does nothing for fewer
/// than two peaks.
pub fn share_continuum(peaks: &mut [&mut Peak]) {
    let Some(first) = peaks.first() else {
        return;
    };
    if peaks.len() < 2 {
        return;
    }
    let mut shared = Continuum::clone(first.continuum());
    let lower = peaks
        .iter()
        .map(|p| p.lower_x())
        .fold(f64::INFINITY, f64::min);
    let upper = peaks
        .iter()
        .map(|p| p.upper_x())
        .fold(f64::NEG_INFINITY, f64::max);
    shared.set_range(lower, upper);

    let shared = Arc::new(shared);
    for peak in peaks.iter_mut() {
        peak.set_continuum(Arc::clone(&shared));
    }
    debug!("shared continuum [{lower:.3}, {upper:.3}] across {} peaks", peaks.len());
}
