//! Bond-orientational, nematic and square-symmetry order parameters.
//!
//! Everything here is a pure function of positions, orientations and a
//! neighbor relation; [`crate::frame::Frame`] decides which relation to feed in.

use log::warn;
use num_complex::Complex64;
use packing_common::{wrap_angle, Vec2};
use std::f64::consts::PI;

/// Substitute order value for particles with too few neighbors to measure.
pub const SENTINEL_ORDER: f64 = 0.01;

/// Two neighbors belong to the same aligned cluster below this angle difference.
pub const ANGLE_CLUSTER_TOLERANCE: f64 = PI / 12.0;

/// Bins of the aligned-angle-difference histogram over `[0, pi/2]`.
pub const ANGLE_DIFF_BINS: usize = 24;

/// `|(1/z) sum_j exp(i k theta_ij)|` with `theta_ij` the bearing from `center` to each neighbor.
/// Zero when there are no neighbors.
pub fn psi_k(center: Vec2, neighbors: impl IntoIterator<Item = Vec2>, k: u32) -> f64 {
    let mut sum = Complex64::new(0.0, 0.0);
    let mut z = 0usize;
    for rj in neighbors {
        let bond = rj - center;
        sum += Complex64::from_polar(1.0, k as f64 * bond.y.atan2(bond.x));
        z += 1;
    }
    if z == 0 {
        return 0.0;
    }
    (sum.norm() / z as f64).min(1.0)
}

/// Per-particle `Psi_k` over graph neighbors.
pub fn bond_orientational_order(positions: &[Vec2], adjacency: &[Vec<usize>], k: u32) -> Vec<f64> {
    positions
        .iter()
        .zip(adjacency)
        .map(|(&r, adj)| psi_k(r, adj.iter().map(|&j| positions[j]), k))
        .collect()
}

/// Square-phase order: `Psi_order` over the `order` nearest contacts of each particle.
/// Particles with fewer than `order` contacts get [`SENTINEL_ORDER`].
pub fn square_order(positions: &[Vec2], contacts: &[Vec<usize>], order: u32) -> Vec<f64> {
    let wanted = order as usize;
    let mut sentinels = 0usize;
    let field = positions
        .iter()
        .zip(contacts)
        .map(|(&r, js)| {
            if js.len() < wanted {
                sentinels += 1;
                return SENTINEL_ORDER;
            }
            let mut by_distance: Vec<(f64, Vec2)> =
                js.iter().map(|&j| (r.distance_squared(positions[j]), positions[j])).collect();
            by_distance.sort_by(|a, b| a.0.total_cmp(&b.0));
            psi_k(r, by_distance.into_iter().take(wanted).map(|(_, p)| p), order)
        })
        .collect();
    if sentinels > 0 {
        warn!(
            "{} of {} particles have fewer than {} contacts; square order set to {}.",
            sentinels,
            positions.len(),
            wanted,
            SENTINEL_ORDER
        );
    }
    field
}

/// Traceless symmetric alignment tensor `[[a, b], [b, -a]]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QTensor {
    pub a: f64,
    pub b: f64,
}

impl QTensor {
    /// `n (x) n - I/2` for the director `n = (cos theta, sin theta)`.
    pub fn from_angle(theta: f64) -> Self {
        let (ny, nx) = theta.sin_cos();
        QTensor { a: nx * nx - 0.5, b: nx * ny }
    }

    /// Average of a set of tensors; `None` for an empty set.
    pub fn mean(tensors: impl IntoIterator<Item = QTensor>) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = QTensor::default();
        for q in tensors {
            sum.a += q.a;
            sum.b += q.b;
            count += 1;
        }
        (count > 0).then(|| QTensor { a: sum.a / count as f64, b: sum.b / count as f64 })
    }

    pub fn largest_eigenvalue(&self) -> f64 {
        self.a.hypot(self.b)
    }

    /// 2D scalar order `S = 2 lambda_max`, in `[0, 1]`.
    pub fn scalar_order(&self) -> f64 {
        (2.0 * self.largest_eigenvalue()).min(1.0)
    }

    /// Angle of the eigenvector of the largest eigenvalue, in `(-pi/2, pi/2]`.
    pub fn eigen_angle(&self) -> f64 {
        0.5 * self.b.atan2(self.a)
    }
}

/// Local scalar order per particle, averaging `Q` over the particle and its neighbors.
/// Particles with 0 or 1 neighbors get [`SENTINEL_ORDER`].
pub fn local_scalar_order(thetas: &[f64], adjacency: &[Vec<usize>]) -> Vec<f64> {
    let tensors: Vec<QTensor> = thetas.iter().map(|&t| QTensor::from_angle(t)).collect();
    let mut sentinels = 0usize;
    let field = adjacency
        .iter()
        .enumerate()
        .map(|(i, adj)| {
            if adj.len() <= 1 {
                sentinels += 1;
                return SENTINEL_ORDER;
            }
            let closed = std::iter::once(i).chain(adj.iter().copied()).map(|j| tensors[j]);
            QTensor::mean(closed).map_or(SENTINEL_ORDER, |q| q.scalar_order())
        })
        .collect();
    if sentinels > 0 {
        warn!(
            "{} particles have at most one neighbor; local scalar order set to {}.",
            sentinels, SENTINEL_ORDER
        );
    }
    field
}

/// System-wide mean alignment tensor.
pub fn global_q_tensor(thetas: &[f64]) -> Option<QTensor> {
    QTensor::mean(thetas.iter().map(|&t| QTensor::from_angle(t)))
}

/// Scalar order of the whole system, treated as one uniform neighborhood.
pub fn global_scalar_order(thetas: &[f64]) -> f64 {
    global_q_tensor(thetas).map_or(0.0, |q| q.scalar_order())
}

/// Orientation the whole system is best aligned to.
pub fn global_best_angle(thetas: &[f64]) -> f64 {
    match global_q_tensor(thetas) {
        Some(q) if q.largest_eigenvalue() > 1e-12 => q.eigen_angle(),
        Some(_) => {
            warn!("Mean Q-tensor is isotropic; best angle is undefined, reporting 0.");
            0.0
        }
        None => 0.0,
    }
}

/// `min(|ti + tj| mod pi, |ti - tj| mod pi)` for mod-pi orientations.
pub fn aligned_angle_difference(theta_i: f64, theta_j: f64) -> f64 {
    let ti = wrap_angle(theta_i, PI);
    let tj = wrap_angle(theta_j, PI);
    wrap_angle((ti + tj).abs(), PI).min(wrap_angle((ti - tj).abs(), PI))
}

/// Connected components of the aligned subgraph.
#[derive(Debug, Clone, PartialEq)]
pub struct AngleClusters {
    /// Members of each cluster, ascending, clusters ordered by first member.
    pub clusters: Vec<Vec<usize>>,
    /// `size_counts[s]` is the number of clusters of size `s`.
    pub size_counts: Vec<usize>,
    pub particle_count: usize,
}

impl AngleClusters {
    /// Expected size of the cluster containing a uniformly random particle:
    /// `sum_s count(s) * s^2 / N`.
    pub fn expected_cluster_size(&self) -> f64 {
        if self.particle_count == 0 {
            return 0.0;
        }
        let weighted: f64 = self
            .size_counts
            .iter()
            .enumerate()
            .map(|(s, &count)| count as f64 * (s * s) as f64)
            .sum();
        weighted / self.particle_count as f64
    }

    pub fn largest(&self) -> usize {
        self.clusters.iter().map(Vec::len).max().unwrap_or(0)
    }
}

fn find(parent: &mut [usize], i: usize) -> usize {
    if parent[i] != i {
        parent[i] = find(parent, parent[i]);
    }
    parent[i]
}

fn union(parent: &mut [usize], rank: &mut [usize], i: usize, j: usize) {
    let pi = find(parent, i);
    let pj = find(parent, j);
    if pi != pj {
        if rank[pi] < rank[pj] {
            parent[pi] = pj;
        } else if rank[pi] > rank[pj] {
            parent[pj] = pi;
        } else {
            parent[pj] = pi;
            rank[pi] += 1;
        }
    }
}

/// Clusters particles joined by edges whose aligned angle difference is below `tolerance`.
pub fn angle_clusters(
    thetas: &[f64],
    edges: impl IntoIterator<Item = (usize, usize)>,
    tolerance: f64,
) -> AngleClusters {
    let n = thetas.len();
    let mut parent: Vec<usize> = (0..n).collect();
    let mut rank = vec![0usize; n];
    for (i, j) in edges {
        if aligned_angle_difference(thetas[i], thetas[j]) < tolerance {
            union(&mut parent, &mut rank, i, j);
        }
    }

    let mut root_to_cluster = vec![usize::MAX; n];
    let mut clusters: Vec<Vec<usize>> = Vec::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        if root_to_cluster[root] == usize::MAX {
            root_to_cluster[root] = clusters.len();
            clusters.push(Vec::new());
        }
        clusters[root_to_cluster[root]].push(i);
    }

    let mut size_counts = vec![0usize; n + 1];
    for cluster in &clusters {
        size_counts[cluster.len()] += 1;
    }
    AngleClusters { clusters, size_counts, particle_count: n }
}

/// Histogram of aligned angle differences over `[0, pi/2]` in [`ANGLE_DIFF_BINS`] bins,
/// normalized by the number of edges. Differences above `pi/2` are counted in
/// the normalization but fall outside every bin.
pub fn angle_difference_distribution(thetas: &[f64], edges: impl IntoIterator<Item = (usize, usize)>) -> Vec<f64> {
    let mut hist = vec![0usize; ANGLE_DIFF_BINS];
    let mut total = 0usize;
    let width = (PI / 2.0) / ANGLE_DIFF_BINS as f64;
    for (i, j) in edges {
        total += 1;
        let diff = aligned_angle_difference(thetas[i], thetas[j]);
        if diff <= PI / 2.0 {
            let bin = ((diff / width) as usize).min(ANGLE_DIFF_BINS - 1);
            hist[bin] += 1;
        }
    }
    if total == 0 {
        warn!("No edges to build an angle difference distribution from.");
        return vec![0.0; ANGLE_DIFF_BINS];
    }
    hist.into_iter().map(|c| c as f64 / total as f64).collect()
}

/// Histogram of orientations mod pi in `bins` equal bins over `[0, pi)`.
pub fn orientation_histogram(thetas: &[f64], bins: usize) -> Vec<u32> {
    let mut hist = vec![0u32; bins];
    if bins == 0 {
        return hist;
    }
    for &t in thetas {
        let bin = ((wrap_angle(t, PI) / PI * bins as f64) as usize).min(bins - 1);
        hist[bin] += 1;
    }
    hist
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
