use packing_common::{angle_to_vec, ContactParams, Vec2};
use rayon::prelude::*;

/// Sparse contact relation in upper-triangular storage: every pair `(i, j)`
/// has `i < j`, no self pairs and no mirrored duplicates. Pairs are sorted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactMatrix {
    n: usize,
    pairs: Vec<(usize, usize)>,
}

/// Oriented bounding rectangle of one assembly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedRect {
    pub center: Vec2,
    /// Unit vector along the long axis.
    pub axis: Vec2,
    pub half_length: f64,
    pub half_width: f64,
}

impl OrientedRect {
    pub fn new(center: Vec2, theta: f64, half_length: f64, half_width: f64) -> Self {
        OrientedRect { center, axis: angle_to_vec(theta), half_length, half_width }
    }

    pub fn corners(&self) -> [Vec2; 4] {
        let u = self.axis * self.half_length;
        let v = self.axis.perp() * self.half_width;
        let c = self.center;
        [c + u + v, c + u - v, c - u - v, c - u + v]
    }

    /// Half extent of the rectangle projected onto unit vector `dir`.
    fn projected_radius(&self, dir: Vec2) -> f64 {
        self.half_length * self.axis.dot(dir).abs() + self.half_width * self.axis.perp().dot(dir).abs()
    }

    /// Separating-axis test. Touching rectangles count as intersecting.
    pub fn intersects(&self, other: &OrientedRect) -> bool {
        let offset = other.center - self.center;
        [self.axis, self.axis.perp(), other.axis, other.axis.perp()]
            .iter()
            .all(|&dir| offset.dot(dir).abs() <= self.projected_radius(dir) + other.projected_radius(dir))
    }
}

impl ContactMatrix {
    /// Builds a matrix from arbitrary pairs, normalizing to `i < j` and dropping self pairs.
    pub fn from_pairs(n: usize, pairs: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut pairs: Vec<(usize, usize)> = pairs
            .into_iter()
            .filter(|(i, j)| i != j)
            .map(|(i, j)| if i < j { (i, j) } else { (j, i) })
            .collect();
        pairs.sort_unstable();
        pairs.dedup();
        ContactMatrix { n, pairs }
    }

    /// Brief contact: centers closer than `2a`.
    pub fn brief(positions: &[Vec2], a: f64) -> Self {
        Self::scan(positions, a, false)
    }

    /// Dense scan of the strict upper triangle. The diagonal is never visited,
    /// so self pairs are removed regardless of the distance comparison.
    fn scan(positions: &[Vec2], a: f64, inclusive: bool) -> Self {
        let r_sq = 4.0 * a * a;
        let n = positions.len();
        let pairs: Vec<(usize, usize)> = (0..n)
            .into_par_iter()
            .flat_map_iter(|i| {
                let pi = positions[i];
                ((i + 1)..n)
                    .filter(move |&j| {
                        let d_sq = pi.distance_squared(positions[j]);
                        d_sq < r_sq || (inclusive && d_sq == r_sq)
                    })
                    .map(move |j| (i, j))
            })
            .collect();
        ContactMatrix { n, pairs }
    }

    /// Fine contact: prefilter at the rectangle circumradius, then the
    /// oriented-rectangle intersection test on every surviving pair. The
    /// prefilter keeps pairs at exactly twice the circumradius, where corners touch.
    pub fn fine(positions: &[Vec2], thetas: &[f64], params: &ContactParams) -> Self {
        let rects: Vec<OrientedRect> = positions
            .iter()
            .zip(thetas)
            .map(|(&p, &theta)| OrientedRect::new(p, theta, params.half_length, params.half_width))
            .collect();
        let brief = Self::scan(positions, params.prefilter_radius, true);
        let pairs = brief
            .pairs
            .into_par_iter()
            .filter(|&(i, j)| rects[i].intersects(&rects[j]))
            .collect();
        ContactMatrix { n: brief.n, pairs }
    }

    /// Number of particles the matrix is defined over.
    pub fn dim(&self) -> usize {
        self.n
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    /// Order-insensitive membership query.
    pub fn contains(&self, i: usize, j: usize) -> bool {
        let key = if i < j { (i, j) } else { (j, i) };
        self.pairs.binary_search(&key).is_ok()
    }

    /// Symmetric neighbor lists: `j` in `result[i]` iff `i` in `result[j]`.
    pub fn symmetrized(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.n];
        for &(i, j) in &self.pairs {
            adjacency[i].push(j);
            adjacency[j].push(i);
        }
        for adj in adjacency.iter_mut() {
            adj.sort_unstable();
        }
        adjacency
    }

    pub fn is_subset_of(&self, other: &ContactMatrix) -> bool {
        self.pairs.iter().all(|&(i, j)| other.contains(i, j))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    #[test]
    fn brief_matrix_is_strict_upper_triangular() {
        let positions = vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(5.0, 0.0), Vec2::new(0.0, 0.0)];
        let m = ContactMatrix::brief(&positions, 1.0);
        assert_eq!(m.pairs(), &[(0, 1), (0, 3), (1, 3)]);
        assert!(m.pairs().iter().all(|(i, j)| i < j));
        assert!(m.contains(3, 0));
        assert!(!m.contains(2, 2));
    }

    #[test]
    fn symmetrized_contacts_are_mutual() {
        let m = ContactMatrix::from_pairs(4, [(2, 0), (0, 2), (1, 3), (3, 3)]);
        assert_eq!(m.pairs(), &[(0, 2), (1, 3)]);
        let adj = m.symmetrized();
        assert_eq!(adj[0], vec![2]);
        assert_eq!(adj[2], vec![0]);
        assert_eq!(adj[3], vec![1]);
    }

    #[test]
    fn parallel_rods_side_by_side_touch() {
        let a = OrientedRect::new(Vec2::new(0.0, 0.0), 0.0, 3.0, 0.5);
        let b = OrientedRect::new(Vec2::new(0.0, 0.9), 0.0, 3.0, 0.5);
        let c = OrientedRect::new(Vec2::new(0.0, 1.1), 0.0, 3.0, 0.5);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn crossed_rods_separated_along_diagonal() {
        // a T-configuration just out of reach
        let a = OrientedRect::new(Vec2::new(0.0, 0.0), 0.0, 2.0, 0.5);
        let b = OrientedRect::new(Vec2::new(0.0, 2.6), PI / 2.0, 2.0, 0.5);
        assert!(!a.intersects(&b));
        let b_close = OrientedRect::new(Vec2::new(0.0, 2.4), PI / 2.0, 2.0, 0.5);
        assert!(a.intersects(&b_close));
    }

    #[test]
    fn corner_to_corner_contact_beyond_half_length_sum() {
        // diagonal contact at a center distance larger than 2 * half_length
        let params = ContactParams::new(3, 1.0, 1.0, 1.5);
        let h = params.half_length;
        let w = params.half_width;
        let a = OrientedRect::new(Vec2::new(0.0, 0.0), 0.0, h, w);
        let b = OrientedRect::new(Vec2::new(2.0 * h - 0.01, 2.0 * w - 0.01), 0.0, h, w);
        assert!(a.intersects(&b));
        let dist = b.center.length();
        assert!(dist > 2.0 * h);
        assert!(dist < 2.0 * params.prefilter_radius);
    }

    #[test]
    fn exact_corner_touch_survives_prefilter() {
        // half length 4, half width 3: circumradius 5, corners meet at (4, 3)
        let params = ContactParams::new(3, 1.0, 3.0, 1.5);
        assert_eq!(params.prefilter_radius, 5.0);
        let positions = vec![Vec2::new(0.0, 0.0), Vec2::new(8.0, 6.0)];
        let thetas = vec![0.0, 0.0];
        let a = OrientedRect::new(positions[0], 0.0, params.half_length, params.half_width);
        let b = OrientedRect::new(positions[1], 0.0, params.half_length, params.half_width);
        assert!(a.intersects(&b));
        assert!(ContactMatrix::brief(&positions, params.prefilter_radius).is_empty());
        let fine = ContactMatrix::fine(&positions, &thetas, &params);
        assert_eq!(fine.pairs(), &[(0, 1)]);
    }

    #[test]
    fn fine_contacts_are_subset_of_prefilter() {
        let mut rng = StdRng::seed_from_u64(17);
        let params = ContactParams::new(4, 1.0, 1.2, 1.5);
        for _ in 0..5 {
            let positions: Vec<Vec2> = (0..80)
                .map(|_| Vec2::new(rng.random_range(-15.0..15.0), rng.random_range(-15.0..15.0)))
                .collect();
            let thetas: Vec<f64> = (0..80).map(|_| rng.random_range(0.0..PI)).collect();
            let fine = ContactMatrix::fine(&positions, &thetas, &params);
            let brief = ContactMatrix::brief(&positions, params.prefilter_radius);
            assert!(fine.is_subset_of(&brief));

            // exhaustive check: the prefilter never drops a genuine intersection
            for i in 0..positions.len() {
                for j in (i + 1)..positions.len() {
                    let ri = OrientedRect::new(positions[i], thetas[i], params.half_length, params.half_width);
                    let rj = OrientedRect::new(positions[j], thetas[j], params.half_length, params.half_width);
                    assert_eq!(ri.intersects(&rj), fine.contains(i, j));
                }
            }
        }
    }
}
