use serde::{Deserialize, Serialize};

/// Coordination-number histogram of a neighbor graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinationHistogram {
    /// `bins[k]` is the number of particles with exactly `k + 3` neighbors.
    pub bins: Vec<u32>,
    /// Particles with fewer than 3 neighbors (boundary or under-constrained).
    pub under_constrained: u32,
}

impl CoordinationHistogram {
    /// Bins coordination numbers by `z - 3`; `z < 3` goes to `under_constrained`.
    pub fn from_coordination(zs: &[usize]) -> Self {
        let z_max = zs.iter().copied().max().unwrap_or(0);
        let mut bins = vec![0u32; z_max.saturating_sub(2)];
        let mut under_constrained = 0;
        for &z in zs {
            match z.checked_sub(3) {
                Some(k) => bins[k] += 1,
                None => under_constrained += 1,
            }
        }
        CoordinationHistogram { bins, under_constrained }
    }

    pub fn total(&self) -> u32 {
        self.bins.iter().sum::<u32>() + self.under_constrained
    }
}

/// Per-particle fields of one frame, kept only on request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleFields {
    pub coordination: Vec<usize>,
    pub hexatic: Vec<f64>,
    pub square: Vec<f64>,
    pub scalar_order: Vec<f64>,
}

/// Scalar measurements of one analyzed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSummary {
    pub id: i64,
    pub particle_count: usize,
    pub energy: f64,
    pub scalar_radius: f64,
    pub number_density: f64,
    pub ideal_packing_density: f64,
    /// `(k, <Psi_k>)` for every configured bond order.
    pub bond_order_averages: Vec<(u32, f64)>,
    pub square_order_average: f64,
    pub scalar_order_average: f64,
    pub overall_scalar_order: f64,
    /// `None` for a circular boundary.
    pub overall_scalar_order_normalized: Option<f64>,
    pub overall_best_angle: f64,
    pub expected_cluster_size: f64,
    pub coordination: CoordinationHistogram,
    pub mean_coordination: f64,
    #[serde(default)]
    pub particle_fields: Option<ParticleFields>,
}

impl FrameSummary {
    /// Average bond-orientational order of order `k`, if it was computed.
    pub fn bond_order(&self, k: u32) -> Option<f64> {
        self.bond_order_averages.iter().find(|(order, _)| *order == k).map(|(_, v)| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bins_by_z_minus_three() {
        let hist = CoordinationHistogram::from_coordination(&[3, 4, 4, 6]);
        assert_eq!(hist.bins, vec![1, 2, 0, 1]);
        assert_eq!(hist.under_constrained, 0);
        assert_eq!(hist.total(), 4);
    }

    #[test]
    fn low_coordination_does_not_underflow() {
        let hist = CoordinationHistogram::from_coordination(&[0, 2, 3]);
        assert_eq!(hist.bins, vec![1]);
        assert_eq!(hist.under_constrained, 2);

        let only_low = CoordinationHistogram::from_coordination(&[1, 2]);
        assert!(only_low.bins.is_empty());
        assert_eq!(only_low.under_constrained, 2);
    }
}
