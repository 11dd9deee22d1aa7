use log::{debug, warn};
use packing_common::{
    AnalysisError, AnalysisResult, ContactParams, CoordinationHistogram, FrameRecord, RunMetadata, Vec2,
    wrap_angle,
};
use std::f64::consts::PI;
use std::sync::{Arc, OnceLock};

use crate::contact::ContactMatrix;
use crate::graph::NeighborGraph;
use crate::interpolation::{angle_interpolation, GridField};
use crate::order::{self, AngleClusters, ANGLE_CLUSTER_TOLERANCE};
use crate::scale::ScaleHelper;

/// Bins of the per-frame orientation histogram (one per degree).
pub const ANGLE_DIST_BINS: usize = 180;

/// One immutable simulation frame plus lazily computed, cached geometry.
///
/// Every cached quantity is computed at most once and is safe to read from
/// several threads after construction.
#[derive(Debug)]
pub struct Frame {
    pub id: i64,
    pub energy: f64,
    pub energy_curve: Vec<f64>,
    positions: Vec<Vec2>,
    /// Orientations reduced mod pi.
    thetas: Vec<f64>,
    scalar_radius: f64,
    la: f64,
    lb: f64,
    metadata: Arc<RunMetadata>,
    contact: ContactParams,

    neighbor_graph: OnceLock<AnalysisResult<NeighborGraph>>,
    fine_contacts: OnceLock<ContactMatrix>,
    sphere_contacts: OnceLock<ContactMatrix>,
    scalar_order: OnceLock<AnalysisResult<Vec<f64>>>,
    angle_clusters: OnceLock<AnalysisResult<AngleClusters>>,
}

impl Frame {
    /// Builds a frame from a parsed record and its run's metadata.
    pub fn new(record: FrameRecord, metadata: Arc<RunMetadata>, contact: ContactParams) -> AnalysisResult<Self> {
        record.validate()?;
        metadata.validate()?;
        let positions = record.x.iter().zip(&record.y).map(|(&x, &y)| Vec2::new(x, y)).collect();
        let thetas = record.a.iter().map(|&a| wrap_angle(a, PI)).collect();
        let lb = record.scalar_radius;
        let la = metadata.gamma() * lb;
        Ok(Frame {
            id: record.id,
            energy: record.energy,
            energy_curve: record.energy_curve,
            positions,
            thetas,
            scalar_radius: record.scalar_radius,
            la,
            lb,
            metadata,
            contact,
            neighbor_graph: OnceLock::new(),
            fine_contacts: OnceLock::new(),
            sphere_contacts: OnceLock::new(),
            scalar_order: OnceLock::new(),
            angle_clusters: OnceLock::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    pub fn thetas(&self) -> &[f64] {
        &self.thetas
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    pub fn contact_params(&self) -> &ContactParams {
        &self.contact
    }

    /// Minor semi-axis `L` of the boundary at this frame.
    pub fn scalar_radius(&self) -> f64 {
        self.scalar_radius
    }

    /// Current major semi-axis.
    pub fn la(&self) -> f64 {
        self.la
    }

    /// Current minor semi-axis.
    pub fn lb(&self) -> f64 {
        self.lb
    }

    /// Boundary aspect ratio `La / Lb`.
    pub fn gamma(&self) -> f64 {
        self.metadata.gamma()
    }

    // --- Scalar geometry ---

    pub fn number_density(&self) -> f64 {
        debug_assert!(self.la > 0.0 && self.lb > 0.0, "boundary semi-axes must be positive");
        self.len() as f64 / (PI * self.la * self.lb)
    }

    /// Number density weighted by the excluded area of one assembly.
    pub fn ideal_packing_density(&self) -> f64 {
        let m = self.metadata.assembly_number as f64;
        self.number_density() * (PI + 2.0 * self.metadata.sphere_distance * (m - 1.0))
    }

    /// Global scalar order of an ideal boundary-aligned packing, `(G^2 - 1) / G * atanh(1 / G)`.
    /// `None` when the boundary is a circle, where it vanishes.
    pub fn ideal_overall_scalar_coef(&self) -> Option<f64> {
        let g = self.gamma();
        if g <= 1.0 + 1e-12 {
            return None;
        }
        Some((g * g - 1.0) / g * (1.0 / g).atanh())
    }

    // --- Graphs ---

    /// Delaunay neighbor graph of the assembly centroids.
    pub fn neighbor_graph(&self) -> AnalysisResult<&NeighborGraph> {
        self.neighbor_graph
            .get_or_init(|| {
                let graph = NeighborGraph::delaunay(&self.positions);
                match &graph {
                    Ok(g) => debug!("Frame {}: Delaunay graph with {} edges.", self.id, g.edge_count()),
                    Err(e) => debug!("Frame {}: no Delaunay graph: {}", self.id, e),
                }
                graph
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    pub fn coordination_numbers(&self) -> AnalysisResult<Vec<usize>> {
        Ok(self.neighbor_graph()?.coordination_numbers())
    }

    pub fn coordination_histogram(&self) -> AnalysisResult<CoordinationHistogram> {
        Ok(self.neighbor_graph()?.coordination_histogram())
    }

    /// Fine (oriented rectangle) contact matrix.
    pub fn contact_matrix(&self) -> &ContactMatrix {
        self.fine_contacts
            .get_or_init(|| ContactMatrix::fine(&self.positions, &self.thetas, &self.contact))
    }

    /// Brief contact matrix at the sphere contact radius.
    pub fn sphere_contact_matrix(&self) -> &ContactMatrix {
        self.sphere_contacts
            .get_or_init(|| ContactMatrix::brief(&self.positions, self.contact.sphere_contact_radius))
    }

    // --- Order parameters ---

    /// Per-particle bond-orientational order `Psi_k` over Delaunay neighbors.
    pub fn hexatic(&self, k: u32) -> AnalysisResult<Vec<f64>> {
        let graph = self.neighbor_graph()?;
        Ok(order::bond_orientational_order(&self.positions, graph.adjacency(), k))
    }

    pub fn average_bond_order(&self, k: u32) -> AnalysisResult<f64> {
        Ok(order::mean(&self.hexatic(k)?))
    }

    /// Square-phase order over the nearest sphere contacts.
    pub fn square_order(&self, k: u32) -> Vec<f64> {
        let contacts = self.sphere_contact_matrix().symmetrized();
        order::square_order(&self.positions, &contacts, k)
    }

    pub fn average_square_order(&self, k: u32) -> f64 {
        order::mean(&self.square_order(k))
    }

    /// Local scalar order over each particle's closed Delaunay neighborhood.
    pub fn scalar_order_field(&self) -> AnalysisResult<&[f64]> {
        self.scalar_order
            .get_or_init(|| {
                let graph = self.neighbor_graph()?;
                Ok(order::local_scalar_order(&self.thetas, graph.adjacency()))
            })
            .as_ref()
            .map(Vec::as_slice)
            .map_err(Clone::clone)
    }

    pub fn average_scalar_order(&self) -> AnalysisResult<f64> {
        Ok(order::mean(self.scalar_order_field()?))
    }

    pub fn overall_scalar_order(&self) -> f64 {
        order::global_scalar_order(&self.thetas)
    }

    pub fn overall_best_angle(&self) -> f64 {
        order::global_best_angle(&self.thetas)
    }

    /// Overall scalar order relative to the ideal boundary-aligned value.
    pub fn overall_scalar_order_normalized(&self) -> Option<f64> {
        self.ideal_overall_scalar_coef()
            .filter(|&coef| coef > 1e-12)
            .map(|coef| self.overall_scalar_order() / coef)
    }

    /// Mean director angle, `atan2(<sin theta>, <cos theta>) mod pi`.
    pub fn mean_orientation(&self) -> f64 {
        let (s, c) = self
            .thetas
            .iter()
            .fold((0.0, 0.0), |(s, c), &t| (s + t.sin(), c + t.cos()));
        wrap_angle(s.atan2(c), PI)
    }

    /// `<(3 cos^2(theta - theta_mean) - 1) / 2>` about the mean orientation.
    pub fn nematic_order_mean_axis(&self) -> f64 {
        if self.thetas.is_empty() {
            return 0.0;
        }
        let mean_theta = self.mean_orientation();
        let sum: f64 = self
            .thetas
            .iter()
            .map(|&t| {
                let c = (t - mean_theta).cos();
                (3.0 * c * c - 1.0) * 0.5
            })
            .sum();
        sum / self.thetas.len() as f64
    }

    /// Radial profile of the squared tangential alignment `((x sin t - y cos t) / r)^2`,
    /// averaged in `bins` equal bins of `r / L` over `[0, 1)`. Empty bins are `None`.
    pub fn orientation_profile(&self, bins: usize) -> Vec<Option<f64>> {
        if bins == 0 {
            return Vec::new();
        }
        let mut sums = vec![0.0; bins];
        let mut counts = vec![0usize; bins];
        for (p, &t) in self.positions.iter().zip(&self.thetas) {
            let r = p.length();
            if r < 1e-12 {
                continue;
            }
            let normalized = r / self.scalar_radius;
            if normalized >= 1.0 {
                continue;
            }
            let bin = ((normalized * bins as f64) as usize).min(bins - 1);
            let tangential = (p.x * t.sin() - p.y * t.cos()) / r;
            sums[bin] += tangential * tangential;
            counts[bin] += 1;
        }
        sums.into_iter()
            .zip(counts)
            .map(|(s, c)| (c > 0).then(|| s / c as f64))
            .collect()
    }

    /// Orientation histogram over `[0, pi)` in one-degree bins.
    pub fn angle_distribution(&self) -> Vec<u32> {
        order::orientation_histogram(&self.thetas, ANGLE_DIST_BINS)
    }

    // --- Angle clusters ---

    pub fn angle_clusters(&self) -> AnalysisResult<&AngleClusters> {
        self.angle_clusters
            .get_or_init(|| {
                let graph = self.neighbor_graph()?;
                Ok(order::angle_clusters(&self.thetas, graph.edges(), ANGLE_CLUSTER_TOLERANCE))
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    pub fn expected_cluster_size(&self) -> AnalysisResult<f64> {
        Ok(self.angle_clusters()?.expected_cluster_size())
    }

    pub fn angle_difference_distribution(&self) -> AnalysisResult<Vec<f64>> {
        let graph = self.neighbor_graph()?;
        Ok(order::angle_difference_distribution(&self.thetas, graph.edges()))
    }

    // --- Sphere-level view ---

    /// Expands each assembly into its analog constituent spheres, spaced 2 apart
    /// along the director and centered on the assembly.
    pub fn to_spheres(&self) -> Vec<Vec2> {
        let m = self.metadata.assembly_number as f64;
        let extent = 1.0 + (m - 1.0) / 2.0 * self.metadata.sphere_distance;
        let count = (extent.round() as usize).max(1);
        let n_start = (count as f64 - 1.0) / 2.0;
        let offsets: Vec<Vec2> = (0..count)
            .map(|i| Vec2::new(2.0 * (i as f64 - n_start), 0.0))
            .collect();
        self.positions
            .iter()
            .zip(&self.thetas)
            .flat_map(|(&c, &t)| offsets.iter().map(move |o| c + o.rotate(t)))
            .collect()
    }

    /// `Psi_k` of the expanded sphere configuration over its own Delaunay graph.
    pub fn sphere_bond_order(&self, k: u32) -> AnalysisResult<Vec<f64>> {
        let spheres = self.to_spheres();
        let graph = NeighborGraph::delaunay(&spheres)?;
        Ok(order::bond_orientational_order(&spheres, graph.adjacency(), k))
    }

    // --- Fields for rendering ---

    /// Folded orientation field on a `sz x round(sz * Gamma)` grid spanning the current boundary.
    pub fn angle_interpolation(&self, fold: u32, sz: usize) -> AnalysisResult<GridField> {
        if fold == 0 {
            return Err(AnalysisError::degenerate("angle interpolation fold must be positive"));
        }
        let graph = self.neighbor_graph()?;
        let field = angle_interpolation(
            &self.positions,
            &self.thetas,
            graph.triangles(),
            fold,
            self.la,
            self.lb,
            self.gamma(),
            sz,
        );
        let undefined = field.values.len() - field.defined_count();
        if undefined > 0 {
            debug!("Frame {}: {} grid nodes outside the particle hull.", self.id, undefined);
        }
        Ok(field)
    }

    pub fn nematic_interpolation(&self, sz: usize) -> AnalysisResult<GridField> {
        self.angle_interpolation(2, sz)
    }

    pub fn d4_interpolation(&self, sz: usize) -> AnalysisResult<GridField> {
        self.angle_interpolation(4, sz)
    }

    /// Scale against the run's initial boundary: particles shrink as the boundary compresses.
    pub fn absolute_scale(&self, height: u32) -> ScaleHelper {
        ScaleHelper::for_boundary(height, self.metadata.boundary_a, self.metadata.boundary_b)
    }

    /// Scale against this frame's boundary: particles keep their apparent size.
    pub fn relative_scale(&self, height: u32) -> ScaleHelper {
        if self.lb <= 0.0 {
            warn!("Frame {} has a non-positive boundary; relative scale is meaningless.", self.id);
        }
        ScaleHelper::for_boundary(height, self.la, self.lb)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) fn metadata(m: u32, gamma: f64) -> Arc<RunMetadata> {
        Arc::new(RunMetadata {
            boundary_a: 20.0 * gamma,
            boundary_b: 20.0,
            assembly_number: m,
            sphere_distance: 1.0,
            particle_aspect_ratio: None,
        })
    }

    pub(crate) fn frame_from(
        id: i64,
        points: &[(f64, f64)],
        thetas: &[f64],
        scalar_radius: f64,
        meta: Arc<RunMetadata>,
    ) -> Frame {
        let record = FrameRecord {
            id,
            x: points.iter().map(|p| p.0).collect(),
            y: points.iter().map(|p| p.1).collect(),
            a: thetas.to_vec(),
            scalar_radius,
            energy: 0.1 * id as f64,
            energy_curve: vec![1.0, 0.5],
        };
        let contact = ContactParams::new(meta.assembly_number, meta.sphere_distance, 1.2, 1.5);
        Frame::new(record, meta, contact).unwrap()
    }

    /// Triangular lattice patch with spacing 2, jittered to avoid cocircular quadruples.
    pub(crate) fn lattice(rows: usize, cols: usize) -> Vec<(f64, f64)> {
        let mut points = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                let x = 2.0 * c as f64 + if r % 2 == 1 { 1.0 } else { 0.0 } - cols as f64;
                let y = 3f64.sqrt() * r as f64 - rows as f64;
                let jitter = 1e-3 * ((r * 31 + c * 17) % 7) as f64;
                points.push((x + jitter, y - jitter));
            }
        }
        points
    }

    #[test]
    fn frames_can_be_shared_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Frame>();
    }

    #[test]
    fn densities_follow_boundary() {
        let meta = metadata(3, 2.0);
        let points = lattice(3, 3);
        let frame = frame_from(0, &points, &vec![0.0; 9], 10.0, meta);
        assert_relative_eq!(frame.la(), 20.0);
        assert_relative_eq!(frame.lb(), 10.0);
        assert_relative_eq!(frame.number_density(), 9.0 / (PI * 200.0));
        assert_relative_eq!(frame.ideal_packing_density(), frame.number_density() * (PI + 4.0));
    }

    #[test]
    fn orientations_are_reduced_mod_pi() {
        let frame = frame_from(0, &lattice(2, 2), &[-0.5, PI + 0.25, 0.0, 2.0 * PI], 10.0, metadata(1, 1.0));
        for &t in frame.thetas() {
            assert!((0.0..PI).contains(&t));
        }
        assert_relative_eq!(frame.thetas()[0], PI - 0.5, epsilon = 1e-12);
        assert_relative_eq!(frame.thetas()[1], 0.25, epsilon = 1e-12);
    }

    #[test]
    fn derived_quantities_are_idempotent() {
        let points = lattice(5, 6);
        let thetas: Vec<f64> = (0..points.len()).map(|i| 0.37 * i as f64).collect();
        let frame = frame_from(4, &points, &thetas, 15.0, metadata(3, 1.5));

        assert_eq!(frame.number_density().to_bits(), frame.number_density().to_bits());
        assert_eq!(frame.hexatic(6).unwrap(), frame.hexatic(6).unwrap());
        assert_eq!(frame.square_order(4), frame.square_order(4));
        let s1: Vec<u64> = frame.scalar_order_field().unwrap().iter().map(|v| v.to_bits()).collect();
        let s2: Vec<u64> = frame.scalar_order_field().unwrap().iter().map(|v| v.to_bits()).collect();
        assert_eq!(s1, s2);
        assert_eq!(
            frame.expected_cluster_size().unwrap().to_bits(),
            frame.expected_cluster_size().unwrap().to_bits()
        );
        assert_eq!(frame.overall_best_angle().to_bits(), frame.overall_best_angle().to_bits());
        assert!(std::ptr::eq(frame.neighbor_graph().unwrap(), frame.neighbor_graph().unwrap()));
        assert!(std::ptr::eq(frame.contact_matrix(), frame.contact_matrix()));
    }

    #[test]
    fn lattice_has_high_hexatic_order() {
        let frame = frame_from(0, &lattice(6, 6), &vec![0.0; 36], 15.0, metadata(1, 1.0));
        let hexatic = frame.hexatic(6).unwrap();
        let graph = frame.neighbor_graph().unwrap();
        // interior sites of a triangular lattice keep their six lattice neighbors
        for r in 1..5 {
            for c in 1..5 {
                let i = r * 6 + c;
                assert_eq!(graph.neighbors(i).len(), 6);
                assert!(hexatic[i] > 0.99);
            }
        }
        for psi in hexatic {
            assert!((0.0..=1.0).contains(&psi));
        }
    }

    #[test]
    fn aligned_frame_is_one_cluster() {
        let points = lattice(4, 5);
        let frame = frame_from(0, &points, &vec![0.8; 20], 15.0, metadata(2, 1.0));
        assert_relative_eq!(frame.expected_cluster_size().unwrap(), 20.0);
        for &s in frame.scalar_order_field().unwrap() {
            assert_relative_eq!(s, 1.0, epsilon = 1e-9);
        }
        assert_relative_eq!(frame.overall_scalar_order(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(frame.overall_best_angle(), 0.8, epsilon = 1e-9);
        assert_relative_eq!(frame.mean_orientation(), 0.8, epsilon = 1e-9);
        assert_relative_eq!(frame.nematic_order_mean_axis(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn degenerate_frame_keeps_scalar_quantities() {
        let frame = frame_from(0, &[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)], &[0.0; 3], 10.0, metadata(1, 1.0));
        assert!(matches!(frame.neighbor_graph(), Err(AnalysisError::DegenerateGeometry(_))));
        assert!(frame.hexatic(6).is_err());
        assert!(frame.expected_cluster_size().is_err());
        assert!(frame.number_density() > 0.0);
        assert_relative_eq!(frame.overall_scalar_order(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn circular_boundary_has_no_ideal_coefficient() {
        let frame = frame_from(0, &lattice(2, 2), &[0.0; 4], 10.0, metadata(1, 1.0));
        assert_eq!(frame.ideal_overall_scalar_coef(), None);
        assert_eq!(frame.overall_scalar_order_normalized(), None);

        let elliptic = frame_from(0, &lattice(2, 2), &[0.0; 4], 10.0, metadata(1, 2.0));
        let coef = elliptic.ideal_overall_scalar_coef().unwrap();
        assert_relative_eq!(coef, 1.5 * 0.5f64.atanh(), epsilon = 1e-12);
    }

    #[test]
    fn spheres_expand_along_director() {
        // m = 3, pitch 1: extent 2 -> two analog spheres at -1 and +1
        let frame = frame_from(0, &[(5.0, 5.0), (0.0, 0.0), (-5.0, 3.0)], &[PI / 2.0, 0.0, 0.0], 10.0, metadata(3, 1.0));
        let spheres = frame.to_spheres();
        assert_eq!(spheres.len(), 6);
        assert_relative_eq!(spheres[0].x, 5.0, epsilon = 1e-12);
        assert_relative_eq!(spheres[0].y, 4.0, epsilon = 1e-12);
        assert_relative_eq!(spheres[1].y, 6.0, epsilon = 1e-12);
        assert_relative_eq!(spheres[2].x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(spheres[3].x, 1.0, epsilon = 1e-12);
        assert!(frame.sphere_bond_order(6).is_ok());
    }

    #[test]
    fn orientation_profile_bins_by_normalized_radius() {
        // tangential rods on a circle of radius 5 inside L = 10: r / L = 0.5 -> bin 2 of 5
        let points: Vec<(f64, f64)> = (0..8)
            .map(|i| {
                let t = i as f64 * PI / 4.0;
                (5.0 * t.cos(), 5.0 * t.sin())
            })
            .collect();
        let thetas: Vec<f64> = (0..8).map(|i| i as f64 * PI / 4.0 + PI / 2.0).collect();
        let frame = frame_from(0, &points, &thetas, 10.0, metadata(1, 1.0));
        let profile = frame.orientation_profile(5);
        assert_eq!(profile[0], None);
        assert_relative_eq!(profile[2].unwrap(), 1.0, epsilon = 1e-12);
        assert!(frame.orientation_profile(0).is_empty());
    }

    #[test]
    fn scale_helpers_use_initial_and_current_boundary() {
        let frame = frame_from(0, &lattice(2, 2), &[0.0; 4], 10.0, metadata(1, 2.0));
        let absolute = frame.absolute_scale(500);
        let relative = frame.relative_scale(500);
        assert_relative_eq!(absolute.rate, 25.0);
        assert_relative_eq!(relative.rate, 50.0);
        assert_eq!(absolute.raster_size(), (2000, 1000));
        assert_eq!(relative.raster_size(), (2000, 1000));
        // the same particle moves toward the center of the absolute raster as L shrinks
        assert_eq!(absolute.scale_position(0.0, 0.0), (1000, 500));
        assert_eq!(relative.scale_position(0.0, 0.0), (1000, 500));
    }

    #[test]
    fn nematic_interpolation_covers_hull() {
        let points = lattice(5, 5);
        let frame = frame_from(0, &points, &vec![0.3; 25], 6.0, metadata(1, 1.0));
        let field = frame.nematic_interpolation(20).unwrap();
        assert_eq!(field.rows(), 20);
        assert_eq!(field.cols(), 20);
        assert!(field.defined_count() > 0);
        for v in field.values.iter().flatten() {
            assert_relative_eq!(*v, 0.3, epsilon = 1e-9);
        }
    }
}
