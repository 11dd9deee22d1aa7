//! Per-run curves built from an ordered frame sequence.

use log::warn;
use packing_common::{AnalysisResult, FrameSummary};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::frame::{Frame, ANGLE_DIST_BINS};

/// Prefix of `items` strictly before the first element whose density exceeds
/// `max_density`. The whole slice when nothing exceeds it.
pub fn up_to<T>(items: &[T], max_density: f64, density: impl Fn(&T) -> f64) -> &[T] {
    let end = items
        .iter()
        .position(|item| density(item) > max_density)
        .unwrap_or(items.len());
    &items[..end]
}

/// [`up_to`] over frames, keyed by ideal packing density.
pub fn frames_up_to(frames: &[Frame], max_density: f64) -> &[Frame] {
    up_to(frames, max_density, Frame::ideal_packing_density)
}

pub fn ideal_density_curve(frames: &[Frame]) -> Vec<f64> {
    frames.iter().map(Frame::ideal_packing_density).collect()
}

pub fn energy_curve(frames: &[Frame]) -> Vec<f64> {
    frames.iter().map(|f| f.energy).collect()
}

pub fn bond_order_curve(frames: &[Frame], k: u32) -> AnalysisResult<Vec<f64>> {
    frames.iter().map(|f| f.average_bond_order(k)).collect()
}

pub fn square_order_curve(frames: &[Frame], k: u32) -> Vec<f64> {
    frames.iter().map(|f| f.average_square_order(k)).collect()
}

pub fn scalar_order_curve(frames: &[Frame]) -> AnalysisResult<Vec<f64>> {
    frames.iter().map(Frame::average_scalar_order).collect()
}

pub fn cluster_size_curve(frames: &[Frame]) -> AnalysisResult<Vec<f64>> {
    frames.iter().map(Frame::expected_cluster_size).collect()
}

/// Energy curve relative to its first sample, `e / e0 - 1`.
/// `None` for curves shorter than two samples or starting at zero.
pub fn relative_energy(curve: &[f64]) -> Option<Vec<f64>> {
    if curve.len() < 2 {
        return None;
    }
    let e0 = curve[0];
    if e0 == 0.0 {
        warn!("Energy curve starts at zero; skipping it in the energy split.");
        return None;
    }
    Some(curve.iter().map(|e| e / e0 - 1.0).collect())
}

/// [`relative_energy`] of every usable curve; unusable curves are skipped.
pub fn energy_split(curves: &[Vec<f64>]) -> Vec<Vec<f64>> {
    curves.iter().filter_map(|curve| relative_energy(curve)).collect()
}

/// `ANGLE_DIST_BINS x F` matrix: column `i` is the orientation histogram of the `i`-th frame.
pub fn angle_distribution_matrix<'a>(frames: impl IntoIterator<Item = &'a Frame>) -> Vec<Vec<u32>> {
    let columns: Vec<Vec<u32>> = frames.into_iter().map(Frame::angle_distribution).collect();
    let mut matrix = vec![vec![0u32; columns.len()]; ANGLE_DIST_BINS];
    for (col, histogram) in columns.into_iter().enumerate() {
        for (row, count) in histogram.into_iter().enumerate() {
            matrix[row][col] = count;
        }
    }
    matrix
}

/// Pearson correlation coefficient. `None` for mismatched or too-short inputs
/// and for a curve with zero variance.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (&x, &y) in a.iter().zip(b) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return None;
    }
    Some((cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0))
}

/// Frame-indexed curves of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunCurves {
    pub frame_ids: Vec<i64>,
    pub ideal_density: Vec<f64>,
    pub number_density: Vec<f64>,
    pub energy: Vec<f64>,
    /// One curve per configured bond order `k`.
    pub bond_orders: Vec<(u32, Vec<f64>)>,
    pub square_order: Vec<f64>,
    pub scalar_order: Vec<f64>,
    pub overall_scalar_order: Vec<f64>,
    pub overall_scalar_order_normalized: Vec<Option<f64>>,
    pub overall_best_angle: Vec<f64>,
    pub cluster_size: Vec<f64>,
    /// Expected cluster size divided by the particle count.
    pub cluster_fraction: Vec<f64>,
    pub mean_coordination: Vec<f64>,
}

impl RunCurves {
    pub fn from_summaries(summaries: &[FrameSummary]) -> Self {
        let mut curves = RunCurves::default();
        let orders: Vec<u32> = summaries
            .first()
            .map(|s| s.bond_order_averages.iter().map(|&(k, _)| k).collect())
            .unwrap_or_default();
        curves.bond_orders = orders.iter().map(|&k| (k, Vec::with_capacity(summaries.len()))).collect();

        for s in summaries {
            curves.frame_ids.push(s.id);
            curves.ideal_density.push(s.ideal_packing_density);
            curves.number_density.push(s.number_density);
            curves.energy.push(s.energy);
            for (k, curve) in curves.bond_orders.iter_mut() {
                curve.push(s.bond_order(*k).unwrap_or(0.0));
            }
            curves.square_order.push(s.square_order_average);
            curves.scalar_order.push(s.scalar_order_average);
            curves.overall_scalar_order.push(s.overall_scalar_order);
            curves.overall_scalar_order_normalized.push(s.overall_scalar_order_normalized);
            curves.overall_best_angle.push(s.overall_best_angle);
            curves.cluster_size.push(s.expected_cluster_size);
            let fraction = if s.particle_count > 0 {
                s.expected_cluster_size / s.particle_count as f64
            } else {
                0.0
            };
            curves.cluster_fraction.push(fraction);
            curves.mean_coordination.push(s.mean_coordination);
        }
        curves
    }

    pub fn len(&self) -> usize {
        self.frame_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame_ids.is_empty()
    }

    /// Correlation between the square-phase order and the local scalar order.
    pub fn square_scalar_correlation(&self) -> Option<f64> {
        pearson(&self.square_order, &self.scalar_order)
    }

    /// Writes one CSV row per frame. Undefined normalized values are left empty.
    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        let mut header: Vec<String> = ["id", "ideal_density", "number_density", "energy"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        header.extend(self.bond_orders.iter().map(|(k, _)| format!("psi_{}", k)));
        header.extend(
            [
                "square_order",
                "scalar_order",
                "overall_scalar_order",
                "overall_scalar_order_normalized",
                "overall_best_angle",
                "cluster_size",
                "cluster_fraction",
                "mean_coordination",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        wtr.write_record(&header)?;

        for i in 0..self.len() {
            let mut row = vec![
                self.frame_ids[i].to_string(),
                format!("{:.6}", self.ideal_density[i]),
                format!("{:.6}", self.number_density[i]),
                format!("{:.6}", self.energy[i]),
            ];
            row.extend(self.bond_orders.iter().map(|(_, c)| format!("{:.6}", c[i])));
            row.push(format!("{:.6}", self.square_order[i]));
            row.push(format!("{:.6}", self.scalar_order[i]));
            row.push(format!("{:.6}", self.overall_scalar_order[i]));
            row.push(
                self.overall_scalar_order_normalized[i]
                    .map(|v| format!("{:.6}", v))
                    .unwrap_or_default(),
            );
            row.push(format!("{:.6}", self.overall_best_angle[i]));
            row.push(format!("{:.6}", self.cluster_size[i]));
            row.push(format!("{:.6}", self.cluster_fraction[i]));
            row.push(format!("{:.6}", self.mean_coordination[i]));
            wtr.write_record(&row)?;
        }
        wtr.flush()?;
        Ok(())
    }
}
