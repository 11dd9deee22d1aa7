//! Piecewise-linear scattered-data interpolation onto regular grids, used to
//! render smooth director fields.

use packing_common::{wrap_angle, Vec2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Below this embedded norm the folded directors cancel and no angle is defined.
pub const MIN_DIRECTOR_NORM: f64 = 1e-9;

/// `n` evenly spaced samples over `[start, end]`, endpoints included.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| if i == n - 1 { end } else { start + step * i as f64 }).collect()
        }
    }
}

/// A scalar field sampled on a regular `rows x cols` grid, row-major.
/// Nodes outside the convex hull of the data are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridField {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub values: Vec<Option<f64>>,
}

impl GridField {
    pub fn rows(&self) -> usize {
        self.ys.len()
    }

    pub fn cols(&self) -> usize {
        self.xs.len()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.values[row * self.cols() + col]
    }

    pub fn defined_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Index range of the ascending uniform `axis` samples lying in `[lo, hi]`.
fn covered_range(axis: &[f64], lo: f64, hi: f64) -> std::ops::Range<usize> {
    if axis.is_empty() {
        return 0..0;
    }
    let start = axis.partition_point(|&v| v < lo);
    let end = axis.partition_point(|&v| v <= hi);
    start..end.max(start)
}

/// Linear (barycentric) interpolation of several value channels at once over a triangulation.
fn interpolate_channels<const C: usize>(
    points: &[Vec2],
    triangles: &[[usize; 3]],
    values: &[[f64; C]],
    xs: &[f64],
    ys: &[f64],
) -> Vec<Option<[f64; C]>> {
    const EPS: f64 = 1e-12;
    let cols = xs.len();
    let mut grid: Vec<Option<[f64; C]>> = vec![None; xs.len() * ys.len()];

    for &[ia, ib, ic] in triangles {
        let (a, b, c) = (points[ia], points[ib], points[ic]);
        let det = (b - a).cross(c - a);
        if det.abs() < EPS {
            continue;
        }
        let x_range = covered_range(xs, a.x.min(b.x).min(c.x), a.x.max(b.x).max(c.x));
        let y_range = covered_range(ys, a.y.min(b.y).min(c.y), a.y.max(b.y).max(c.y));
        for row in y_range {
            for col in x_range.clone() {
                let slot = &mut grid[row * cols + col];
                if slot.is_some() {
                    continue;
                }
                let p = Vec2::new(xs[col], ys[row]);
                let wb = (p - a).cross(c - a) / det;
                let wc = (b - a).cross(p - a) / det;
                let wa = 1.0 - wb - wc;
                if wa < -EPS || wb < -EPS || wc < -EPS {
                    continue;
                }
                let mut out = [0.0; C];
                for (k, o) in out.iter_mut().enumerate() {
                    *o = wa * values[ia][k] + wb * values[ib][k] + wc * values[ic][k];
                }
                *slot = Some(out);
            }
        }
    }
    grid
}

/// Interpolates one scalar channel onto the grid spanned by `xs` and `ys`.
pub fn interpolate_linear(
    points: &[Vec2],
    triangles: &[[usize; 3]],
    values: &[f64],
    xs: &[f64],
    ys: &[f64],
) -> GridField {
    let channels: Vec<[f64; 1]> = values.iter().map(|&v| [v]).collect();
    let values = interpolate_channels(points, triangles, &channels, xs, ys)
        .into_iter()
        .map(|v| v.map(|[x]| x))
        .collect();
    GridField { xs: xs.to_vec(), ys: ys.to_vec(), values }
}

/// Folded orientation field: each `theta mod (2 pi / fold)` is embedded on the
/// unit circle as `(cos(fold theta), sin(fold theta))`, both components are
/// interpolated, and the angle is recovered as `atan2(v, u) / fold`. Nodes where
/// the interpolated `(u, v)` nearly vanishes have no director and are `None`.
///
/// The grid spans `[-la, la] x [-lb, lb]` with `sz` rows and `round(sz * gamma)` columns.
#[allow(clippy::too_many_arguments)]
pub fn angle_interpolation(
    points: &[Vec2],
    thetas: &[f64],
    triangles: &[[usize; 3]],
    fold: u32,
    la: f64,
    lb: f64,
    gamma: f64,
    sz: usize,
) -> GridField {
    let fold_f = fold as f64;
    let embedded: Vec<[f64; 2]> = thetas
        .iter()
        .map(|&t| {
            let (s, c) = (wrap_angle(t, 2.0 * PI / fold_f) * fold_f).sin_cos();
            [c, s]
        })
        .collect();
    let xs = linspace(-la, la, (sz as f64 * gamma).round() as usize);
    let ys = linspace(-lb, lb, sz);
    let values = interpolate_channels(points, triangles, &embedded, &xs, &ys)
        .into_iter()
        .map(|uv| uv.and_then(|[u, v]| (u.hypot(v) >= MIN_DIRECTOR_NORM).then(|| v.atan2(u) / fold_f)))
        .collect();
    GridField { xs, ys, values }
}
