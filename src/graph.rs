use delaunator::{triangulate, Point};
use log::warn;
use packing_common::{AnalysisError, AnalysisResult, CoordinationHistogram, Vec2};

/// Neighbor graph derived from a Delaunay triangulation of particle centers.
///
/// Each triangle corner only registers one direction of its edge, so boundary
/// edges (a single incident triangle) would otherwise be one-sided. The
/// adjacency is therefore symmetrized and deduplicated on construction:
/// `j` in `neighbors(i)` iff `i` in `neighbors(j)`.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborGraph {
    adjacency: Vec<Vec<usize>>,
    triangles: Vec<[usize; 3]>,
}

/// Triangulates `points`, failing on fewer than three points or fully collinear input.
pub fn delaunay_triangles(points: &[Vec2]) -> AnalysisResult<Vec<[usize; 3]>> {
    if points.len() < 3 {
        return Err(AnalysisError::degenerate(format!(
            "triangulation needs at least 3 points, got {}",
            points.len()
        )));
    }
    let sites: Vec<Point> = points.iter().map(|p| Point { x: p.x, y: p.y }).collect();
    let triangulation = triangulate(&sites);
    if triangulation.triangles.is_empty() {
        return Err(AnalysisError::degenerate(format!(
            "all {} points are collinear",
            points.len()
        )));
    }
    Ok(triangulation
        .triangles
        .chunks_exact(3)
        .map(|t| [t[0], t[1], t[2]])
        .collect())
}

impl NeighborGraph {
    /// Builds the Delaunay neighbor graph of `points`.
    ///
    /// Every point must belong to at least one triangle; a point left out of the
    /// triangulation (for example an exact duplicate position) is a degenerate input.
    pub fn delaunay(points: &[Vec2]) -> AnalysisResult<Self> {
        let triangles = delaunay_triangles(points)?;
        let graph = Self::from_triangles(points.len(), triangles);
        if let Some(isolated) = graph.adjacency.iter().position(|adj| adj.is_empty()) {
            return Err(AnalysisError::degenerate(format!(
                "particle {} at ({:.4}, {:.4}) is not part of the triangulation",
                isolated, points[isolated].x, points[isolated].y
            )));
        }
        Ok(graph)
    }

    /// Builds a symmetric graph from triangle triplets over `n` nodes.
    pub fn from_triangles(n: usize, triangles: Vec<[usize; 3]>) -> Self {
        let mut adjacency = vec![Vec::new(); n];
        for &[a, b, c] in &triangles {
            for (u, v) in [(a, b), (b, c), (c, a)] {
                adjacency[u].push(v);
                adjacency[v].push(u);
            }
        }
        for adj in adjacency.iter_mut() {
            adj.sort_unstable();
            adj.dedup();
        }
        NeighborGraph { adjacency, triangles }
    }

    /// Builds a graph from explicit neighbor lists, symmetrizing them.
    pub fn from_adjacency(lists: &[Vec<usize>]) -> Self {
        let n = lists.len();
        let mut adjacency = vec![Vec::new(); n];
        for (i, list) in lists.iter().enumerate() {
            for &j in list {
                if i != j {
                    adjacency[i].push(j);
                    adjacency[j].push(i);
                }
            }
        }
        for adj in adjacency.iter_mut() {
            adj.sort_unstable();
            adj.dedup();
        }
        NeighborGraph { adjacency, triangles: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.adjacency[i]
    }

    pub fn adjacency(&self) -> &[Vec<usize>] {
        &self.adjacency
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// Each undirected edge once, as `(i, j)` with `i < j`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.adjacency
            .iter()
            .enumerate()
            .flat_map(|(i, adj)| adj.iter().filter(move |&&j| j > i).map(move |&j| (i, j)))
    }

    pub fn edge_count(&self) -> usize {
        self.edges().count()
    }

    /// Coordination number `z(i)` of every node.
    pub fn coordination_numbers(&self) -> Vec<usize> {
        self.adjacency.iter().map(Vec::len).collect()
    }

    pub fn mean_coordination(&self) -> f64 {
        if self.adjacency.is_empty() {
            return 0.0;
        }
        2.0 * self.edge_count() as f64 / self.adjacency.len() as f64
    }

    /// Coordination histogram binned by `z - 3`.
    pub fn coordination_histogram(&self) -> CoordinationHistogram {
        let hist = CoordinationHistogram::from_coordination(&self.coordination_numbers());
        if hist.under_constrained > 0 {
            warn!(
                "{} particles have fewer than 3 Delaunay neighbors; counted as under-constrained.",
                hist.under_constrained
            );
        }
        hist
    }

    pub fn is_symmetric(&self) -> bool {
        self.adjacency
            .iter()
            .enumerate()
            .all(|(i, adj)| adj.iter().all(|&j| self.adjacency[j].binary_search(&i).is_ok()))
    }
}
