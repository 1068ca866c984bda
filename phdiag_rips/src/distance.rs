//! Pairwise distances from point clouds, precomputed matrices and weighted graphs.
//!
//! Everything is validated eagerly so that no simplices are built from malformed input.

use std::fmt::Debug;
use std::sync::Arc;

use log::debug;
use ordered_float::NotNan;
use petgraph::{algo::dijkstra, graph::NodeIndex, graph::UnGraph};

use crate::error::{PersistenceError, Result};

pub type DistanceFn = Arc<dyn Fn(&[f64], &[f64]) -> f64 + Send + Sync>;

/// Distance function applied to pairs of points.
#[derive(Clone, Default)]
pub enum Metric {
    #[default]
    Euclidean,
    Manhattan,
    Chebyshev,
    /// `p`-norm distance, `p >= 1`.
    Minkowski(f64),
    /// One minus the cosine similarity; zero vectors are rejected.
    Cosine,
    /// Point clouds are read as square distance matrices.
    Precomputed,
    Custom(DistanceFn),
}

impl Debug for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Euclidean => write!(f, "Euclidean"),
            Self::Manhattan => write!(f, "Manhattan"),
            Self::Chebyshev => write!(f, "Chebyshev"),
            Self::Minkowski(p) => f.debug_tuple("Minkowski").field(p).finish(),
            Self::Cosine => write!(f, "Cosine"),
            Self::Precomputed => write!(f, "Precomputed"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl Metric {
    pub fn custom(distance: impl Fn(&[f64], &[f64]) -> f64 + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(distance))
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Minkowski(p) if !(p.is_finite() && *p >= 1.0) => Err(
                PersistenceError::configuration(format!("Minkowski exponent must be >= 1, got {p}")),
            ),
            _ => Ok(()),
        }
    }

    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        let diffs = a.iter().zip(b).map(|(x, y)| (x - y).abs());
        match self {
            Self::Euclidean => diffs.map(|d| d * d).sum::<f64>().sqrt(),
            Self::Manhattan => diffs.sum(),
            Self::Chebyshev => diffs.fold(0.0, f64::max),
            Self::Minkowski(p) => diffs.map(|d| d.powf(*p)).sum::<f64>().powf(p.recip()),
            Self::Cosine => {
                let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
                let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
                // Clamp rounding error so that identical directions are at distance 0
                (1.0 - dot / (norm_a * norm_b)).max(0.0)
            }
            Self::Precomputed => f64::NAN,
            Self::Custom(distance) => distance(a, b),
        }
    }
}

/// An undirected graph with non-negative edge weights and optional vertex weights.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedGraph {
    pub n_vertices: usize,
    pub edges: Vec<(usize, usize, f64)>,
    /// Filtration values of the vertices, zero if absent.
    pub vertex_weights: Option<Vec<f64>>,
}

impl WeightedGraph {
    pub fn new(n_vertices: usize, edges: Vec<(usize, usize, f64)>) -> Self {
        Self {
            n_vertices,
            edges,
            vertex_weights: None,
        }
    }

    pub fn with_vertex_weights(mut self, weights: Vec<f64>) -> Self {
        self.vertex_weights = Some(weights);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_vertices == 0 {
            return Err(PersistenceError::invalid_input("graph has no vertices"));
        }
        for &(u, v, weight) in &self.edges {
            if u >= self.n_vertices || v >= self.n_vertices {
                return Err(PersistenceError::invalid_input(format!(
                    "edge ({u}, {v}) refers to a vertex outside 0..{}",
                    self.n_vertices
                )));
            }
            if u == v {
                return Err(PersistenceError::invalid_input(format!(
                    "self-loop at vertex {u}"
                )));
            }
            if weight.is_nan() || weight < 0.0 {
                return Err(PersistenceError::invalid_input(format!(
                    "edge ({u}, {v}) has invalid weight {weight}"
                )));
            }
        }
        if let Some(weights) = &self.vertex_weights {
            if weights.len() != self.n_vertices {
                return Err(PersistenceError::invalid_input(format!(
                    "expected {} vertex weights, got {}",
                    self.n_vertices,
                    weights.len()
                )));
            }
            if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
                return Err(PersistenceError::invalid_input(format!(
                    "invalid vertex weight {bad}"
                )));
            }
        }
        Ok(())
    }

    /// Vertex filtration values, validated by [`validate`](Self::validate).
    pub fn vertex_values(&self) -> Vec<NotNan<f64>> {
        match &self.vertex_weights {
            Some(weights) => weights
                .iter()
                .map(|w| NotNan::new(*w).unwrap_or_default())
                .collect(),
            None => vec![NotNan::default(); self.n_vertices],
        }
    }
}

/// One input sample, declaring whether it is already a distance structure.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricInput {
    /// Rows are points, columns are features.
    PointCloud(Vec<Vec<f64>>),
    /// Square, symmetric, non-negative with zero diagonal; `f64::INFINITY` means never connected.
    DistanceMatrix(Vec<Vec<f64>>),
    Graph(WeightedGraph),
}

impl MetricInput {
    pub fn n_points(&self) -> usize {
        match self {
            Self::PointCloud(rows) | Self::DistanceMatrix(rows) => rows.len(),
            Self::Graph(graph) => graph.n_vertices,
        }
    }

    /// Number of features per point, for point clouds that are not read as distance matrices.
    pub fn feature_dimension(&self, metric: &Metric) -> Option<usize> {
        match (self, metric) {
            (Self::PointCloud(_), Metric::Precomputed) => None,
            (Self::PointCloud(rows), _) => rows.first().map(Vec::len),
            _ => None,
        }
    }

    pub fn as_graph(&self) -> Option<&WeightedGraph> {
        match self {
            Self::Graph(graph) => Some(graph),
            _ => None,
        }
    }
}

/// Square matrix of pairwise distances; built once per input and reusable across thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    distances: Vec<Vec<NotNan<f64>>>,
}

fn not_nan(value: f64, what: impl FnOnce() -> String) -> Result<NotNan<f64>> {
    NotNan::new(value).map_err(|_| PersistenceError::invalid_input(what()))
}

impl DistanceMatrix {
    /// Resolve any input into pairwise distances.
    /// Graphs are converted to shortest path lengths.
    pub fn from_input(input: &MetricInput, metric: &Metric) -> Result<Self> {
        match input {
            MetricInput::PointCloud(points) => Self::from_points(points, metric),
            MetricInput::DistanceMatrix(rows) => Self::from_square(rows),
            MetricInput::Graph(graph) => Self::shortest_paths(graph),
        }
    }

    pub fn from_points(points: &[Vec<f64>], metric: &Metric) -> Result<Self> {
        if matches!(metric, Metric::Precomputed) {
            // Rows already hold the distances
            return Self::from_square(points);
        }
        metric.validate()?;
        let Some(first) = points.first() else {
            return Err(PersistenceError::invalid_input("point cloud has no points"));
        };
        let n_features = first.len();
        for (i, point) in points.iter().enumerate() {
            if point.len() != n_features {
                return Err(PersistenceError::invalid_input(format!(
                    "ragged point cloud: point {i} has {} features, expected {n_features}",
                    point.len()
                )));
            }
            if let Some(bad) = point.iter().find(|x| !x.is_finite()) {
                return Err(PersistenceError::invalid_input(format!(
                    "point {i} has non-finite coordinate {bad}"
                )));
            }
        }
        if matches!(metric, Metric::Cosine) && points.iter().any(|p| p.iter().all(|x| *x == 0.0)) {
            return Err(PersistenceError::invalid_input(
                "cosine distance is undefined for the zero vector",
            ));
        }

        let n_points = points.len();
        let zero = NotNan::default();
        let mut distances = vec![vec![zero; n_points]; n_points];
        for i in 0..n_points {
            for j in (i + 1)..n_points {
                let d = metric.distance(&points[i], &points[j]);
                let d = not_nan(d, || format!("distance between points {i} and {j} is NaN"))?;
                if d < zero {
                    return Err(PersistenceError::invalid_input(format!(
                        "distance between points {i} and {j} is negative"
                    )));
                }
                distances[i][j] = d;
                distances[j][i] = d;
            }
        }
        debug!("Computed {n_points}x{n_points} distances with {metric:?}");
        Ok(Self { distances })
    }

    pub fn from_square(rows: &[Vec<f64>]) -> Result<Self> {
        let n_points = rows.len();
        if n_points == 0 {
            return Err(PersistenceError::invalid_input("distance matrix is empty"));
        }
        let mut distances = Vec::with_capacity(n_points);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_points {
                return Err(PersistenceError::invalid_input(format!(
                    "distance matrix is not square: row {i} has {} entries, expected {n_points}",
                    row.len()
                )));
            }
            let row = row
                .iter()
                .enumerate()
                .map(|(j, d)| not_nan(*d, || format!("distance ({i}, {j}) is NaN")))
                .collect::<Result<Vec<_>>>()?;
            distances.push(row);
        }
        for i in 0..n_points {
            if distances[i][i].into_inner() != 0.0 {
                return Err(PersistenceError::invalid_input(format!(
                    "distance matrix has non-zero diagonal entry at {i}"
                )));
            }
            for j in 0..i {
                if distances[i][j].into_inner() < 0.0 {
                    return Err(PersistenceError::invalid_input(format!(
                        "distance ({i}, {j}) is negative"
                    )));
                }
                if distances[i][j] != distances[j][i] {
                    return Err(PersistenceError::invalid_input(format!(
                        "distance matrix is not symmetric at ({i}, {j})"
                    )));
                }
            }
        }
        Ok(Self { distances })
    }

    /// Shortest path lengths between all pairs of vertices; disconnected pairs are infinitely far apart.
    pub fn shortest_paths(graph: &WeightedGraph) -> Result<Self> {
        graph.validate()?;
        let n_vertices = graph.n_vertices;
        let mut g = UnGraph::<(), f64>::with_capacity(n_vertices, graph.edges.len());
        for _ in 0..n_vertices {
            g.add_node(());
        }
        for &(u, v, weight) in &graph.edges {
            g.add_edge(NodeIndex::new(u), NodeIndex::new(v), weight);
        }

        let infinity = NotNan::new(f64::INFINITY).unwrap_or_default();
        let mut distances = Vec::with_capacity(n_vertices);
        for i in 0..n_vertices {
            let sp_lengths = dijkstra(&g, NodeIndex::new(i), None, |e| *e.weight());
            distances.push(
                (0..n_vertices)
                    .map(|j| {
                        if i == j {
                            return Ok(NotNan::default());
                        }
                        match sp_lengths.get(&NodeIndex::new(j)) {
                            Some(length) => {
                                not_nan(*length, || format!("path from {i} to {j} is NaN"))
                            }
                            None => Ok(infinity),
                        }
                    })
                    .collect::<Result<Vec<_>>>()?,
            );
        }
        debug!(
            "Computed shortest paths on graph with {n_vertices} vertices and {} edges",
            graph.edges.len()
        );
        Ok(Self { distances })
    }

    pub fn n_points(&self) -> usize {
        self.distances.len()
    }

    pub fn get(&self, i: usize, j: usize) -> NotNan<f64> {
        self.distances[i][j]
    }

    pub fn row(&self, i: usize) -> &[NotNan<f64>] {
        &self.distances[i]
    }

    /// Largest finite distance, or `None` if there are no finite off-diagonal entries.
    pub fn max_finite(&self) -> Option<NotNan<f64>> {
        self.distances
            .iter()
            .enumerate()
            .flat_map(|(i, row)| row.iter().enumerate().filter(move |(j, _)| *j != i))
            .map(|(_, d)| *d)
            .filter(|d| d.is_finite())
            .max()
    }
}

/// All point clouds in a batch must share a feature dimension.
pub fn check_feature_dimensions(inputs: &[MetricInput], metric: &Metric) -> Result<()> {
    let mut expected: Option<(usize, usize)> = None;
    for (index, input) in inputs.iter().enumerate() {
        let Some(n_features) = input.feature_dimension(metric) else {
            continue;
        };
        match expected {
            None => expected = Some((index, n_features)),
            Some((first, first_features)) if first_features != n_features => {
                return Err(PersistenceError::invalid_input(format!(
                    "input {index} has {n_features} features but input {first} has {first_features}"
                ))
                .at_index(index));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{check_feature_dimensions, DistanceMatrix, Metric, MetricInput, WeightedGraph};
    use crate::error::PersistenceError;

    fn unit_square() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 1.0],
        ]
    }

    #[test]
    fn test_metrics() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        assert_eq!(Metric::Euclidean.distance(&a, &b), 5.0);
        assert_eq!(Metric::Manhattan.distance(&a, &b), 7.0);
        assert_eq!(Metric::Chebyshev.distance(&a, &b), 4.0);
        assert!((Metric::Minkowski(2.0).distance(&a, &b) - 5.0).abs() < 1e-12);
        assert!(Metric::Cosine.distance(&[1.0, 0.0], &[2.0, 0.0]).abs() < 1e-12);
        assert!((Metric::Cosine.distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-12);
        let custom = Metric::custom(|x, y| (x[0] - y[0]).abs());
        assert_eq!(custom.distance(&a, &b), 3.0);
        assert!(Metric::Minkowski(0.5).validate().is_err());
    }

    #[test]
    fn test_point_cloud_distances() {
        let distances = DistanceMatrix::from_points(&unit_square(), &Metric::Euclidean).unwrap();
        assert_eq!(distances.n_points(), 4);
        assert_eq!(distances.get(0, 1).into_inner(), 1.0);
        assert_eq!(distances.get(0, 2).into_inner(), 2.0_f64.sqrt());
        assert_eq!(distances.get(2, 0), distances.get(0, 2));
        assert_eq!(distances.max_finite().unwrap().into_inner(), 2.0_f64.sqrt());
    }

    #[test]
    fn test_invalid_point_clouds() {
        let ragged = vec![vec![0.0, 1.0], vec![1.0]];
        assert!(matches!(
            DistanceMatrix::from_points(&ragged, &Metric::Euclidean),
            Err(PersistenceError::InvalidInput { .. })
        ));
        let nan = vec![vec![0.0], vec![f64::NAN]];
        assert!(DistanceMatrix::from_points(&nan, &Metric::Euclidean).is_err());
        assert!(DistanceMatrix::from_points(&[], &Metric::Euclidean).is_err());
        let negative = Metric::custom(|_, _| -1.0);
        assert!(DistanceMatrix::from_points(&unit_square(), &negative).is_err());
    }

    #[test]
    fn test_square_validation() {
        let good = vec![vec![0.0, 2.0], vec![2.0, 0.0]];
        assert!(DistanceMatrix::from_square(&good).is_ok());
        let asymmetric = vec![vec![0.0, 2.0], vec![1.0, 0.0]];
        assert!(DistanceMatrix::from_square(&asymmetric).is_err());
        let diagonal = vec![vec![1.0, 2.0], vec![2.0, 0.0]];
        assert!(DistanceMatrix::from_square(&diagonal).is_err());
        let not_square = vec![vec![0.0, 2.0, 1.0], vec![2.0, 0.0, 1.0]];
        assert!(DistanceMatrix::from_square(&not_square).is_err());
        let disconnected = vec![vec![0.0, f64::INFINITY], vec![f64::INFINITY, 0.0]];
        let distances = DistanceMatrix::from_square(&disconnected).unwrap();
        assert!(distances.max_finite().is_none());
        // Precomputed metric reads point clouds as distance matrices
        let input = MetricInput::PointCloud(good);
        assert!(DistanceMatrix::from_input(&input, &Metric::Precomputed).is_ok());
    }

    #[test]
    fn test_precomputed_points_are_read_as_distances() {
        let rows = vec![
            vec![0.0, 3.0, 4.0],
            vec![3.0, 0.0, 5.0],
            vec![4.0, 5.0, 0.0],
        ];
        let distances = DistanceMatrix::from_points(&rows, &Metric::Precomputed).unwrap();
        assert_eq!(distances.n_points(), 3);
        assert_eq!(distances.get(0, 2).into_inner(), 4.0);
        assert_eq!(distances.get(2, 1).into_inner(), 5.0);

        // Two points in the plane are not a square matrix
        let points = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![2.0, 2.0]];
        let result = DistanceMatrix::from_points(&points, &Metric::Precomputed);
        let Err(PersistenceError::InvalidInput { reason }) = result else {
            panic!("expected a shape error");
        };
        assert!(!reason.contains("NaN"));
    }

    #[test]
    fn test_graph_shortest_paths() {
        let graph = WeightedGraph::new(4, vec![(0, 1, 1.0), (1, 2, 2.0), (0, 2, 5.0)]);
        let distances = DistanceMatrix::shortest_paths(&graph).unwrap();
        assert_eq!(distances.get(0, 2).into_inner(), 3.0);
        assert_eq!(distances.get(2, 0).into_inner(), 3.0);
        assert!(distances.get(0, 3).is_infinite());

        let self_loop = WeightedGraph::new(2, vec![(1, 1, 1.0)]);
        assert!(DistanceMatrix::shortest_paths(&self_loop).is_err());
        let negative = WeightedGraph::new(2, vec![(0, 1, -1.0)]);
        assert!(negative.validate().is_err());
        let out_of_range = WeightedGraph::new(2, vec![(0, 2, 1.0)]);
        assert!(out_of_range.validate().is_err());
        let bad_weights = WeightedGraph::new(2, vec![]).with_vertex_weights(vec![0.0]);
        assert!(bad_weights.validate().is_err());
    }

    #[test]
    fn test_feature_dimensions_must_agree() {
        let inputs = vec![
            MetricInput::PointCloud(vec![vec![0.0, 0.0]]),
            MetricInput::DistanceMatrix(vec![vec![0.0]]),
            MetricInput::PointCloud(vec![vec![0.0, 0.0, 0.0]]),
        ];
        let err = check_feature_dimensions(&inputs, &Metric::Euclidean).unwrap_err();
        assert_eq!(err.index(), Some(2));
        assert!(check_feature_dimensions(&inputs[..2], &Metric::Euclidean).is_ok());
    }
}
