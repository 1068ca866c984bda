//! Filtered clique complexes.
//!
//! Every filtration is built in two steps.
//! First a [`Neighbourhood`] graph is formed, holding only the edges that enter below the threshold.
//! Then [`enumerate_cliques`] expands the graph into all cliques up to the requested dimension, ordered by
//! filtration value with the colexicographic [`SimplexIndex`] as tie-break.
//! A clique enters at the largest value among its vertices and edges, so every simplex enters no earlier than its faces.

use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use ordered_float::NotNan;
use phdiag::matrices::{ColBasis, SplitByDimension};

use crate::{
    distance::{DistanceMatrix, WeightedGraph},
    error::{PersistenceError, Result},
    simplex::{Binomials, SimplexIndex},
};

/// How simplices and their filtration values are derived from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FiltrationKind {
    /// Vietoris-Rips: every clique of the threshold graph, valued by its longest edge.
    #[default]
    Rips,
    /// Rips restricted to the symmetrised `n_neighbours`-nearest-neighbour graph.
    SparseRips { n_neighbours: usize },
    /// Edges of the input graph valued by their weight, optionally expanded to cliques.
    WeightedGraph { expand_cliques: bool },
}

/// Threshold graph with vertex filtration values and sorted adjacency lists.
#[derive(Debug, Clone)]
pub struct Neighbourhood {
    // None when the vertex enters after the threshold
    vertex_values: Vec<Option<NotNan<f64>>>,
    // Sorted by neighbour, at most one entry per neighbour
    adjacency: Vec<Vec<(usize, NotNan<f64>)>>,
}

impl Neighbourhood {
    fn from_edges(
        vertex_values: Vec<NotNan<f64>>,
        edges: impl Iterator<Item = (usize, usize, NotNan<f64>)>,
        threshold: Option<NotNan<f64>>,
    ) -> Self {
        let below = |value: NotNan<f64>| value.is_finite() && threshold.map_or(true, |t| value <= t);
        let vertex_values: Vec<_> = vertex_values
            .into_iter()
            .map(|value| Some(value).filter(|v| below(*v)))
            .collect();
        let mut adjacency = vec![vec![]; vertex_values.len()];
        for (u, v, weight) in edges {
            let (Some(u_value), Some(v_value)) = (vertex_values[u], vertex_values[v]) else {
                continue;
            };
            let value = weight.max(u_value).max(v_value);
            if below(value) {
                adjacency[u].push((v, value));
                adjacency[v].push((u, value));
            }
        }
        for neighbours in adjacency.iter_mut() {
            // Parallel edges keep their smallest value
            neighbours.sort_unstable();
            neighbours.dedup_by_key(|(neighbour, _)| *neighbour);
        }
        Self {
            vertex_values,
            adjacency,
        }
    }

    /// All pairs at finite distance below the threshold.
    pub fn rips(
        distances: &DistanceMatrix,
        vertex_values: Option<Vec<NotNan<f64>>>,
        threshold: Option<NotNan<f64>>,
    ) -> Self {
        let n_points = distances.n_points();
        let vertex_values = vertex_values.unwrap_or_else(|| vec![NotNan::default(); n_points]);
        let edges = (0..n_points)
            .flat_map(|i| ((i + 1)..n_points).map(move |j| (i, j)))
            .map(|(i, j)| (i, j, distances.get(i, j)));
        Self::from_edges(vertex_values, edges, threshold)
    }

    /// Each point connected to its `n_neighbours` closest points (ties broken by index), symmetrised.
    pub fn sparse_rips(
        distances: &DistanceMatrix,
        vertex_values: Option<Vec<NotNan<f64>>>,
        threshold: Option<NotNan<f64>>,
        n_neighbours: usize,
    ) -> Self {
        let n_points = distances.n_points();
        let vertex_values = vertex_values.unwrap_or_else(|| vec![NotNan::default(); n_points]);
        let mut edges = Vec::with_capacity(n_points * n_neighbours);
        for i in 0..n_points {
            let mut nearest: Vec<(NotNan<f64>, usize)> = distances
                .row(i)
                .iter()
                .enumerate()
                .filter(|(j, d)| *j != i && d.is_finite())
                .map(|(j, d)| (*d, j))
                .collect();
            nearest.sort_unstable();
            edges.extend(
                nearest
                    .into_iter()
                    .take(n_neighbours)
                    .map(|(d, j)| (i.min(j), i.max(j), d)),
            );
        }
        Self::from_edges(vertex_values, edges.into_iter(), threshold)
    }

    /// The edges of the graph itself, each entering no earlier than its endpoints.
    pub fn graph(graph: &WeightedGraph, threshold: Option<NotNan<f64>>) -> Result<Self> {
        graph.validate()?;
        let edges = graph
            .edges
            .iter()
            .map(|&(u, v, weight)| {
                NotNan::new(weight)
                    .map(|weight| (u, v, weight))
                    .map_err(|_| PersistenceError::invalid_input(format!("edge ({u}, {v}) is NaN")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_edges(
            graph.vertex_values(),
            edges.into_iter(),
            threshold,
        ))
    }

    pub fn n_vertices(&self) -> usize {
        self.vertex_values.len()
    }

    pub fn n_edges(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    pub fn vertex_value(&self, vertex: usize) -> Option<NotNan<f64>> {
        self.vertex_values.get(vertex).copied().flatten()
    }

    pub fn neighbours(&self, vertex: usize) -> &[(usize, NotNan<f64>)] {
        &self.adjacency[vertex]
    }

    pub fn edge_value(&self, u: usize, v: usize) -> Option<NotNan<f64>> {
        let neighbours = self.adjacency.get(u)?;
        neighbours
            .binary_search_by_key(&v, |(neighbour, _)| *neighbour)
            .ok()
            .map(|position| neighbours[position].1)
    }

    /// Filtration value of a clique, or `None` if it is not in the complex.
    pub fn simplex_value(&self, vertices: &[usize]) -> Option<NotNan<f64>> {
        match vertices {
            [] => None,
            [v] => self.vertex_value(*v),
            _ => {
                let mut value: NotNan<f64> = NotNan::default();
                for (i, &u) in vertices.iter().enumerate() {
                    for &v in &vertices[(i + 1)..] {
                        value = value.max(self.edge_value(u, v)?);
                    }
                }
                Some(value)
            }
        }
    }
}

// ======== Bases ==============================================

/// Simplices of one dimension, sorted by filtration value and then by index.
#[derive(Debug, Clone, Default)]
pub struct SingleDimBasis(Vec<(NotNan<f64>, SimplexIndex)>);

impl ColBasis for SingleDimBasis {
    type ElemT = SimplexIndex;

    fn element(&self, index: usize) -> Self::ElemT {
        self.0[index].1
    }

    fn size(&self) -> usize {
        self.0.len()
    }
}

impl SingleDimBasis {
    pub fn iter(&self) -> impl Iterator<Item = (NotNan<f64>, SimplexIndex)> + '_ {
        self.0.iter().copied()
    }
}

/// Every simplex of the filtered complex, one sub-basis per dimension in increasing dimension.
#[derive(Debug, Clone)]
pub struct FilteredBasis(Vec<SingleDimBasis>);

impl ColBasis for FilteredBasis {
    type ElemT = SimplexIndex;

    fn element(&self, index: usize) -> Self::ElemT {
        let mut working = index;
        let mut dim = 0;
        while working >= self.0[dim].size() {
            working -= self.0[dim].size();
            dim += 1;
        }
        self.0[dim].element(working)
    }

    fn size(&self) -> usize {
        self.0.iter().map(|basis| basis.size()).sum()
    }
}

impl SplitByDimension for FilteredBasis {
    type SubBasisT = SingleDimBasis;

    fn n_dimensions(&self) -> usize {
        self.0.len()
    }

    fn in_dimension(&self, dimension: usize) -> &Self::SubBasisT {
        &self.0[dimension]
    }
}

impl FilteredBasis {
    /// Number of simplices in each dimension.
    pub fn sizes(&self) -> Vec<usize> {
        self.0.iter().map(ColBasis::size).collect()
    }

    pub fn max_dimension(&self) -> usize {
        self.0.len().saturating_sub(1)
    }
}

// ======== Clique enumeration =================================

struct CliqueEnumerator<'a> {
    neighbourhood: &'a Neighbourhood,
    binomials: &'a Binomials,
    max_dimension: usize,
    budget: Option<usize>,
    n_simplices: usize,
    simplex: Vec<usize>,
    bases: Vec<Vec<(NotNan<f64>, SimplexIndex)>>,
}

impl<'a> CliqueEnumerator<'a> {
    fn insert(&mut self, value: NotNan<f64>) -> Result<()> {
        self.n_simplices += 1;
        if let Some(budget) = self.budget {
            if self.n_simplices > budget {
                return Err(PersistenceError::OutOfMemory {
                    simplices: self.n_simplices,
                    budget,
                });
            }
        }
        let dimension = self.simplex.len() - 1;
        let index = self.binomials.encode(&self.simplex).ok_or_else(|| {
            PersistenceError::DimensionExceeded {
                dimension,
                reason: format!(
                    "simplex cannot be indexed among {} points",
                    self.binomials.n_points()
                ),
            }
        })?;
        self.bases[dimension].push((value, index));
        Ok(())
    }

    /// Neighbours common to every vertex of the current simplex and to `vertex`, valued by their longest edge into it.
    fn common_neighbours(
        &self,
        candidates: &[(usize, NotNan<f64>)],
        vertex: usize,
    ) -> Vec<(usize, NotNan<f64>)> {
        let neighbours = self.neighbourhood.neighbours(vertex);
        let mut output = Vec::with_capacity(candidates.len().min(neighbours.len()));
        let (mut i, mut j) = (0, 0);
        while i < candidates.len() && j < neighbours.len() {
            let (candidate, candidate_value) = candidates[i];
            let (neighbour, edge_value) = neighbours[j];
            if candidate < neighbour {
                i += 1;
            } else if neighbour < candidate {
                j += 1;
            } else {
                output.push((candidate, candidate_value.max(edge_value)));
                i += 1;
                j += 1;
            }
        }
        output
    }

    /// `candidates` are the vertices above the current simplex that are adjacent to all of it.
    fn add_cofacets(
        &mut self,
        value: NotNan<f64>,
        candidates: &[(usize, NotNan<f64>)],
    ) -> Result<()> {
        let new_dimension = self.simplex.len();
        for (position, &(vertex, vertex_value)) in candidates.iter().enumerate() {
            let new_value = value.max(vertex_value);
            self.simplex.push(vertex);
            self.insert(new_value)?;
            if new_dimension < self.max_dimension {
                let next = self.common_neighbours(&candidates[(position + 1)..], vertex);
                if !next.is_empty() {
                    self.add_cofacets(new_value, &next)?;
                }
            }
            self.simplex.pop();
        }
        Ok(())
    }
}

/// Expand the neighbourhood graph into all cliques with at most `max_dimension + 1` vertices.
/// The enumeration stops early with [`PersistenceError::Cancelled`] once `interrupt` is raised.
pub fn enumerate_cliques(
    neighbourhood: &Neighbourhood,
    binomials: &Binomials,
    max_dimension: usize,
    max_simplices: Option<usize>,
    interrupt: &AtomicBool,
) -> Result<FilteredBasis> {
    let mut enumerator = CliqueEnumerator {
        neighbourhood,
        binomials,
        max_dimension,
        budget: max_simplices,
        n_simplices: 0,
        simplex: Vec::with_capacity(max_dimension + 1),
        bases: vec![vec![]; max_dimension + 1],
    };

    for vertex in 0..neighbourhood.n_vertices() {
        if interrupt.load(Ordering::Relaxed) {
            return Err(PersistenceError::Cancelled);
        }
        let Some(value) = neighbourhood.vertex_value(vertex) else {
            continue;
        };
        enumerator.simplex.push(vertex);
        enumerator.insert(value)?;
        if max_dimension > 0 {
            let above: Vec<_> = neighbourhood
                .neighbours(vertex)
                .iter()
                .copied()
                .filter(|(neighbour, _)| *neighbour > vertex)
                .collect();
            enumerator.add_cofacets(value, &above)?;
        }
        enumerator.simplex.pop();
    }

    let bases: Vec<SingleDimBasis> = enumerator
        .bases
        .into_iter()
        .map(|mut basis| {
            // Sort by filtration value then index
            basis.sort_unstable();
            SingleDimBasis(basis)
        })
        .collect();
    debug!(
        "Enumerated {} simplices up to dimension {max_dimension}: {:?}",
        enumerator.n_simplices,
        bases.iter().map(ColBasis::size).collect::<Vec<_>>()
    );
    Ok(FilteredBasis(bases))
}
