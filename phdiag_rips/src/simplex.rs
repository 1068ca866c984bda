//! Indexing simplices with the combinatorial number system.
//!
//! A `d`-simplex with vertices `v_0 < v_1 < ... < v_d` is stored as the single integer
//! `C(v_0, 1) + C(v_1, 2) + ... + C(v_d, d + 1)`.
//! Within a dimension this numbering is a bijection onto `0..C(n_points, d + 1)` and orders simplices
//! colexicographically, i.e. by largest vertex first.
//! This is the tie-break rule used between simplices that enter the filtration at the same value.

use phdiag::matrices::BasisElement;

use crate::error::{PersistenceError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimplexIndex {
    dimension: usize,
    index: u64,
}

impl BasisElement for SimplexIndex {}

impl SimplexIndex {
    pub fn vertex(vertex: usize) -> Self {
        Self {
            dimension: 0,
            index: vertex as u64,
        }
    }

    pub fn dimension(self) -> usize {
        self.dimension
    }

    pub fn index(self) -> u64 {
        self.index
    }
}

/// Table of binomial coefficients `C(n, k)` for `n <= n_points` and `k <= max_vertices`.
/// Construction fails if any entry overflows, which bounds every index we can encode.
#[derive(Debug, Clone)]
pub struct Binomials {
    n_points: usize,
    // table[k][n] = C(n, k)
    table: Vec<Vec<u64>>,
}

impl Binomials {
    /// Prepare to index simplices with up to `max_vertices` vertices drawn from `n_points` points.
    pub fn new(n_points: usize, max_vertices: usize) -> Option<Self> {
        let mut table = vec![vec![0_u64; n_points + 1]; max_vertices + 1];
        for n in 0..=n_points {
            table[0][n] = 1;
        }
        for k in 1..=max_vertices {
            for n in 1..=n_points {
                table[k][n] = table[k - 1][n - 1].checked_add(table[k][n - 1])?;
            }
        }
        Some(Self { n_points, table })
    }

    /// As [`new`](Self::new), reporting overflow as [`PersistenceError::DimensionExceeded`] for simplices of `max_dimension`.
    pub fn for_dimension(n_points: usize, max_dimension: usize) -> Result<Self> {
        Self::new(n_points, max_dimension + 1).ok_or_else(|| PersistenceError::DimensionExceeded {
            dimension: max_dimension,
            reason: format!("simplex indices overflow 64 bits for {n_points} points"),
        })
    }

    pub fn n_points(&self) -> usize {
        self.n_points
    }

    pub fn max_vertices(&self) -> usize {
        self.table.len() - 1
    }

    fn binomial(&self, n: usize, k: usize) -> u64 {
        if n > self.n_points {
            return 0;
        }
        self.table.get(k).map_or(0, |row| row[n])
    }

    /// Number of simplices of the given dimension on the full vertex set.
    pub fn n_simplices(&self, dimension: usize) -> u64 {
        self.binomial(self.n_points, dimension + 1)
    }

    /// NOTE: The vertices must be provided in strictly ascending order.
    pub fn encode(&self, vertices: &[usize]) -> Option<SimplexIndex> {
        let dimension = vertices.len().checked_sub(1)?;
        if vertices.len() > self.max_vertices() {
            return None;
        }
        let mut index: u64 = 0;
        let mut previous = None;
        for (i, &v) in vertices.iter().enumerate() {
            if v >= self.n_points || previous.is_some_and(|p| p >= v) {
                return None;
            }
            previous = Some(v);
            index = index.checked_add(self.binomial(v, i + 1))?;
        }
        Some(SimplexIndex { dimension, index })
    }

    /// Vertices of the simplex, in ascending order.
    pub fn decode(&self, simplex: SimplexIndex) -> Option<Vec<usize>> {
        let n_vertices = simplex.dimension + 1;
        if n_vertices > self.max_vertices() || simplex.index >= self.n_simplices(simplex.dimension)
        {
            return None;
        }
        let mut vertices = vec![0; n_vertices];
        let mut remaining = simplex.index;
        let mut upper = self.n_points - 1;
        for i in (0..n_vertices).rev() {
            let k = i + 1;
            // Largest v in [i, upper] with C(v, k) <= remaining; C(i, k) = 0 so the search always succeeds
            let (mut lo, mut hi) = (i, upper);
            while lo < hi {
                let mid = lo + (hi - lo + 1) / 2;
                if self.binomial(mid, k) <= remaining {
                    lo = mid;
                } else {
                    hi = mid - 1;
                }
            }
            vertices[i] = lo;
            remaining -= self.binomial(lo, k);
            upper = lo.saturating_sub(1);
        }
        Some(vertices)
    }

    /// Codimension-one faces, paired with the position of the removed vertex.
    /// Removing earlier vertices gives larger indices so faces are produced in descending order.
    pub fn facets(
        &self,
        vertices: &[usize],
    ) -> impl Iterator<Item = (usize, Option<SimplexIndex>)> + '_ {
        let mut facet = Vec::with_capacity(vertices.len().saturating_sub(1));
        let vertices = vertices.to_vec();
        let n_facets = if vertices.len() > 1 { vertices.len() } else { 0 };
        (0..n_facets).map(move |removed| {
            facet.clear();
            facet.extend(
                vertices
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != removed)
                    .map(|(_, v)| *v),
            );
            (removed, self.encode(&facet))
        })
    }
}
