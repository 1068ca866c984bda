//! Oracles backed by stored columns, and the bases that go with them.

use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::{
    fields::{NonZeroCoefficient, Z2},
    PhdiagError,
};

use super::{BasisElement, ColBasis, HasColBasis, MatrixOracle, SplitByDimension};

/// Sparse columns stored one after another; column `i` is the `i`th entry.
#[derive(Debug, Clone)]
pub struct VecVecMatrix<CF: NonZeroCoefficient, RowT: BasisElement> {
    columns: Vec<Vec<(CF, RowT)>>,
    basis: StandardBasis,
}

impl<CF: NonZeroCoefficient, RowT: BasisElement> From<Vec<Vec<(CF, RowT)>>> for VecVecMatrix<CF, RowT> {
    fn from(columns: Vec<Vec<(CF, RowT)>>) -> Self {
        let basis = StandardBasis {
            n_cols: columns.len(),
        };
        Self { columns, basis }
    }
}

impl<CF: NonZeroCoefficient, RowT: BasisElement> MatrixOracle for VecVecMatrix<CF, RowT> {
    type CoefficientField = CF;
    type ColT = usize;
    type RowT = RowT;

    fn column(
        &self,
        col: usize,
    ) -> Result<impl Iterator<Item = (CF, RowT)>, PhdiagError> {
        let column = self.columns.get(col).ok_or(PhdiagError::NotInDomain)?;
        Ok(column.iter().copied())
    }
}

impl<CF: NonZeroCoefficient, RowT: BasisElement> HasColBasis for VecVecMatrix<CF, RowT> {
    type BasisT = StandardBasis;

    fn basis(&self) -> &StandardBasis {
        &self.basis
    }
}

/// A matrix over [`Z2`] given by the rows of each column.
#[allow(non_snake_case)]
pub fn simple_Z2_matrix(cols: Vec<Vec<usize>>) -> VecVecMatrix<Z2, usize> {
    let columns: Vec<Vec<(Z2, usize)>> = cols
        .into_iter()
        .map(|rows| rows.into_iter().map(|row| (Z2::one(), row)).collect())
        .collect();
    VecVecMatrix::from(columns)
}

/// The columns `0..n_cols` in order.
#[derive(Debug, Clone, Copy)]
pub struct StandardBasis {
    n_cols: usize,
}

impl ColBasis for StandardBasis {
    type ElemT = usize;

    fn element(&self, index: usize) -> usize {
        index
    }

    fn size(&self) -> usize {
        self.n_cols
    }
}

/// A basis stored as one `Vec` per dimension, ordered by increasing dimension.
#[derive(Debug, Clone)]
pub struct MultiDimBasis<T: BasisElement> {
    by_dimension: Vec<Vec<T>>,
    total: usize,
}

impl<T: BasisElement> From<Vec<Vec<T>>> for MultiDimBasis<T> {
    fn from(by_dimension: Vec<Vec<T>>) -> Self {
        let total = by_dimension.iter().map(Vec::len).sum();
        Self {
            by_dimension,
            total,
        }
    }
}

impl<T: BasisElement> ColBasis for MultiDimBasis<T> {
    type ElemT = T;

    fn element(&self, index: usize) -> Self::ElemT {
        let mut remaining = index;
        for sub_basis in &self.by_dimension {
            if remaining < sub_basis.len() {
                return sub_basis[remaining];
            }
            remaining -= sub_basis.len();
        }
        panic!("basis index {index} out of range for basis of size {}", self.total)
    }

    fn size(&self) -> usize {
        self.total
    }
}

impl<T: BasisElement> SplitByDimension for MultiDimBasis<T> {
    type SubBasisT = Vec<T>;

    fn n_dimensions(&self) -> usize {
        self.by_dimension.len()
    }

    fn in_dimension(&self, dimension: usize) -> &Self::SubBasisT {
        &self.by_dimension[dimension]
    }
}

/// Sparse columns stored in a hash map keyed by column index.
#[derive(Debug, Clone)]
pub struct MapVecMatrix<CF, ColT, RowT>
where
    CF: NonZeroCoefficient,
    ColT: BasisElement + Hash,
    RowT: BasisElement,
{
    columns: FxHashMap<ColT, Vec<(CF, RowT)>>,
}

impl<CF, ColT, RowT> MatrixOracle for MapVecMatrix<CF, ColT, RowT>
where
    CF: NonZeroCoefficient,
    ColT: BasisElement + Hash,
    RowT: BasisElement,
{
    type CoefficientField = CF;
    type ColT = ColT;
    type RowT = RowT;

    fn column(&self, col: ColT) -> Result<impl Iterator<Item = (CF, RowT)>, PhdiagError> {
        let column = self.columns.get(&col).ok_or(PhdiagError::NotInDomain)?;
        Ok(column.iter().copied())
    }
}

impl<CF, ColT, RowT> From<FxHashMap<ColT, Vec<(CF, RowT)>>> for MapVecMatrix<CF, ColT, RowT>
where
    CF: NonZeroCoefficient,
    ColT: BasisElement + Hash,
    RowT: BasisElement,
{
    fn from(columns: FxHashMap<ColT, Vec<(CF, RowT)>>) -> Self {
        Self { columns }
    }
}
