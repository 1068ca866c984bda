//! Matrices described by oracles that produce one column at a time.
//!
//! A reduction needs three things from a matrix: its columns ([`MatrixOracle`]), a filtration value for every
//! row so that pivots can be chosen ([`HasRowFiltration`]) and the order in which to visit columns
//! ([`HasColBasis`]).
//! Cheap references implement [`MatrixRef`], whose methods attach the latter two to an existing oracle.

use ordered_float::NotNan;

use crate::{
    columns::{BHCol, ColumnEntry},
    fields::NonZeroCoefficient,
    PhdiagError,
};

use self::adaptors::{MatrixWithBasis, WithFuncFiltration, WithTrivialFiltration};

pub mod adaptors;
pub mod combinators;
pub mod implementors;

/// Index of a row or column.
pub trait BasisElement: Ord + Copy {}
/// Value used to order rows; ties are broken by the row index.
pub trait FiltrationT: Ord + Copy {}

impl BasisElement for usize {}
impl FiltrationT for usize {}
impl FiltrationT for NotNan<f64> {}
impl FiltrationT for () {}

pub trait MatrixOracle {
    type CoefficientField: NonZeroCoefficient;
    type ColT: BasisElement;
    type RowT: BasisElement;

    /// The non-zero entries of column `col`, in any order and possibly with repeated rows.
    /// Columns outside the domain of the oracle give [`PhdiagError::NotInDomain`].
    ///
    /// Rows are pushed onto a binary heap, which is cheapest when they arrive in descending order.
    fn column(
        &self,
        col: Self::ColT,
    ) -> Result<impl Iterator<Item = (Self::CoefficientField, Self::RowT)>, PhdiagError>;
}

/// An oracle that is cheap to copy, usually a reference.
pub trait MatrixRef: MatrixOracle + Copy {
    /// Give every row the same filtration value, so rows are ordered by index alone.
    fn with_trivial_filtration(self) -> WithTrivialFiltration<Self> {
        WithTrivialFiltration { oracle: self }
    }

    fn with_filtration<FT: FiltrationT, F: Fn(Self::RowT) -> Result<FT, PhdiagError>>(
        self,
        filtration: F,
    ) -> WithFuncFiltration<Self, FT, F> {
        WithFuncFiltration {
            oracle: self,
            filtration,
        }
    }

    fn with_basis<B>(self, basis: B) -> MatrixWithBasis<Self, B>
    where
        B: ColBasis<ElemT = Self::ColT>,
    {
        MatrixWithBasis::new(self, basis)
    }
}

impl<M> MatrixRef for M where M: MatrixOracle + Copy {}

impl<M: MatrixOracle> MatrixOracle for &M {
    type CoefficientField = M::CoefficientField;
    type ColT = M::ColT;
    type RowT = M::RowT;

    fn column(
        &self,
        col: Self::ColT,
    ) -> Result<impl Iterator<Item = (Self::CoefficientField, Self::RowT)>, PhdiagError> {
        (**self).column(col)
    }
}

/// A [`ColumnEntry`] of the matrix `M`, carrying the filtration value of its row.
pub type RowEntry<M> = ColumnEntry<
    <M as HasRowFiltration>::FiltrationT,
    <M as MatrixOracle>::RowT,
    <M as MatrixOracle>::CoefficientField,
>;

/// A heap column holding entries of the matrix `M`.
pub type HeapColumn<M> = BHCol<
    <M as HasRowFiltration>::FiltrationT,
    <M as MatrixOracle>::RowT,
    <M as MatrixOracle>::CoefficientField,
>;

pub trait HasRowFiltration: MatrixOracle + Sized {
    type FiltrationT: FiltrationT;

    fn filtration_value(&self, row: Self::RowT) -> Result<Self::FiltrationT, PhdiagError>;

    /// Column entries tagged with their filtration values.
    /// Oracles that can share work between the rows of one column should override this.
    fn column_with_filtration(
        &self,
        col: Self::ColT,
    ) -> Result<impl Iterator<Item = RowEntry<Self>>, PhdiagError> {
        let mut entries = vec![];
        for (coeff, row_index) in self.column(col)? {
            entries.push(ColumnEntry {
                filtration_value: self.filtration_value(row_index)?,
                row_index,
                coeff,
            });
        }
        Ok(entries.into_iter())
    }

    fn empty_bhcol(&self) -> HeapColumn<Self> {
        BHCol::default()
    }

    fn build_bhcol(&self, col: Self::ColT) -> Result<HeapColumn<Self>, PhdiagError> {
        let mut column = self.empty_bhcol();
        column.add_entries(self.column_with_filtration(col)?);
        Ok(column)
    }
}

impl<M: HasRowFiltration> HasRowFiltration for &M {
    type FiltrationT = M::FiltrationT;

    fn filtration_value(&self, row: Self::RowT) -> Result<Self::FiltrationT, PhdiagError> {
        (**self).filtration_value(row)
    }

    fn column_with_filtration(
        &self,
        col: Self::ColT,
    ) -> Result<impl Iterator<Item = RowEntry<Self>>, PhdiagError> {
        (**self).column_with_filtration(col)
    }
}

/// Columns in the order they are reduced.
pub trait ColBasis {
    type ElemT: BasisElement;

    /// Panics if `index >= self.size()`.
    fn element(&self, index: usize) -> Self::ElemT;
    fn size(&self) -> usize;
}

impl<T: BasisElement> ColBasis for Vec<T> {
    type ElemT = T;

    fn element(&self, index: usize) -> Self::ElemT {
        self[index]
    }

    fn size(&self) -> usize {
        self.len()
    }
}

pub trait HasColBasis: MatrixOracle {
    type BasisT: ColBasis<ElemT = Self::ColT>;

    fn basis(&self) -> &Self::BasisT;
}

impl<M: HasColBasis> HasColBasis for &M {
    type BasisT = M::BasisT;

    fn basis(&self) -> &Self::BasisT {
        (**self).basis()
    }
}

/// A basis made of one sub-basis per dimension, concatenated in increasing dimension.
/// Clearing reduces one dimension at a time and so walks the sub-bases separately.
pub trait SplitByDimension: ColBasis {
    type SubBasisT: ColBasis<ElemT = Self::ElemT>;

    /// Valid arguments to [`in_dimension`](Self::in_dimension) are `0..n_dimensions()`.
    fn n_dimensions(&self) -> usize;

    fn in_dimension(&self, dimension: usize) -> &Self::SubBasisT;
}
