//! Wrappers attaching a row filtration or a column basis to an existing oracle.
//! Columns are always forwarded untouched to the wrapped oracle.

use crate::PhdiagError;

use super::{ColBasis, FiltrationT, HasColBasis, HasRowFiltration, MatrixOracle, MatrixRef, RowEntry};

/// Every row has filtration value `()`; built by [`MatrixRef::with_trivial_filtration`].
#[derive(Clone, Copy)]
pub struct WithTrivialFiltration<M: MatrixRef> {
    pub(crate) oracle: M,
}

impl<M: MatrixRef> MatrixOracle for WithTrivialFiltration<M> {
    type CoefficientField = M::CoefficientField;
    type ColT = M::ColT;
    type RowT = M::RowT;

    fn column(
        &self,
        col: Self::ColT,
    ) -> Result<impl Iterator<Item = (Self::CoefficientField, Self::RowT)>, PhdiagError> {
        self.oracle.column(col)
    }
}

impl<M: MatrixRef> HasRowFiltration for WithTrivialFiltration<M> {
    type FiltrationT = ();

    fn filtration_value(&self, _row: Self::RowT) -> Result<(), PhdiagError> {
        Ok(())
    }
}

impl<M: MatrixRef + HasColBasis> HasColBasis for WithTrivialFiltration<M> {
    type BasisT = M::BasisT;

    fn basis(&self) -> &Self::BasisT {
        self.oracle.basis()
    }
}

/// Row filtration values computed by a closure; built by [`MatrixRef::with_filtration`].
#[derive(Clone, Copy)]
pub struct WithFuncFiltration<M, FT, F>
where
    M: MatrixRef,
    FT: FiltrationT,
    F: Fn(M::RowT) -> Result<FT, PhdiagError>,
{
    pub(crate) oracle: M,
    pub(crate) filtration: F,
}

impl<M, FT, F> MatrixOracle for WithFuncFiltration<M, FT, F>
where
    M: MatrixRef,
    FT: FiltrationT,
    F: Fn(M::RowT) -> Result<FT, PhdiagError>,
{
    type CoefficientField = M::CoefficientField;
    type ColT = M::ColT;
    type RowT = M::RowT;

    fn column(
        &self,
        col: Self::ColT,
    ) -> Result<impl Iterator<Item = (Self::CoefficientField, Self::RowT)>, PhdiagError> {
        self.oracle.column(col)
    }
}

impl<M, FT, F> HasRowFiltration for WithFuncFiltration<M, FT, F>
where
    M: MatrixRef,
    FT: FiltrationT,
    F: Fn(M::RowT) -> Result<FT, PhdiagError>,
{
    type FiltrationT = FT;

    fn filtration_value(&self, row: Self::RowT) -> Result<FT, PhdiagError> {
        (self.filtration)(row)
    }
}

impl<M, FT, F> HasColBasis for WithFuncFiltration<M, FT, F>
where
    M: MatrixRef + HasColBasis,
    FT: FiltrationT,
    F: Fn(M::RowT) -> Result<FT, PhdiagError>,
{
    type BasisT = M::BasisT;

    fn basis(&self) -> &Self::BasisT {
        self.oracle.basis()
    }
}

/// An owned oracle together with the basis its columns are reduced in.
#[derive(Debug, Clone, Copy)]
pub struct MatrixWithBasis<M, B>
where
    M: MatrixOracle,
    B: ColBasis<ElemT = M::ColT>,
{
    pub matrix: M,
    pub basis: B,
}

impl<M, B> MatrixWithBasis<M, B>
where
    M: MatrixOracle,
    B: ColBasis<ElemT = M::ColT>,
{
    pub fn new(matrix: M, basis: B) -> Self {
        Self { matrix, basis }
    }
}

impl<M, B> MatrixOracle for MatrixWithBasis<M, B>
where
    M: MatrixOracle,
    B: ColBasis<ElemT = M::ColT>,
{
    type CoefficientField = M::CoefficientField;
    type ColT = M::ColT;
    type RowT = M::RowT;

    fn column(
        &self,
        col: Self::ColT,
    ) -> Result<impl Iterator<Item = (Self::CoefficientField, Self::RowT)>, PhdiagError> {
        self.matrix.column(col)
    }
}

impl<M, B> HasRowFiltration for MatrixWithBasis<M, B>
where
    M: HasRowFiltration,
    B: ColBasis<ElemT = M::ColT>,
{
    type FiltrationT = M::FiltrationT;

    fn filtration_value(&self, row: Self::RowT) -> Result<Self::FiltrationT, PhdiagError> {
        self.matrix.filtration_value(row)
    }

    // Keeps any batched override of the wrapped oracle
    fn column_with_filtration(
        &self,
        col: Self::ColT,
    ) -> Result<impl Iterator<Item = RowEntry<Self>>, PhdiagError> {
        self.matrix.column_with_filtration(col)
    }
}

impl<M, B> HasColBasis for MatrixWithBasis<M, B>
where
    M: MatrixOracle,
    B: ColBasis<ElemT = M::ColT>,
{
    type BasisT = B;

    fn basis(&self) -> &B {
        &self.basis
    }
}
