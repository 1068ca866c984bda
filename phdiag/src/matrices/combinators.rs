//! Oracles built out of other oracles.

use crate::{columns::ColumnEntry, PhdiagError};

use super::{HasColBasis, HasRowFiltration, MatrixOracle, MatrixRef, RowEntry};

pub fn product<M1: MatrixRef, M2: MatrixRef>(left: M1, right: M2) -> Product<M1, M2>
where
    M2: MatrixOracle<CoefficientField = M1::CoefficientField, RowT = M1::ColT>,
{
    Product { left, right }
}

/// The product `left * right`, each column formed on request as a combination of the columns of `left`.
/// Repeated rows are left for the consumer to sum, as [`BHCol`](crate::columns::BHCol) does.
#[derive(Clone, Copy)]
pub struct Product<M1: MatrixRef, M2: MatrixRef> {
    left: M1,
    right: M2,
}

impl<M1: MatrixRef, M2: MatrixRef> MatrixOracle for Product<M1, M2>
where
    M2: MatrixOracle<CoefficientField = M1::CoefficientField, RowT = M1::ColT>,
{
    type CoefficientField = M1::CoefficientField;
    type ColT = M2::ColT;
    type RowT = M1::RowT;

    fn column(
        &self,
        col: Self::ColT,
    ) -> Result<impl Iterator<Item = (Self::CoefficientField, Self::RowT)>, PhdiagError> {
        // The right column says which combination of left columns to form
        let mut output = Vec::new();
        for (right_coeff, right_row_index) in self.right.column(col)? {
            output.extend(
                self.left
                    .column(right_row_index)?
                    .map(|(left_coeff, left_row_index)| (left_coeff * right_coeff, left_row_index)),
            );
        }
        Ok(output.into_iter())
    }
}

// Left row filtration is inherited by the product
impl<M1: MatrixRef, M2: MatrixRef> HasRowFiltration for Product<M1, M2>
where
    M1: HasRowFiltration,
    M2: MatrixOracle<CoefficientField = M1::CoefficientField, RowT = M1::ColT>,
{
    type FiltrationT = M1::FiltrationT;

    fn filtration_value(&self, row: Self::RowT) -> Result<Self::FiltrationT, PhdiagError> {
        self.left.filtration_value(row)
    }

    fn column_with_filtration(
        &self,
        col: Self::ColT,
    ) -> Result<impl Iterator<Item = RowEntry<Self>>, PhdiagError> {
        let mut output = Vec::new();
        for (right_coeff, right_row_index) in self.right.column(col)? {
            output.extend(
                self.left
                    .column_with_filtration(right_row_index)?
                    .map(|left_entry| ColumnEntry {
                        coeff: left_entry.coeff * right_coeff,
                        row_index: left_entry.row_index,
                        filtration_value: left_entry.filtration_value,
                    }),
            );
        }
        Ok(output.into_iter())
    }
}

impl<M1: MatrixRef, M2: MatrixRef> HasColBasis for Product<M1, M2>
where
    M2: MatrixOracle<CoefficientField = M1::CoefficientField, RowT = M1::ColT> + HasColBasis,
{
    type BasisT = M2::BasisT;

    fn basis(&self) -> &Self::BasisT {
        self.right.basis()
    }
}
