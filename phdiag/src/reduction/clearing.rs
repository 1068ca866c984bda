//! An implementation of the standard algorithm with the clearing optimisation.
//!
//! To run this algorithm you should attempt to construct the V matrix by calling [`ClearedReductionMatrix::build_with_diagram`].
//! The column basis must be split by dimension and the dimensions are reduced in the order provided.
//! For a boundary matrix, reduce from the top dimension downwards so that pivots found in dimension `d` clear columns in dimension `d - 1`.

use std::hash::Hash;
use std::iter;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use rustc_hash::FxHashMap;

use crate::columns::BHCol;
use crate::matrices::SplitByDimension;
use crate::reduction::Diagram;
use crate::{
    fields::{Invertible, NonZeroCoefficient},
    matrices::{BasisElement, ColBasis, HasColBasis, HasRowFiltration, MatrixOracle},
    PhdiagError,
};

#[derive(Clone)]
enum ReductionColumn<CF, ColT> {
    /// This variant is used when `(i, j)` is found as a pair, in which case column `i` can be reduced by setting the column `V_i = R_j`, we store j here.
    Cleared(ColT),
    /// This variant is used when the column is not cleared and hence must be reduced by the main loop.
    /// The inner `Vec` represents the sum of columns used in the reduction, minus the starting column (which corresponds to the +1 on the diagonal of `V`).
    Reduced(Vec<(CF, ColT)>),
}

/// The reduction matrix produced by the clearing algorithm.
///
/// Since some columns in this matrix are just copies of columns in the original boundary matrix (D) this must hold onto your matrix.
/// When you request a column of this matrix, if the column was reduced by clearing then the corresponding column from R is built, otherwise the stored column of V is returned.
pub struct ClearedReductionMatrix<M: MatrixOracle> {
    boundary: M,
    reduction_columns: FxHashMap<M::ColT, ReductionColumn<M::CoefficientField, M::ColT>>,
}

impl<M, T> ClearedReductionMatrix<M>
where
    M: MatrixOracle<ColT = T, RowT = T>,
    T: BasisElement + Hash,
{
    pub fn boundary(&self) -> &M {
        &self.boundary
    }

    /// Number of columns which were reduced by clearing rather than by column additions.
    pub fn n_cleared(&self) -> usize {
        self.reduction_columns
            .values()
            .filter(|col| matches!(col, ReductionColumn::Cleared(_)))
            .count()
    }

    fn reduced_entry(&self, col: T) -> Result<&[(M::CoefficientField, T)], PhdiagError> {
        match self.reduction_columns.get(&col) {
            Some(ReductionColumn::Reduced(entries)) => Ok(entries.as_slice()),
            _ => Err(PhdiagError::NotInDomain),
        }
    }

    fn v_column(&self, col: T) -> Result<Vec<(M::CoefficientField, T)>, PhdiagError> {
        let reduction_col = self
            .reduction_columns
            .get(&col)
            .ok_or(PhdiagError::NotInDomain)?;
        match reduction_col {
            ReductionColumn::Reduced(entries) => Ok(entries
                .iter()
                .copied()
                .chain(iter::once((M::CoefficientField::one(), col)))
                .collect()),
            ReductionColumn::Cleared(death_idx) => {
                // V_i = R_j = D V_j, where V_j was reduced conventionally
                let v_j = self.reduced_entry(*death_idx)?;
                let mut output = Vec::new();
                for (coeff, row) in v_j
                    .iter()
                    .copied()
                    .chain(iter::once((M::CoefficientField::one(), *death_idx)))
                {
                    output.extend(
                        self.boundary
                            .column(row)?
                            .map(|(d_coeff, d_row)| (d_coeff * coeff, d_row)),
                    );
                }
                Ok(output)
            }
        }
    }
}

impl<M, T> ClearedReductionMatrix<M>
where
    M: HasRowFiltration + MatrixOracle<ColT = T, RowT = T>,
    T: BasisElement + Hash,
{
    /// Provides a more efficient check for whether a given column represents a cycle in the reduced matrix R.
    ///
    /// A column that was cleared by the clearing optimisation is necessarily a cycle.
    /// Otherwise, if the column was conventionally reduced then we have to build that column in R.
    pub fn col_is_cycle(&self, col: T) -> Result<bool, PhdiagError> {
        let reduction_col = self
            .reduction_columns
            .get(&col)
            .ok_or(PhdiagError::NotInDomain)?;
        match reduction_col {
            ReductionColumn::Cleared(_) => Ok(true),
            ReductionColumn::Reduced(_) => {
                let mut r_col = self.boundary.empty_bhcol();
                for (coeff, row) in self.v_column(col)? {
                    r_col.add_entries(
                        self.boundary
                            .column_with_filtration(row)?
                            .map(|entry| entry * coeff),
                    );
                }
                Ok(r_col.pop_pivot().is_none())
            }
        }
    }
}

impl<M, T> ClearedReductionMatrix<M>
where
    M: HasRowFiltration + HasColBasis + MatrixOracle<ColT = T, RowT = T>,
    M::BasisT: SplitByDimension,
    M::CoefficientField: Invertible,
    T: BasisElement + Hash,
{
    /// Reduce the boundary matrix, one dimension at a time, in the order given by `dimension_order`.
    pub fn build_with_diagram(
        boundary: M,
        dimension_order: impl IntoIterator<Item = usize>,
    ) -> Result<(Self, Diagram<T>), PhdiagError> {
        let never = AtomicBool::new(false);
        Self::build_with_diagram_interruptible(boundary, dimension_order, &never)
    }

    /// As [`build_with_diagram`](Self::build_with_diagram) but checks `interrupt` before each column.
    /// If the flag is raised, the reduction is abandoned with [`PhdiagError::Interrupted`].
    pub fn build_with_diagram_interruptible(
        boundary: M,
        dimension_order: impl IntoIterator<Item = usize>,
        interrupt: &AtomicBool,
    ) -> Result<(Self, Diagram<T>), PhdiagError> {
        let mut matrix = Self {
            boundary,
            reduction_columns: FxHashMap::default(),
        };
        let mut diagram = Diagram::default();

        for dimension in dimension_order {
            matrix.reduce_dimension(dimension, &mut diagram, interrupt)?;
        }

        Ok((matrix, diagram))
    }

    fn reduce_dimension(
        &mut self,
        dimension: usize,
        diagram: &mut Diagram<T>,
        interrupt: &AtomicBool,
    ) -> Result<(), PhdiagError> {
        if dimension >= self.boundary.basis().n_dimensions() {
            return Err(PhdiagError::NotInDomain);
        }

        // low_inverse[i]=(j, lambda) means R[j] has lowest non-zero in row i with coefficient lambda
        let mut low_inverse: FxHashMap<T, (T, M::CoefficientField)> = FxHashMap::default();
        let n_columns = self.boundary.basis().in_dimension(dimension).size();
        let mut n_cleared = 0;

        for i in 0..n_columns {
            if interrupt.load(Ordering::Relaxed) {
                return Err(PhdiagError::Interrupted);
            }

            let basis_element = self.boundary.basis().in_dimension(dimension).element(i);

            // Column already zeroed by a pivot in the dimension above
            if self.reduction_columns.contains_key(&basis_element) {
                n_cleared += 1;
                continue;
            }

            let mut v_i: BHCol<(), T, M::CoefficientField> = BHCol::default();
            let mut r_i = self.boundary.build_bhcol(basis_element)?;
            self.reduce_column(&low_inverse, &mut r_i, &mut v_i)?;

            if let Some(pivot_entry) = r_i.peek_pivot() {
                let pivot_row = pivot_entry.row_index;
                low_inverse.insert(pivot_row, (basis_element, pivot_entry.coeff));
                self.reduction_columns
                    .insert(pivot_row, ReductionColumn::Cleared(basis_element));
                diagram.pairings.insert((pivot_row, basis_element));
            } else {
                diagram.essential.insert(basis_element);
            }

            self.reduction_columns.insert(
                basis_element,
                ReductionColumn::Reduced(
                    v_i.drain_sorted()
                        .map(|entry| (entry.coeff, entry.row_index))
                        .collect(),
                ),
            );
        }

        debug!(
            "Reduced dimension {dimension}: {} columns, {n_cleared} cleared",
            n_columns
        );
        Ok(())
    }

    /// Add columns of R to `r_i` until its pivot is new; on return the pivot (if any) is at the top of the heap.
    fn reduce_column(
        &self,
        low_inverse: &FxHashMap<T, (T, M::CoefficientField)>,
        r_i: &mut BHCol<M::FiltrationT, T, M::CoefficientField>,
        v_i: &mut BHCol<(), T, M::CoefficientField>,
    ) -> Result<(), PhdiagError> {
        loop {
            let Some(pivot_entry) = r_i.clone_pivot() else {
                // Column reduced to 0 -> found cycle
                return Ok(());
            };

            let Some(&(j_basis_element, j_coeff)) = low_inverse.get(&pivot_entry.row_index) else {
                // Cannot reduce further -> found boundary
                return Ok(());
            };

            let col_multiple = pivot_entry.coeff.additive_inverse() * j_coeff.mult_inverse();

            let v_j = self.v_column(j_basis_element)?;
            for &(v_coeff, v_row) in &v_j {
                r_i.add_entries(
                    self.boundary
                        .column_with_filtration(v_row)?
                        .map(|entry| entry * (v_coeff * col_multiple)),
                );
            }
            v_i.add_tuples(
                v_j.into_iter()
                    .map(|(v_coeff, v_row)| (v_coeff * col_multiple, v_row, ())),
            );
        }
    }
}

impl<M, T> MatrixOracle for ClearedReductionMatrix<M>
where
    M: MatrixOracle<ColT = T, RowT = T>,
    T: BasisElement + Hash,
{
    type CoefficientField = M::CoefficientField;
    type ColT = T;
    type RowT = T;

    fn column(
        &self,
        col: Self::ColT,
    ) -> Result<impl Iterator<Item = (Self::CoefficientField, Self::RowT)>, PhdiagError> {
        Ok(self.v_column(col)?.into_iter())
    }
}

impl<M, T> HasColBasis for ClearedReductionMatrix<M>
where
    M: HasColBasis + MatrixOracle<ColT = T, RowT = T>,
    T: BasisElement + Hash,
{
    type BasisT = M::BasisT;

    fn basis(&self) -> &Self::BasisT {
        self.boundary.basis()
    }
}
