//! An implementation of the standard algorithm with no optimisations.
//!
//! To run this algorithm you should attempt to construct the V matrix by calling [`standard_algo`] or [`standard_algo_with_diagram`].
//! Columns are reduced in the order of the attached [`ColBasis`], which should respect the filtration.

use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::FxHashMap;

use crate::columns::BHCol;
use crate::matrices::combinators::product;
use crate::matrices::implementors::MapVecMatrix;
use crate::reduction::Diagram;
use crate::{
    fields::{Invertible, NonZeroCoefficient},
    matrices::{BasisElement, ColBasis, HasColBasis, HasRowFiltration, MatrixOracle},
    PhdiagError,
};

/// The return type of [`standard_algo`] - reduction columns are stored behind a hash map.
pub type StandardReductionMatrix<CF, ColT> = MapVecMatrix<CF, ColT, ColT>;

/// Run the standard algorithm to reduce the provided boundary matrix.
/// The reduction matrix V is returned as a [`StandardReductionMatrix`].
pub fn standard_algo<M, T>(
    boundary: M,
) -> Result<StandardReductionMatrix<M::CoefficientField, T>, PhdiagError>
where
    M: HasRowFiltration + HasColBasis + MatrixOracle<ColT = T, RowT = T>,
    M::CoefficientField: Invertible,
    T: BasisElement + Hash,
{
    let never = AtomicBool::new(false);
    standard_algo_interruptible(boundary, &never)
}

/// As [`standard_algo`], checking `interrupt` before each column.
/// If the flag is raised, the reduction is abandoned with [`PhdiagError::Interrupted`].
pub fn standard_algo_interruptible<M, T>(
    boundary: M,
    interrupt: &AtomicBool,
) -> Result<StandardReductionMatrix<M::CoefficientField, T>, PhdiagError>
where
    M: HasRowFiltration + HasColBasis + MatrixOracle<ColT = T, RowT = T>,
    M::CoefficientField: Invertible,
    T: BasisElement + Hash,
{
    let mut v: FxHashMap<T, Vec<(M::CoefficientField, T)>> = FxHashMap::default();

    // low_inverse[i]=(j, lambda) means R[j] has lowest non-zero in row i with coefficient lambda
    let mut low_inverse: FxHashMap<T, (T, M::CoefficientField)> = FxHashMap::default();

    for i in 0..boundary.basis().size() {
        if interrupt.load(Ordering::Relaxed) {
            return Err(PhdiagError::Interrupted);
        }
        let basis_element = boundary.basis().element(i);

        let mut v_i: BHCol<(), T, M::CoefficientField> = BHCol::default();
        v_i.add_tuple((M::CoefficientField::one(), basis_element, ()));
        let mut r_i = boundary.build_bhcol(basis_element)?;

        loop {
            let Some(pivot_entry) = r_i.clone_pivot() else {
                // Column reduced to 0 -> found cycle
                break;
            };

            let Some(&(j_basis_element, j_coeff)) = low_inverse.get(&pivot_entry.row_index) else {
                // Cannot reduce further -> found boundary
                break;
            };

            let col_multiple = pivot_entry.coeff.additive_inverse() * j_coeff.mult_inverse();

            // R_j = D V_j so add the same multiple of each summand of V_j
            let v_j = v.get(&j_basis_element).ok_or(PhdiagError::NotInDomain)?;
            for &(v_coeff, v_row) in v_j {
                r_i.add_entries(
                    boundary
                        .column_with_filtration(v_row)?
                        .map(|entry| entry * (v_coeff * col_multiple)),
                );
            }
            v_i.add_tuples(
                v_j.iter()
                    .map(|&(v_coeff, v_row)| (v_coeff * col_multiple, v_row, ())),
            );
        }

        if let Some(pivot_entry) = r_i.pop_pivot() {
            low_inverse.insert(pivot_entry.row_index, (basis_element, pivot_entry.coeff));
        };

        v.insert(
            basis_element,
            v_i.drain_sorted()
                .map(|entry| (entry.coeff, entry.row_index))
                .collect(),
        );
    }

    Ok(MapVecMatrix::from(v))
}

/// Reads off the pairings from the reduced matrix R = DV to construct the persistence diagram.
pub fn read_off_diagram<M, T>(
    boundary: M,
    reduction_matrix: &StandardReductionMatrix<M::CoefficientField, T>,
) -> Result<Diagram<T>, PhdiagError>
where
    M: HasRowFiltration + HasColBasis + MatrixOracle<ColT = T, RowT = T>,
    T: BasisElement + Hash,
{
    let r = product(&boundary, reduction_matrix);

    let mut diagram = Diagram::default();

    for i in 0..boundary.basis().size() {
        let basis_element = boundary.basis().element(i);
        let mut r_i = r.build_bhcol(basis_element)?;
        match r_i.pop_pivot() {
            None => {
                diagram.essential.insert(basis_element);
            }
            Some(piv) => {
                diagram.pairings.insert((piv.row_index, basis_element));
                diagram.essential.remove(&piv.row_index);
            }
        }
    }

    Ok(diagram)
}

#[allow(clippy::type_complexity)]
/// Calls [`standard_algo`] and then [`read_off_diagram`].
pub fn standard_algo_with_diagram<M, T>(
    boundary: M,
) -> Result<(StandardReductionMatrix<M::CoefficientField, T>, Diagram<T>), PhdiagError>
where
    M: HasRowFiltration + HasColBasis + MatrixOracle<ColT = T, RowT = T>,
    M::CoefficientField: Invertible,
    T: BasisElement + Hash,
{
    let never = AtomicBool::new(false);
    standard_algo_with_diagram_interruptible(boundary, &never)
}

#[allow(clippy::type_complexity)]
/// Calls [`standard_algo_interruptible`] and then [`read_off_diagram`].
pub fn standard_algo_with_diagram_interruptible<M, T>(
    boundary: M,
    interrupt: &AtomicBool,
) -> Result<(StandardReductionMatrix<M::CoefficientField, T>, Diagram<T>), PhdiagError>
where
    M: HasRowFiltration + HasColBasis + MatrixOracle<ColT = T, RowT = T>,
    M::CoefficientField: Invertible,
    T: BasisElement + Hash,
{
    let v = standard_algo_interruptible(&boundary, interrupt)?;
    let diagram = read_off_diagram(&boundary, &v)?;
    Ok((v, diagram))
}
