//! R=DV reduction algorithms for `phdiag` matrices.
//! Includes the standard algorithm as well as the clearing algorithm.
//!
//! Algorithms in this module return an oracle to the V matrix (known as the reduction matrix) alongside the
//! [`Diagram`] of pairings.
//! If you held onto a reference to D then you can construct R (known as the reduced matrix) via [`product`](crate::matrices::combinators::product).

pub mod clearing;
pub mod standard;

pub use clearing::*;
pub use standard::*;

use std::hash::Hash;

use rustc_hash::FxHashSet;

/// A persistence diagram, as obtained by one of the reduction algorithms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagram<T: Hash + Eq> {
    /// The unpaired or essential columns (infinite bars).
    pub essential: FxHashSet<T>,
    /// The paired columns (finite bars), stored as (birth, death) pairs.
    pub pairings: FxHashSet<(T, T)>,
}

impl<T: Hash + Eq> Default for Diagram<T> {
    fn default() -> Self {
        Self {
            essential: FxHashSet::default(),
            pairings: FxHashSet::default(),
        }
    }
}

impl<T: Hash + Eq> Diagram<T> {
    /// Total number of basis elements accounted for; every column is either essential or in exactly one pair.
    pub fn n_accounted(&self) -> usize {
        self.essential.len() + 2 * self.pairings.len()
    }
}

#[cfg(test)]
mod tests {

    use std::sync::atomic::AtomicBool;

    use crate::{
        fields::{NonZeroCoefficient, Z3},
        matrices::{
            combinators::product,
            implementors::{simple_Z2_matrix, MultiDimBasis, VecVecMatrix},
            tests::same_column,
            MatrixRef,
        },
        PhdiagError,
    };

    use super::{
        standard_algo, standard_algo_with_diagram, standard_algo_with_diagram_interruptible,
        ClearedReductionMatrix,
    };

    #[test]
    fn test_inefficient_reduction() {
        let matrix_d = simple_Z2_matrix(vec![
            vec![],
            vec![],
            vec![],
            vec![0, 1],
            vec![1, 2],
            vec![0, 2],
            vec![3, 4, 5],
            vec![3, 4, 5],
        ]);
        let matrix_v = standard_algo((&matrix_d).with_trivial_filtration()).unwrap();
        let matrix_r = product(&matrix_d, &matrix_v);
        let true_matrix_r = simple_Z2_matrix(vec![
            vec![],
            vec![],
            vec![],
            vec![0, 1],
            vec![1, 2],
            vec![],
            vec![3, 4, 5],
            vec![],
        ]);

        assert!((0..=7).all(|idx| same_column(&matrix_r, &true_matrix_r, idx).unwrap()))
    }

    // Filled triangle on vertices 0, 1, 2 with edges 3=01, 4=12, 5=02 and face 6
    fn signed_triangle() -> VecVecMatrix<Z3, usize> {
        let one = Z3::one();
        let minus = one.additive_inverse();
        VecVecMatrix::from(vec![
            vec![],
            vec![],
            vec![],
            vec![(one, 1), (minus, 0)],
            vec![(one, 2), (minus, 1)],
            vec![(one, 2), (minus, 0)],
            vec![(one, 4), (minus, 5), (one, 3)],
        ])
    }

    #[test]
    fn test_standard_and_clearing_agree() {
        let matrix_d = signed_triangle();
        let filtered = (&matrix_d).with_filtration(|idx| Ok(idx));

        let (_v, standard_diagram) = standard_algo_with_diagram(&filtered).unwrap();

        let basis = MultiDimBasis::from(vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
        let split = filtered.with_basis(basis);
        let (cleared_v, clearing_diagram) =
            ClearedReductionMatrix::build_with_diagram(&split, (0..3).rev()).unwrap();

        assert_eq!(standard_diagram, clearing_diagram);
        assert_eq!(clearing_diagram.essential.len(), 1);
        assert!(clearing_diagram.essential.contains(&0));
        assert!(clearing_diagram.pairings.contains(&(1, 3)));
        assert!(clearing_diagram.pairings.contains(&(2, 4)));
        assert!(clearing_diagram.pairings.contains(&(5, 6)));
        assert_eq!(clearing_diagram.n_accounted(), 7);

        // Cleared columns are cycles, copied from the boundary of their partner
        assert!(cleared_v.col_is_cycle(5).unwrap());
        assert!(!cleared_v.col_is_cycle(6).unwrap());
        assert!(cleared_v.col_is_cycle(0).unwrap());
    }

    #[test]
    fn test_clearing_interrupted() {
        let matrix_d = signed_triangle();
        let basis = MultiDimBasis::from(vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
        let split = (&matrix_d).with_filtration(|idx| Ok(idx)).with_basis(basis);
        let interrupt = AtomicBool::new(true);
        let result =
            ClearedReductionMatrix::build_with_diagram_interruptible(&split, (0..3).rev(), &interrupt);
        assert!(matches!(result, Err(PhdiagError::Interrupted)));
    }

    #[test]
    fn test_standard_interrupted() {
        let matrix_d = signed_triangle();
        let filtered = (&matrix_d).with_filtration(|idx| Ok(idx));
        let interrupt = AtomicBool::new(true);
        let result = standard_algo_with_diagram_interruptible(&filtered, &interrupt);
        assert!(matches!(result, Err(PhdiagError::Interrupted)));

        let lowered = AtomicBool::new(false);
        let (_v, diagram) = standard_algo_with_diagram_interruptible(&filtered, &lowered).unwrap();
        assert_eq!(diagram.n_accounted(), 7);
    }

    #[test]
    fn test_clearing_rejects_missing_dimension() {
        let matrix_d = signed_triangle();
        let basis = MultiDimBasis::from(vec![vec![0, 1, 2], vec![3, 4, 5]]);
        let split = (&matrix_d).with_filtration(|idx| Ok(idx)).with_basis(basis);
        let result = ClearedReductionMatrix::build_with_diagram(&split, (0..3).rev());
        assert!(matches!(result, Err(PhdiagError::NotInDomain)));
    }
}
