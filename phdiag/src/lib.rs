//! Boundary matrix reduction for persistent homology.
//!
//! Matrices are never materialised. Instead you describe a matrix through a [`MatrixOracle`](matrices::MatrixOracle),
//! which produces columns on demand, attach a filtration to its rows ([`HasRowFiltration`](matrices::HasRowFiltration))
//! and an ordered basis to its columns ([`HasColBasis`](matrices::HasColBasis)).
//! The algorithms in [`reduction`] then compute an `R = DV` decomposition and read off the persistence pairing.
//!
//! Columns are held as binary heaps of non-zero entries (see [`columns`]) so the only memory that grows with the
//! reduction is the stored columns of `V`.

use thiserror::Error;

pub mod columns;
pub mod fields;
pub mod matrices;
pub mod reduction;

/// Errors raised while querying or reducing a matrix oracle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhdiagError {
    /// The requested column (or row) is outside the domain of the oracle.
    #[error("index is not in the domain of the matrix")]
    NotInDomain,
    /// The reduction was stopped early by its interrupt flag.
    #[error("reduction was interrupted")]
    Interrupted,
}
