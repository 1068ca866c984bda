//! Coefficients of matrix entries.
//!
//! Zero is never stored: a sum that vanishes is `None` and the entry disappears from its column.
//! [`Z2`] is a unit type, so columns over `Z_2` only carry row indices.
//! The odd prime fields up to `Z_13` are instances of [`ZP`].

use std::fmt::Debug;
use std::num::NonZeroU8;
use std::ops::{Add, Mul};

pub trait NonZeroCoefficient:
    Eq
    + Copy
    + Debug
    + Add<Self, Output = Option<Self>>
    + Add<Option<Self>, Output = Option<Self>>
    + Mul<Self, Output = Self>
{
    fn one() -> Self;
    fn additive_inverse(self) -> Self;
}

/// Coefficients with multiplicative inverses, as needed to eliminate a pivot.
pub trait Invertible: NonZeroCoefficient {
    fn mult_inverse(self) -> Self;
}

/// The only non-zero element of `Z_2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Z2;

impl Add for Z2 {
    type Output = Option<Z2>;

    // 1 + 1 = 0
    fn add(self, _rhs: Z2) -> Option<Z2> {
        None
    }
}

impl Add<Option<Z2>> for Z2 {
    type Output = Option<Z2>;

    fn add(self, rhs: Option<Z2>) -> Option<Z2> {
        match rhs {
            Some(_) => None,
            None => Some(Z2),
        }
    }
}

impl Mul for Z2 {
    type Output = Z2;

    fn mul(self, _rhs: Z2) -> Z2 {
        Z2
    }
}

impl NonZeroCoefficient for Z2 {
    fn one() -> Self {
        Z2
    }

    fn additive_inverse(self) -> Self {
        Z2
    }
}

impl Invertible for Z2 {
    fn mult_inverse(self) -> Self {
        Z2
    }
}

/// A non-zero residue modulo the prime `P`.
///
/// Sums and products are computed in a `u8`, so `P` must be an odd prime no larger than 13.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ZP<const P: u8>(NonZeroU8);

impl<const P: u8> ZP<P> {
    /// `value mod P`, or `None` for multiples of `P`.
    pub fn from_residue(value: u8) -> Option<Self> {
        NonZeroU8::new(value % P).map(Self)
    }
}

impl<const P: u8> Debug for ZP<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} mod {}", self.0, P)
    }
}

impl<const P: u8> Add for ZP<P> {
    type Output = Option<Self>;

    fn add(self, rhs: Self) -> Option<Self> {
        Self::from_residue(self.0.get() + rhs.0.get())
    }
}

impl<const P: u8> Add<Option<ZP<P>>> for ZP<P> {
    type Output = Option<Self>;

    fn add(self, rhs: Option<Self>) -> Option<Self> {
        rhs.map_or(Some(self), |rhs| self + rhs)
    }
}

impl<const P: u8> Mul for ZP<P> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        // P is prime so a product of units is a unit; the fallback is never taken
        Self::from_residue(self.0.get() * rhs.0.get()).unwrap_or(Self::one())
    }
}

impl<const P: u8> NonZeroCoefficient for ZP<P> {
    fn one() -> Self {
        Self(NonZeroU8::MIN)
    }

    fn additive_inverse(self) -> Self {
        Self::from_residue(P - self.0.get()).unwrap_or(self)
    }
}

impl<const P: u8> Invertible for ZP<P> {
    // a^(P - 2) = a^(-1) by Fermat's little theorem
    fn mult_inverse(self) -> Self {
        (2..P).fold(Self::one(), |acc, _| acc * self)
    }
}

pub type Z3 = ZP<3>;
pub type Z5 = ZP<5>;
pub type Z7 = ZP<7>;
pub type Z11 = ZP<11>;
pub type Z13 = ZP<13>;
