//! Arithmetic in binary extension fields GF(2^n).
//!
//! The [`BinaryField`] trait is the capability the commitment code is written
//! against: addition (XOR), multiplication, squaring, inversion and access to
//! the polynomial-basis coefficients. [`Gf2_128`] is the default backend over
//! the fixed irreducible polynomial `x^128 + x^7 + x^2 + x + 1`.
//!
//! [`LinearMap`] represents GF(2)-linear maps of a field onto itself (for
//! example linearized polynomials) as a column matrix and can invert them.

#![warn(missing_docs)]

mod error;
mod gf2_128;
mod linear;


use core::{
    fmt::Debug,
    hash::Hash,
    ops::{Add, AddAssign, Mul, MulAssign},
};

pub use error::FieldError;
pub use gf2_128::Gf2_128;
pub use linear::LinearMap;

/// A binary extension field GF(2^n) in polynomial basis.
///
/// Addition is coefficient-wise XOR, so every element is its own additive
/// inverse and there is no separate subtraction.
pub trait BinaryField:
    Copy
    + Debug
    + Default
    + Eq
    + Hash
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + AddAssign
    + Mul<Output = Self>
    + MulAssign
{
    /// Extension degree `n`.
    const DEGREE: usize;
    /// Width of the canonical little-endian byte encoding.
    const BYTES: usize;
    /// Exponents of the non-zero terms of the defining irreducible polynomial,
    /// highest first.
    const MODULUS: &'static [usize];
    /// Additive identity.
    const ZERO: Self;
    /// Multiplicative identity.
    const ONE: Self;

    /// `self * self`.
    fn square(self) -> Self {
        self * self
    }

    /// Multiplicative inverse, computed as the power map `x^(2^n - 2)`.
    ///
    /// Zero maps to zero, which makes inversion an involution on the whole
    /// field.
    fn inverse(self) -> Self;

    /// The monomial `x^i` for `i < DEGREE`.
    fn monomial(i: usize) -> Self;

    /// Coefficient of `x^i` for `i < DEGREE`.
    fn coefficient(&self, i: usize) -> bool;

    /// Decode from exactly [`Self::BYTES`] little-endian bytes.
    fn from_le_slice(bytes: &[u8]) -> Result<Self, FieldError>;

    /// Encode into [`Self::BYTES`] little-endian bytes.
    fn to_le_vec(&self) -> Vec<u8>;

    /// Build an element from the first [`Self::BYTES`] bytes of `bytes`,
    /// zero-padding shorter input. Uniform bytes give a uniform element.
    fn from_uniform_bytes(bytes: &[u8]) -> Self;

    /// Whether this is the additive identity.
    fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}
