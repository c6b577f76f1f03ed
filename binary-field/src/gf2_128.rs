use core::{
    fmt,
    ops::{Add, AddAssign, Mul, MulAssign},
    str::FromStr,
};

use crate::{BinaryField, FieldError};

/// Low terms of the reduction polynomial: `x^128 = x^7 + x^2 + x + 1`.
const REDUCTION: u128 = 0x87;

/// An element of GF(2^128) modulo `x^128 + x^7 + x^2 + x + 1`.
///
/// Bit `i` of the inner `u128` is the coefficient of `x^i`; the byte encoding
/// is the little-endian encoding of that integer.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Gf2_128(u128);

impl Gf2_128 {
    /// Size of the byte encoding.
    pub const BYTE_LEN: usize = 16;

    /// Wrap a raw coefficient vector.
    pub const fn new(bits: u128) -> Self {
        Self(bits)
    }

    /// The raw coefficient vector.
    pub const fn to_bits(self) -> u128 {
        self.0
    }

    /// Decode from 16 little-endian bytes.
    pub const fn from_le_bytes(bytes: [u8; 16]) -> Self {
        Self(u128::from_le_bytes(bytes))
    }

    /// Encode as 16 little-endian bytes.
    pub const fn to_le_bytes(self) -> [u8; 16] {
        self.0.to_le_bytes()
    }

    /// `self` squared `n` times, i.e. `self^(2^n)`.
    pub fn square_n(self, n: u32) -> Self {
        (0..n).fold(self, |acc, _| acc.square())
    }
}

/// Carry-less product of two 64-bit polynomials.
fn clmul64(a: u64, b: u64) -> u128 {
    let a = a as u128;
    let mut b = b;
    let mut acc = 0u128;
    while b != 0 {
        acc ^= a << b.trailing_zeros();
        b &= b - 1;
    }
    acc
}

/// Full 256-bit carry-less product as `(high, low)`, one Karatsuba step.
fn clmul128(a: u128, b: u128) -> (u128, u128) {
    let (a0, a1) = (a as u64, (a >> 64) as u64);
    let (b0, b1) = (b as u64, (b >> 64) as u64);
    let lo = clmul64(a0, b0);
    let hi = clmul64(a1, b1);
    let mid = clmul64(a0 ^ a1, b0 ^ b1) ^ lo ^ hi;
    (hi ^ (mid >> 64), lo ^ (mid << 64))
}

/// Reduce `hi * x^128 + lo` modulo the field polynomial.
fn reduce(hi: u128, lo: u128) -> u128 {
    // terms of hi * (x^7 + x^2 + x) that spill past x^127
    let t = hi ^ (hi >> 127) ^ (hi >> 126) ^ (hi >> 121);
    lo ^ t ^ (t << 1) ^ (t << 2) ^ (t << 7)
}

/// Interleave zero bits: bit `i` moves to bit `2i`.
fn spread(x: u64) -> u128 {
    let mut x = x as u128;
    x = (x | (x << 32)) & 0x0000_0000_ffff_ffff_0000_0000_ffff_ffff;
    x = (x | (x << 16)) & 0x0000_ffff_0000_ffff_0000_ffff_0000_ffff;
    x = (x | (x << 8)) & 0x00ff_00ff_00ff_00ff_00ff_00ff_00ff_00ff;
    x = (x | (x << 4)) & 0x0f0f_0f0f_0f0f_0f0f_0f0f_0f0f_0f0f_0f0f;
    x = (x | (x << 2)) & 0x3333_3333_3333_3333_3333_3333_3333_3333;
    (x | (x << 1)) & 0x5555_5555_5555_5555_5555_5555_5555_5555
}

impl BinaryField for Gf2_128 {
    const DEGREE: usize = 128;
    const BYTES: usize = Self::BYTE_LEN;
    const MODULUS: &'static [usize] = &[128, 7, 2, 1, 0];
    const ZERO: Self = Self(0);
    const ONE: Self = Self(1);

    fn square(self) -> Self {
        Self(reduce(spread((self.0 >> 64) as u64), spread(self.0 as u64)))
    }

    /// Itoh-Tsujii: `b_k = a^(2^k - 1)` along the chain
    /// 1, 2, 3, 6, 7, 14, 15, 30, 31, 62, 63, 126, 127, then one squaring.
    fn inverse(self) -> Self {
        let mut beta = self;
        let mut k = 1u32;
        while k < 127 {
            // b_2k = b_k^(2^k) * b_k
            beta = beta.square_n(k) * beta;
            k *= 2;
            if k < 127 {
                // b_(k+1) = b_k^2 * a
                beta = beta.square() * self;
                k += 1;
            }
        }
        beta.square()
    }

    fn monomial(i: usize) -> Self {
        debug_assert!(i < Self::DEGREE);
        Self(1u128 << i)
    }

    fn coefficient(&self, i: usize) -> bool {
        (self.0 >> i) & 1 == 1
    }

    fn from_le_slice(bytes: &[u8]) -> Result<Self, FieldError> {
        let bytes: [u8; 16] = bytes.try_into().map_err(|_| FieldError::InvalidLength {
            expected: Self::BYTE_LEN,
            got: bytes.len(),
        })?;
        Ok(Self::from_le_bytes(bytes))
    }

    fn to_le_vec(&self) -> Vec<u8> {
        self.to_le_bytes().to_vec()
    }

    fn from_uniform_bytes(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 16];
        let len = bytes.len().min(Self::BYTE_LEN);
        buf[..len].copy_from_slice(&bytes[..len]);
        Self::from_le_bytes(buf)
    }
}

impl Add for Gf2_128 {
    type Output = Self;

    #[allow(clippy::suspicious_arithmetic_impl)]
    fn add(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl AddAssign for Gf2_128 {
    #[allow(clippy::suspicious_op_assign_impl)]
    fn add_assign(&mut self, rhs: Self) {
        self.0 ^= rhs.0;
    }
}

impl Mul for Gf2_128 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let (hi, lo) = clmul128(self.0, rhs.0);
        Self(reduce(hi, lo))
    }
}

impl MulAssign for Gf2_128 {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl From<u128> for Gf2_128 {
    fn from(bits: u128) -> Self {
        Self(bits)
    }
}

impl From<[u8; 16]> for Gf2_128 {
    fn from(bytes: [u8; 16]) -> Self {
        Self::from_le_bytes(bytes)
    }
}

impl From<Gf2_128> for [u8; 16] {
    fn from(element: Gf2_128) -> Self {
        element.to_le_bytes()
    }
}

impl fmt::Debug for Gf2_128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gf2_128({:#034x})", self.0)
    }
}

/// Lowercase hex of the little-endian byte encoding.
impl fmt::Display for Gf2_128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_le_bytes()))
    }
}

impl FromStr for Gf2_128 {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| FieldError::InvalidHex(e.to_string()))?;
        Self::from_le_slice(&bytes)
    }
}
